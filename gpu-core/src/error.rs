//! Error kinds surfaced by the core, per the propagation policy: creation
//! calls return a `Result`, record-time programmer errors panic in debug
//! and downgrade to `InvalidState`/`InvalidArgument` in release, submit-time
//! allocation failures bubble up, and fence-wait failures escalate to
//! `DeviceLost`.

#[derive(Clone, Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl From<hal::DeviceError> for CoreError {
    fn from(err: hal::DeviceError) -> Self {
        match err {
            hal::DeviceError::OutOfHostMemory => Self::OutOfHostMemory,
            hal::DeviceError::OutOfDeviceMemory => Self::OutOfDeviceMemory,
            hal::DeviceError::Lost => Self::DeviceLost,
            hal::DeviceError::ResourceExhausted(s) => Self::ResourceExhausted(s),
            hal::DeviceError::InvalidArgument(s) => Self::InvalidArgument(s),
            hal::DeviceError::Unsupported(s) => Self::Unsupported(s),
        }
    }
}

impl From<hal::SurfaceError> for CoreError {
    fn from(err: hal::SurfaceError) -> Self {
        match err {
            hal::SurfaceError::Lost => Self::SurfaceLost,
            hal::SurfaceError::Outdated => Self::SurfaceLost,
            hal::SurfaceError::Device(e) => e.into(),
        }
    }
}

/// Panics in debug builds (programmer error caught at record time), returns
/// the given error in release. Mirrors the §7 propagation policy for
/// recording calls that "can only fail on programmer error".
macro_rules! record_error {
    ($cond:expr, $err:expr, $msg:literal) => {
        if $cond {
            debug_assert!(false, $msg);
            return Err($err);
        }
    };
}
pub(crate) use record_error;
