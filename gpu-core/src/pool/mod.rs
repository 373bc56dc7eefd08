//! Pools (spec §4.7): free-lists over reusable GPU objects, shared
//! device-wide and guarded by a mutex per structure (spec §5: "the mutex
//! grain is per-structure, not per-object").

pub mod command_buffer;
pub mod descriptor;
pub mod fence;
pub mod semaphore;

pub use command_buffer::CommandBufferPool;
pub use fence::FencePool;
pub use semaphore::SemaphorePool;
