/*! The compilation and synchronization core sitting between a WebGPU-style
 *  command-encoder API and a Vulkan-like [`hal`] backend.
 *
 *  Pipeline (leaves first): [`pool`] → [`cache`] → [`inflight`] ↔ [`deleter`]
 *  → [`command`] → [`track`] → [`sync`] → [`submit`] → queue submission.
 *  [`device`] wires the whole thing together behind one `Device<A>` handle.
 */

#![allow(clippy::too_many_arguments, clippy::type_complexity)]
#![warn(trivial_casts, trivial_numeric_casts, unused_extern_crates, unused_qualifications)]

pub mod cache;
pub mod command;
pub mod deleter;
pub mod device;
pub mod error;
pub mod inflight;
pub mod pool;
pub mod resource;
pub mod sync;
pub mod submit;
pub mod track;
pub mod types;

pub use device::Device;
pub use error::CoreError;
pub use inflight::InflightTracker;
