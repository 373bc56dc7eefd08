//! Fence pool (spec §4.7): same free-list shape as the semaphore pool.
//! Every pooled fence is a `VK_KHR_timeline_semaphore`-backed [`hal::Api::Fence`];
//! reuse just means handing the same timeline object back out rather than
//! creating a new one per submit.

use parking_lot::Mutex;

use hal::{Api, Device};

use crate::error::CoreError;

pub struct FencePool<A: Api> {
    free: Mutex<Vec<A::Fence>>,
}

impl<A: Api> FencePool<A> {
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    pub fn acquire(&self, device: &A::Device) -> Result<A::Fence, CoreError> {
        if let Some(fence) = self.free.lock().pop() {
            return Ok(fence);
        }
        Ok(unsafe { device.create_fence() }?)
    }

    pub fn release(&self, fence: A::Fence) {
        self.free.lock().push(fence);
    }

    pub fn destroy_all(&self, device: &A::Device) {
        for fence in self.free.lock().drain(..) {
            unsafe { device.destroy_fence(fence) };
        }
    }
}

impl<A: Api> Default for FencePool<A> {
    fn default() -> Self {
        Self::new()
    }
}
