//! Binary semaphore pool (spec §4.7): a free-list. `acquire()` returns a
//! fresh or reused semaphore; `release(s)` marks it free for reuse.

use parking_lot::Mutex;

use hal::{Api, Device};

use crate::error::CoreError;

pub struct SemaphorePool<A: Api> {
    free: Mutex<Vec<A::Semaphore>>,
}

impl<A: Api> SemaphorePool<A> {
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    pub fn acquire(&self, device: &A::Device) -> Result<A::Semaphore, CoreError> {
        if let Some(semaphore) = self.free.lock().pop() {
            return Ok(semaphore);
        }
        Ok(unsafe { device.create_semaphore() }?)
    }

    pub fn release(&self, semaphore: A::Semaphore) {
        self.free.lock().push(semaphore);
    }

    /// Drains the free list, destroying every pooled semaphore. Called by
    /// the device during shutdown, after `wait_idle`.
    pub fn destroy_all(&self, device: &A::Device) {
        for semaphore in self.free.lock().drain(..) {
            unsafe { device.destroy_semaphore(semaphore) };
        }
    }
}

impl<A: Api> Default for SemaphorePool<A> {
    fn default() -> Self {
        Self::new()
    }
}
