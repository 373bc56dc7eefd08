//! Command-buffer pool (spec §4.7): a free-list of recording encoders
//! keyed by level. `acquire(level)` returns a reused encoder of the right
//! level if one is free, discarding whatever it last recorded, else
//! allocates a new one. `release(level, encoder)` returns it to the pool
//! once its recorded `A::CommandBuffer` has retired (driven by the
//! deferred deleter).

use parking_lot::Mutex;

use hal::{Api, CommandBufferLevel, CommandEncoder, Device};

use crate::error::CoreError;

struct Lists<A: Api> {
    primary: Vec<A::CommandEncoder>,
    secondary: Vec<A::CommandEncoder>,
}

pub struct CommandBufferPool<A: Api> {
    free: Mutex<Lists<A>>,
}

impl<A: Api> CommandBufferPool<A> {
    pub fn new() -> Self {
        Self { free: Mutex::new(Lists { primary: Vec::new(), secondary: Vec::new() }) }
    }

    fn list_for(lists: &mut Lists<A>, level: CommandBufferLevel) -> &mut Vec<A::CommandEncoder> {
        match level {
            CommandBufferLevel::Primary => &mut lists.primary,
            CommandBufferLevel::Secondary => &mut lists.secondary,
        }
    }

    pub fn acquire(&self, device: &A::Device, level: CommandBufferLevel) -> Result<A::CommandEncoder, CoreError> {
        let mut lists = self.free.lock();
        if let Some(mut encoder) = Self::list_for(&mut lists, level).pop() {
            unsafe { encoder.discard_encoding() };
            return Ok(encoder);
        }
        drop(lists);
        Ok(unsafe { device.allocate_command_buffer(level) }?)
    }

    pub fn release(&self, level: CommandBufferLevel, encoder: A::CommandEncoder) {
        let mut lists = self.free.lock();
        Self::list_for(&mut lists, level).push(encoder);
    }

    pub fn destroy_all(&self, device: &A::Device) {
        let mut lists = self.free.lock();
        for encoder in lists.primary.drain(..).chain(lists.secondary.drain(..)) {
            unsafe { device.destroy_command_encoder(encoder) };
        }
    }
}

impl<A: Api> Default for CommandBufferPool<A> {
    fn default() -> Self {
        Self::new()
    }
}
