//! Render-pass cache (spec §4.7): key = attachment tuple list + depth
//! stencil + subpass dependencies, equality structural. `hal::RenderPassDescriptor`
//! already derives `PartialEq + Eq + Hash`, so it doubles as its own
//! cache key — no separate key type to keep in sync.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use hal::{Api, Device, RenderPassDescriptor};

use crate::error::CoreError;

pub struct RenderPassCache<A: Api> {
    entries: Mutex<FxHashMap<RenderPassDescriptor, A::RenderPass>>,
}

impl<A: Api> RenderPassCache<A> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(FxHashMap::default()) }
    }

    /// Returns the cached render pass for `desc`, creating and storing one
    /// on a miss.
    pub fn get_or_create(&self, device: &A::Device, desc: &RenderPassDescriptor) -> Result<A::RenderPass, CoreError> {
        let mut entries = self.entries.lock();
        if let Some(pass) = entries.get(desc) {
            return Ok(pass.clone());
        }
        let pass = unsafe { device.create_render_pass(desc) }?;
        entries.insert(desc.clone(), pass.clone());
        Ok(pass)
    }

    /// Removes every entry for `pass`. Called by the deleter right before
    /// `pass` is actually destroyed, and by [`super::framebuffer::FramebufferCache::invalidate_render_pass`]'s caller.
    pub fn invalidate(&self, pass: &A::RenderPass) {
        self.entries.lock().retain(|_, v| v != pass);
    }
}

impl<A: Api> Default for RenderPassCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use hal::empty::{Context, EmptyDevice};
    use hal::{AttachmentDesc, LoadOp, StoreOp, TextureLayout};

    use super::*;

    fn desc() -> RenderPassDescriptor {
        RenderPassDescriptor {
            colors: vec![AttachmentDesc {
                format: gpu_types::TextureFormat::Rgba8Unorm,
                samples: 1,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_layout: TextureLayout::Undefined,
                final_layout: TextureLayout::ColorAttachment,
            }],
            depth_stencil: None,
        }
    }

    #[test]
    fn structurally_identical_descriptors_hit_the_cache() {
        let cache: RenderPassCache<Context> = RenderPassCache::new();
        let device = EmptyDevice::new();
        let d = desc();
        let first = cache.get_or_create(&device, &d).unwrap();
        let second = cache.get_or_create(&device, &d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn differing_descriptors_miss_the_cache() {
        let cache: RenderPassCache<Context> = RenderPassCache::new();
        let device = EmptyDevice::new();
        let mut other = desc();
        other.colors[0].samples = 4;
        let first = cache.get_or_create(&device, &desc()).unwrap();
        let second = cache.get_or_create(&device, &other).unwrap();
        assert_ne!(first, second);
    }
}
