//! Framebuffer cache (spec §4.7): keyed by `(render_pass, flags, width,
//! height, layers, color attachments, depth_stencil_view)`, hashing the
//! backend handles as opaque values. `invalidate(view)`/`invalidate(render_pass)`
//! scan and erase every entry referencing the destroyed object, so a
//! framebuffer is never handed out pointing at a dangling view.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use hal::{Api, Device, FramebufferDescriptor};

use crate::error::CoreError;

#[derive(Clone, PartialEq, Eq, Hash)]
struct FramebufferKey<A: Api> {
    render_pass: A::RenderPass,
    width: u32,
    height: u32,
    layers: u32,
    color_views: Vec<A::TextureView>,
    resolve_views: Vec<Option<A::TextureView>>,
    depth_stencil_view: Option<A::TextureView>,
}

impl<A: Api> FramebufferKey<A> {
    fn from_desc(desc: &FramebufferDescriptor<A>) -> Self {
        Self {
            render_pass: desc.render_pass.clone(),
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            color_views: desc.color_views.clone(),
            resolve_views: desc.resolve_views.clone(),
            depth_stencil_view: desc.depth_stencil_view.clone(),
        }
    }

    fn references_view(&self, view: &A::TextureView) -> bool {
        self.color_views.iter().any(|v| v == view)
            || self.resolve_views.iter().flatten().any(|v| v == view)
            || self.depth_stencil_view.as_ref() == Some(view)
    }
}

pub struct FramebufferCache<A: Api> {
    entries: Mutex<FxHashMap<FramebufferKey<A>, A::Framebuffer>>,
}

impl<A: Api> FramebufferCache<A> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(FxHashMap::default()) }
    }

    pub fn get_or_create(
        &self,
        device: &A::Device,
        desc: &FramebufferDescriptor<A>,
    ) -> Result<A::Framebuffer, CoreError> {
        let key = FramebufferKey::from_desc(desc);
        let mut entries = self.entries.lock();
        if let Some(fb) = entries.get(&key) {
            return Ok(fb.clone());
        }
        let fb = unsafe { device.create_framebuffer(desc) }?;
        entries.insert(key, fb.clone());
        Ok(fb)
    }

    /// Evicts every framebuffer entry whose attachments include `view`.
    pub fn invalidate_view(&self, view: &A::TextureView) {
        self.entries.lock().retain(|key, _| !key.references_view(view));
    }

    /// Evicts every framebuffer entry built against `pass`.
    pub fn invalidate_render_pass(&self, pass: &A::RenderPass) {
        self.entries.lock().retain(|key, _| &key.render_pass != pass);
    }
}

impl<A: Api> Default for FramebufferCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use hal::empty::{Context, EmptyDevice, Handle};

    use super::*;

    fn desc(render_pass: Handle, view: Handle) -> FramebufferDescriptor<Context> {
        FramebufferDescriptor {
            render_pass,
            color_views: vec![view],
            resolve_views: vec![None],
            depth_stencil_view: None,
            width: 64,
            height: 64,
            layers: 1,
        }
    }

    #[test]
    fn identical_descriptors_hit_the_cache() {
        let cache: FramebufferCache<Context> = FramebufferCache::new();
        let device = EmptyDevice::new();
        let d = desc(Handle(1), Handle(2));
        let first = cache.get_or_create(&device, &d).unwrap();
        let second = cache.get_or_create(&device, &d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalidate_view_evicts_referencing_entries() {
        let cache: FramebufferCache<Context> = FramebufferCache::new();
        let device = EmptyDevice::new();
        let view = Handle(2);
        let d = desc(Handle(1), view);
        cache.get_or_create(&device, &d).unwrap();
        assert_eq!(cache.entries.lock().len(), 1);

        cache.invalidate_view(&view);
        assert_eq!(cache.entries.lock().len(), 0);
    }

    #[test]
    fn invalidate_render_pass_evicts_referencing_entries() {
        let cache: FramebufferCache<Context> = FramebufferCache::new();
        let device = EmptyDevice::new();
        let pass = Handle(1);
        let d = desc(pass, Handle(2));
        cache.get_or_create(&device, &d).unwrap();

        cache.invalidate_render_pass(&pass);
        assert_eq!(cache.entries.lock().len(), 0);
    }
}
