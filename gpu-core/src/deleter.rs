//! Deferred Deleter (spec §4.6): `safe_destroy(h)` per handle kind, plus a
//! destructor. Subscribes to the [`InflightTracker`] at construction; its
//! callback iterates the just-retired entry and destroys anything still
//! queued and no longer referenced by any other inflight fence. Destroying
//! an image view or render pass invalidates the framebuffer cache entries
//! referencing it (spec §4.7).
//!
//! Semaphores and fences are reused through [`crate::pool::SemaphorePool`]/
//! [`crate::pool::FencePool`] directly by whoever observes a fence retire
//! (the device layer), not through `safe_destroy` — they are never handed
//! to application code as independently destroyable objects in this model.

use std::sync::Arc;

use parking_lot::Mutex;

use hal::{Api, CommandBufferLevel, Device};

use crate::cache::FramebufferCache;
use crate::pool::CommandBufferPool;
use crate::resource::{BufferId, Texture, TextureView};
use crate::InflightTracker;

struct Queues<A: Api> {
    buffers: Vec<(BufferId, A::Buffer)>,
    textures: Vec<Arc<Texture<A>>>,
    texture_views: Vec<Arc<TextureView<A>>>,
    bind_groups: Vec<(A::BindGroup, A::DescriptorPool)>,
    bind_group_layouts: Vec<A::BindGroupLayout>,
    render_pipelines: Vec<(A::RenderPipeline, A::PipelineLayout)>,
    compute_pipelines: Vec<(A::ComputePipeline, A::PipelineLayout)>,
    render_passes: Vec<A::RenderPass>,
    framebuffers: Vec<A::Framebuffer>,
    command_buffers: Vec<(CommandBufferLevel, A::CommandBuffer, A::CommandEncoder)>,
    samplers: Vec<A::Sampler>,
}

impl<A: Api> Default for Queues<A> {
    fn default() -> Self {
        Self {
            buffers: Vec::new(),
            textures: Vec::new(),
            texture_views: Vec::new(),
            bind_groups: Vec::new(),
            bind_group_layouts: Vec::new(),
            render_pipelines: Vec::new(),
            compute_pipelines: Vec::new(),
            render_passes: Vec::new(),
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
            samplers: Vec::new(),
        }
    }
}

/// Owns the device and inflight tracker references it needs to decide,
/// independent of any particular call site, whether a queued handle is
/// finally safe to destroy.
pub struct DeferredDeleter<A: Api> {
    device: Arc<A::Device>,
    tracker: Arc<InflightTracker<A>>,
    framebuffer_cache: Arc<FramebufferCache<A>>,
    command_buffer_pool: Arc<CommandBufferPool<A>>,
    queued: Mutex<Queues<A>>,
}

impl<A: Api> DeferredDeleter<A>
where
    A::Device: Send + Sync + 'static,
{
    /// Subscribes to `tracker` so queued handles are re-examined every time
    /// a fence retires.
    pub fn new(
        device: Arc<A::Device>,
        tracker: Arc<InflightTracker<A>>,
        framebuffer_cache: Arc<FramebufferCache<A>>,
        command_buffer_pool: Arc<CommandBufferPool<A>>,
    ) -> Arc<Self> {
        let deleter = Arc::new(Self { device, tracker: tracker.clone(), framebuffer_cache, command_buffer_pool, queued: Mutex::new(Queues::default()) });

        let weak = Arc::downgrade(&deleter);
        tracker.subscribe(move |_value, _fence, _entry| {
            if let Some(deleter) = weak.upgrade() {
                deleter.drain_no_longer_inflight();
            }
        });
        deleter
    }

    /// Re-checks every queued handle against the tracker and destroys
    /// whichever are no longer referenced by any inflight fence. Run after
    /// every fence retire, per spec §4.6.
    fn drain_no_longer_inflight(&self) {
        let mut queued = self.queued.lock();

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.buffers.drain(..).partition(|(id, _)| !self.tracker.is_inflight_buffer(*id));
        queued.buffers = pending;
        for (_, raw) in ready {
            unsafe { self.device.destroy_buffer(raw) };
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.textures.drain(..).partition(|t| !self.tracker.is_inflight_texture(t.id()));
        queued.textures = pending;
        for texture in ready {
            self.destroy_texture_now(&texture);
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.texture_views.drain(..).partition(|v| !self.tracker.is_inflight_texture_view(v.id()));
        queued.texture_views = pending;
        for view in ready {
            self.destroy_view_now(&view);
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.bind_groups.drain(..).partition(|(raw, _)| !self.tracker.is_inflight_bind_group(raw));
        queued.bind_groups = pending;
        for (raw, pool) in ready {
            unsafe {
                self.device.destroy_bind_group(raw);
                self.device.destroy_descriptor_pool(pool);
            }
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.bind_group_layouts.drain(..).partition(|l| !self.tracker.is_inflight_bind_group_layout(l));
        queued.bind_group_layouts = pending;
        for layout in ready {
            unsafe { self.device.destroy_bind_group_layout(layout) };
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.render_pipelines.drain(..).partition(|(p, _)| !self.tracker.is_inflight_render_pipeline(p));
        queued.render_pipelines = pending;
        for (pipeline, layout) in ready {
            unsafe {
                self.device.destroy_render_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.compute_pipelines.drain(..).partition(|(p, _)| !self.tracker.is_inflight_compute_pipeline(p));
        queued.compute_pipelines = pending;
        for (pipeline, layout) in ready {
            unsafe {
                self.device.destroy_compute_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.render_passes.drain(..).partition(|p| !self.tracker.is_inflight_render_pass(p));
        queued.render_passes = pending;
        for pass in ready {
            self.framebuffer_cache.invalidate_render_pass(&pass);
            unsafe { self.device.destroy_render_pass(pass) };
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.framebuffers.drain(..).partition(|f| !self.tracker.is_inflight_framebuffer(f));
        queued.framebuffers = pending;
        for framebuffer in ready {
            unsafe { self.device.destroy_framebuffer(framebuffer) };
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.command_buffers.drain(..).partition(|(_, finished, _)| !self.tracker.is_inflight_command_buffer(finished));
        queued.command_buffers = pending;
        for (level, _finished, encoder) in ready {
            self.command_buffer_pool.release(level, encoder);
        }

        let (ready, pending): (Vec<_>, Vec<_>) =
            queued.samplers.drain(..).partition(|s| !self.tracker.is_inflight_sampler(s));
        queued.samplers = pending;
        for sampler in ready {
            unsafe { self.device.destroy_sampler(sampler) };
        }
    }

    fn destroy_texture_now(&self, texture: &Arc<Texture<A>>) {
        for view in texture.clear_view_cache() {
            self.destroy_view_now(&view);
        }
        unsafe { self.device.destroy_texture(texture.raw().clone()) };
    }

    fn destroy_view_now(&self, view: &Arc<TextureView<A>>) {
        self.framebuffer_cache.invalidate_view(view.raw());
        unsafe { self.device.destroy_texture_view(view.raw().clone()) };
    }

    /// Destroys `buffer` immediately if nothing inflight references it,
    /// otherwise queues it for the next fence retire.
    pub fn safe_destroy_buffer(&self, id: BufferId, raw: A::Buffer) {
        if self.tracker.is_inflight_buffer(id) {
            self.queued.lock().buffers.push((id, raw));
        } else {
            unsafe { self.device.destroy_buffer(raw) };
        }
    }

    /// `texture` must be the last strong handle — its cached views are
    /// drained and destroyed alongside it once safe.
    pub fn safe_destroy_texture(&self, texture: Arc<Texture<A>>) {
        if self.tracker.is_inflight_texture(texture.id()) {
            self.queued.lock().textures.push(texture);
        } else {
            self.destroy_texture_now(&texture);
        }
    }

    pub fn safe_destroy_texture_view(&self, view: Arc<TextureView<A>>) {
        if self.tracker.is_inflight_texture_view(view.id()) {
            self.queued.lock().texture_views.push(view);
        } else {
            self.destroy_view_now(&view);
        }
    }

    /// Frees a bind group and destroys its dedicated one-pool-per-set
    /// descriptor pool (spec §4.7: "trading fragmentation for simple
    /// lifetime").
    pub fn safe_destroy_bind_group(&self, raw: A::BindGroup, pool: A::DescriptorPool) {
        if self.tracker.is_inflight_bind_group(&raw) {
            self.queued.lock().bind_groups.push((raw, pool));
        } else {
            unsafe {
                self.device.destroy_bind_group(raw);
                self.device.destroy_descriptor_pool(pool);
            }
        }
    }

    pub fn safe_destroy_bind_group_layout(&self, layout: A::BindGroupLayout) {
        if self.tracker.is_inflight_bind_group_layout(&layout) {
            self.queued.lock().bind_group_layouts.push(layout);
        } else {
            unsafe { self.device.destroy_bind_group_layout(layout) };
        }
    }

    pub fn safe_destroy_render_pipeline(&self, pipeline: A::RenderPipeline, layout: A::PipelineLayout) {
        if self.tracker.is_inflight_render_pipeline(&pipeline) {
            self.queued.lock().render_pipelines.push((pipeline, layout));
        } else {
            unsafe {
                self.device.destroy_render_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }
    }

    pub fn safe_destroy_compute_pipeline(&self, pipeline: A::ComputePipeline, layout: A::PipelineLayout) {
        if self.tracker.is_inflight_compute_pipeline(&pipeline) {
            self.queued.lock().compute_pipelines.push((pipeline, layout));
        } else {
            unsafe {
                self.device.destroy_compute_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }
    }

    pub fn safe_destroy_render_pass(&self, pass: A::RenderPass) {
        if self.tracker.is_inflight_render_pass(&pass) {
            self.queued.lock().render_passes.push(pass);
        } else {
            self.framebuffer_cache.invalidate_render_pass(&pass);
            unsafe { self.device.destroy_render_pass(pass) };
        }
    }

    pub fn safe_destroy_framebuffer(&self, framebuffer: A::Framebuffer) {
        if self.tracker.is_inflight_framebuffer(&framebuffer) {
            self.queued.lock().framebuffers.push(framebuffer);
        } else {
            unsafe { self.device.destroy_framebuffer(framebuffer) };
        }
    }

    /// Returns the recording encoder to the command-buffer pool once
    /// `finished` is no longer referenced by any inflight fence.
    pub fn safe_destroy_command_buffer(&self, level: CommandBufferLevel, finished: A::CommandBuffer, encoder: A::CommandEncoder) {
        if self.tracker.is_inflight_command_buffer(&finished) {
            self.queued.lock().command_buffers.push((level, finished, encoder));
        } else {
            self.command_buffer_pool.release(level, encoder);
        }
    }

    pub fn safe_destroy_sampler(&self, sampler: A::Sampler) {
        if self.tracker.is_inflight_sampler(&sampler) {
            self.queued.lock().samplers.push(sampler);
        } else {
            unsafe { self.device.destroy_sampler(sampler) };
        }
    }

    /// Moves every queue out under lock, then destroys everything left
    /// without the lock held — callers are expected to have already waited
    /// for device idle (spec §4.6), so nothing here is actually inflight.
    #[cfg(test)]
    pub(crate) fn queued_buffer_count(&self) -> usize {
        self.queued.lock().buffers.len()
    }

    #[cfg(test)]
    pub(crate) fn queued_compute_pipeline_count(&self) -> usize {
        self.queued.lock().compute_pipelines.len()
    }

    #[cfg(test)]
    pub(crate) fn queued_sampler_count(&self) -> usize {
        self.queued.lock().samplers.len()
    }

    pub fn destroy_remaining(&self) {
        let queues = std::mem::take(&mut *self.queued.lock());

        for (_, buffer) in queues.buffers {
            unsafe { self.device.destroy_buffer(buffer) };
        }
        for texture in queues.textures {
            self.destroy_texture_now(&texture);
        }
        for view in queues.texture_views {
            self.destroy_view_now(&view);
        }
        for (raw, pool) in queues.bind_groups {
            unsafe {
                self.device.destroy_bind_group(raw);
                self.device.destroy_descriptor_pool(pool);
            }
        }
        for layout in queues.bind_group_layouts {
            unsafe { self.device.destroy_bind_group_layout(layout) };
        }
        for (pipeline, layout) in queues.render_pipelines {
            unsafe {
                self.device.destroy_render_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }
        for (pipeline, layout) in queues.compute_pipelines {
            unsafe {
                self.device.destroy_compute_pipeline(pipeline);
                self.device.destroy_pipeline_layout(layout);
            }
        }
        for pass in queues.render_passes {
            self.framebuffer_cache.invalidate_render_pass(&pass);
            unsafe { self.device.destroy_render_pass(pass) };
        }
        for framebuffer in queues.framebuffers {
            unsafe { self.device.destroy_framebuffer(framebuffer) };
        }
        for (level, _finished, encoder) in queues.command_buffers {
            self.command_buffer_pool.release(level, encoder);
        }
        for sampler in queues.samplers {
            unsafe { self.device.destroy_sampler(sampler) };
        }
    }
}

#[cfg(test)]
mod tests {
    use hal::empty::{Context, EmptyDevice, Handle};
    use hal::Device as _;

    use super::*;
    use crate::pool::CommandBufferPool;
    use crate::resource::Buffer;
    use crate::submit::ReferencedObjectSet;

    struct Harness {
        device: Arc<EmptyDevice>,
        tracker: Arc<InflightTracker<Context>>,
        deleter: Arc<DeferredDeleter<Context>>,
    }

    fn harness_new() -> Harness {
        let device = Arc::new(EmptyDevice::new());
        let tracker = Arc::new(InflightTracker::<Context>::new());
        let framebuffer_cache = Arc::new(FramebufferCache::<Context>::new());
        let command_buffer_pool = Arc::new(CommandBufferPool::<Context>::new());
        let deleter = DeferredDeleter::new(device.clone(), tracker.clone(), framebuffer_cache, command_buffer_pool);
        Harness { device, tracker, deleter }
    }

    fn buffer() -> Arc<Buffer<Context>> {
        Buffer::new(Handle(1), 16, gpu_types::BufferUsages::STORAGE)
    }

    #[test]
    fn destroys_immediately_when_nothing_inflight() {
        let h = harness_new();
        h.deleter.safe_destroy_buffer(crate::resource::BufferId(1), Handle(1));
        // No inflight fence referenced it, so nothing is queued.
        assert_eq!(h.deleter.queued.lock().buffers.len(), 0);
    }

    #[test]
    fn queues_while_inflight_then_drains_on_fence_retire() {
        let h = harness_new();
        let buf = buffer();
        let mut object = ReferencedObjectSet::<Context>::default();
        object.buffers.push(buf.clone());

        let fence = unsafe { h.device.create_fence() }.unwrap();
        h.tracker.add(1, fence, vec![object]);

        h.deleter.safe_destroy_buffer(buf.id(), buf.raw().clone());
        assert_eq!(h.deleter.queued.lock().buffers.len(), 1);

        h.tracker.clear(1);
        assert_eq!(h.deleter.queued.lock().buffers.len(), 0);
    }

    #[test]
    fn render_pipeline_deferred_while_inflight() {
        let h = harness_new();
        let pipeline = crate::resource::RenderPipeline::<Context>::new(Handle(10), Handle(11));
        let mut object = ReferencedObjectSet::<Context>::default();
        object.render_pipelines.push(pipeline.clone());

        let fence = unsafe { h.device.create_fence() }.unwrap();
        h.tracker.add(2, fence, vec![object]);

        h.deleter.safe_destroy_render_pipeline(pipeline.raw().clone(), pipeline.layout().clone());
        assert_eq!(h.deleter.queued.lock().render_pipelines.len(), 1);

        h.tracker.clear(2);
        assert_eq!(h.deleter.queued.lock().render_pipelines.len(), 0);
    }

    #[test]
    fn sampler_deferred_while_inflight() {
        let h = harness_new();
        let sampler = Handle(12);
        let mut object = ReferencedObjectSet::<Context>::default();
        object.samplers.push(sampler);

        let fence = unsafe { h.device.create_fence() }.unwrap();
        h.tracker.add(4, fence, vec![object]);

        h.deleter.safe_destroy_sampler(sampler);
        assert_eq!(h.deleter.queued_sampler_count(), 1);

        h.tracker.clear(4);
        assert_eq!(h.deleter.queued_sampler_count(), 0);
    }

    #[test]
    fn destroy_remaining_drains_every_queue_unconditionally() {
        let h = harness_new();
        let buf = buffer();
        let mut object = ReferencedObjectSet::<Context>::default();
        object.buffers.push(buf.clone());

        let fence = unsafe { h.device.create_fence() }.unwrap();
        h.tracker.add(3, fence, vec![object]);
        h.deleter.safe_destroy_buffer(buf.id(), buf.raw().clone());
        assert_eq!(h.deleter.queued.lock().buffers.len(), 1);

        h.deleter.destroy_remaining();
        assert_eq!(h.deleter.queued.lock().buffers.len(), 0);
    }
}

