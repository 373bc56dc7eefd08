//! Device (spec §6): the one entry point the WebGPU façade talks to. Owns
//! the hal `Device`/`Queue` handle and every device-wide shared structure —
//! pools, caches, inflight tracker, deferred deleter — wired together in
//! the order spec §2 describes: pools → caches → inflight tracker ↔
//! deferred deleter, with the command recorder/tracker/synchronizer/submit
//! compiler pipeline running on top per encoding.
//!
//! Per spec §5's concurrency model, the mutex grain here is per-structure
//! (one lock per pool/cache), never per-object; the queue itself is
//! serialized by its own mutex so submit order stays FIFO.

use std::sync::Arc;

use parking_lot::Mutex;

use hal::{Api, CommandBufferLevel, CommandEncoder as _, Device as HalDevice, Queue as HalQueue};

use crate::cache::{FramebufferCache, RenderPassCache};
use crate::command::CommandEncodingResult;
use crate::deleter::DeferredDeleter;
use crate::error::CoreError;
use crate::inflight::InflightTracker;
use crate::pool::{descriptor, CommandBufferPool, FencePool, SemaphorePool};
use crate::resource::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, Buffer, ComputePipeline, RenderPipeline, Sampler, Texture,
    TextureOwner, TextureView, TextureViewKey,
};
use crate::submit::{SubmitCompiler, SyncedCommandBuffer, VulkanSubmit};
use crate::sync::Synchronizer;

/// One command encoding, ready for submission: everything [`crate::command::recorder::Recorder::finish`]
/// produced, plus the raw command buffer it should be replayed into.
pub struct PendingEncoding<A: Api> {
    pub level: CommandBufferLevel,
    pub result: CommandEncodingResult<A>,
}

pub struct Device<A: Api>
where
    A::Device: Send + Sync + 'static,
    A::Queue: Send + Sync + 'static,
{
    hal_device: Arc<A::Device>,
    queue: Mutex<A::Queue>,
    limits: gpu_types::Limits,

    semaphores: SemaphorePool<A>,
    fences: FencePool<A>,
    command_buffers: Arc<CommandBufferPool<A>>,
    render_passes: RenderPassCache<A>,
    framebuffers: Arc<FramebufferCache<A>>,

    tracker: Arc<InflightTracker<A>>,
    deleter: Arc<DeferredDeleter<A>>,
}

impl<A: Api> Device<A>
where
    A::Device: Send + Sync + 'static,
    A::Queue: Send + Sync + 'static,
{
    pub fn new(hal_device: Arc<A::Device>, queue: A::Queue, limits: gpu_types::Limits) -> Arc<Self> {
        let command_buffers = Arc::new(CommandBufferPool::new());
        let framebuffers = Arc::new(FramebufferCache::new());
        let tracker = Arc::new(InflightTracker::new());
        let deleter = DeferredDeleter::new(hal_device.clone(), tracker.clone(), framebuffers.clone(), command_buffers.clone());

        Arc::new(Self {
            hal_device,
            queue: Mutex::new(queue),
            limits,
            semaphores: SemaphorePool::new(),
            fences: FencePool::new(),
            command_buffers,
            render_passes: RenderPassCache::new(),
            framebuffers,
            tracker,
            deleter,
        })
    }

    pub fn limits(&self) -> &gpu_types::Limits {
        &self.limits
    }

    pub fn tracker(&self) -> &Arc<InflightTracker<A>> {
        &self.tracker
    }

    pub fn render_pass_cache(&self) -> &RenderPassCache<A> {
        &self.render_passes
    }

    pub fn framebuffer_cache(&self) -> &FramebufferCache<A> {
        &self.framebuffers
    }

    // --- Resource creation (spec §6 "API surface") -----------------------

    pub fn create_buffer(&self, size: u64, usage: gpu_types::BufferUsages) -> Result<Arc<Buffer<A>>, CoreError> {
        let raw = unsafe { self.hal_device.create_buffer(size, usage) }?;
        Ok(Buffer::new(raw, size, usage))
    }

    /// Releases the application's hold on `buffer`. Destruction itself is
    /// deferred until no inflight fence references it (spec §4.6).
    pub fn destroy_buffer(&self, buffer: Arc<Buffer<A>>) {
        self.deleter.safe_destroy_buffer(buffer.id(), buffer.raw().clone());
    }

    pub fn create_texture(
        &self,
        format: gpu_types::TextureFormat,
        extent: gpu_types::Extent3d,
        mip_level_count: u32,
        sample_count: u32,
        usage: gpu_types::TextureUsages,
        owner: TextureOwner,
    ) -> Result<Arc<Texture<A>>, CoreError> {
        let raw = unsafe { self.hal_device.create_texture(format, extent, mip_level_count, sample_count, usage) }?;
        Ok(Texture::new(raw, format, extent, mip_level_count, sample_count, usage, owner))
    }

    pub fn destroy_texture(&self, texture: Arc<Texture<A>>) {
        self.deleter.safe_destroy_texture(texture);
    }

    /// Returns `texture`'s cached view for `key`, creating and caching one
    /// on a miss (spec §3: the image-view cache lives on the texture).
    pub fn get_or_create_texture_view(&self, texture: &Arc<Texture<A>>, key: TextureViewKey) -> Result<Arc<TextureView<A>>, CoreError> {
        if let Some(view) = texture.cached_view(key) {
            return Ok(view);
        }
        let raw = unsafe { self.hal_device.create_texture_view(texture.raw()) }?;
        let view = TextureView::new(raw, key);
        texture.insert_view(key, view.clone());
        Ok(view)
    }

    pub fn destroy_texture_view(&self, view: Arc<TextureView<A>>) {
        self.deleter.safe_destroy_texture_view(view);
    }

    pub fn create_sampler(&self) -> Result<Arc<Sampler<A>>, CoreError> {
        let raw = unsafe { self.hal_device.create_sampler() }?;
        Ok(Sampler::new(raw))
    }

    /// Releases the application's hold on `sampler`. Destruction itself is
    /// deferred until no inflight fence references it (spec §4.6), same as
    /// every other shared-resource kind.
    pub fn destroy_sampler(&self, sampler: Arc<Sampler<A>>) {
        self.deleter.safe_destroy_sampler(sampler.raw().clone());
    }

    pub fn create_bind_group_layout(&self, entries: Vec<BindGroupLayoutEntry>) -> Result<Arc<BindGroupLayout<A>>, CoreError> {
        let raw = unsafe { self.hal_device.create_bind_group_layout() }?;
        Ok(BindGroupLayout::new(raw, entries))
    }

    pub fn destroy_bind_group_layout(&self, layout: Arc<BindGroupLayout<A>>) {
        self.deleter.safe_destroy_bind_group_layout(layout.raw().clone());
    }

    /// Allocates a dedicated single-set descriptor pool (spec §4.7) sized
    /// off the device's reported limits, then the bind group itself.
    pub fn create_bind_group(
        &self,
        layout: Arc<BindGroupLayout<A>>,
        buffers: Vec<(u32, Arc<Buffer<A>>)>,
        textures: Vec<(u32, Arc<Texture<A>>, Arc<TextureView<A>>)>,
        samplers: Vec<(u32, Arc<Sampler<A>>)>,
    ) -> Result<Arc<BindGroup<A>>, CoreError> {
        let pool = descriptor::allocate_pool_for_one_set::<A>(&self.hal_device, &self.limits.descriptors)?;
        let raw = match unsafe { self.hal_device.create_bind_group(&pool, layout.raw()) } {
            Ok(raw) => raw,
            Err(err) => {
                unsafe { self.hal_device.destroy_descriptor_pool(pool) };
                return Err(err.into());
            }
        };
        Ok(BindGroup::new(raw, pool, layout, buffers, textures, samplers))
    }

    pub fn destroy_bind_group(&self, bind_group: Arc<BindGroup<A>>) {
        self.deleter.safe_destroy_bind_group(bind_group.raw().clone(), bind_group.descriptor_pool().clone());
    }

    pub fn create_pipeline_layout(&self) -> Result<A::PipelineLayout, CoreError> {
        Ok(unsafe { self.hal_device.create_pipeline_layout() }?)
    }

    pub fn create_render_pipeline(&self, layout: A::PipelineLayout) -> Result<Arc<RenderPipeline<A>>, CoreError> {
        let raw = match unsafe { self.hal_device.create_render_pipeline() } {
            Ok(raw) => raw,
            Err(err) => {
                unsafe { self.hal_device.destroy_pipeline_layout(layout) };
                return Err(err.into());
            }
        };
        Ok(RenderPipeline::new(raw, layout))
    }

    pub fn destroy_render_pipeline(&self, pipeline: Arc<RenderPipeline<A>>) {
        self.deleter.safe_destroy_render_pipeline(pipeline.raw().clone(), pipeline.layout().clone());
    }

    pub fn create_compute_pipeline(&self, layout: A::PipelineLayout) -> Result<Arc<ComputePipeline<A>>, CoreError> {
        let raw = match unsafe { self.hal_device.create_compute_pipeline() } {
            Ok(raw) => raw,
            Err(err) => {
                unsafe { self.hal_device.destroy_pipeline_layout(layout) };
                return Err(err.into());
            }
        };
        Ok(ComputePipeline::new(raw, layout))
    }

    pub fn destroy_compute_pipeline(&self, pipeline: Arc<ComputePipeline<A>>) {
        self.deleter.safe_destroy_compute_pipeline(pipeline.raw().clone(), pipeline.layout().clone());
    }

    pub fn create_query_set(&self, count: u32) -> Result<A::QuerySet, CoreError> {
        Ok(unsafe { self.hal_device.create_query_set(count) }?)
    }

    pub fn destroy_query_set(&self, set: A::QuerySet) {
        unsafe { self.hal_device.destroy_query_set(set) };
    }

    // --- Submission (spec §4.3/§4.4 driven from here) ---------------------

    /// Runs the Synchronizer and Submit Compiler over `encodings`, submits
    /// the resulting batches to the queue, and registers every batch's
    /// referenced objects with the inflight tracker under a fresh fence.
    /// Returns one fence value per submitted batch, in submit order.
    pub fn submit(&self, encodings: Vec<PendingEncoding<A>>) -> Result<Vec<hal::FenceValue>, CoreError> {
        let mut synced = Vec::with_capacity(encodings.len());
        let mut encoders: Vec<(CommandBufferLevel, A::CommandBuffer, Option<A::CommandEncoder>)> =
            Vec::with_capacity(encodings.len());

        for encoding in encodings {
            let mut encoder = self.command_buffers.acquire(&self.hal_device, encoding.level)?;
            unsafe { encoder.begin_encoding() }?;
            let synchronizer = Synchronizer::<A>::new(encoding.result.pass_resource_infos);
            let record_result = synchronizer.record(&mut encoder, &encoding.result.commands)?;
            let command_buffer = unsafe { encoder.end_encoding() }?;

            synced.push(SyncedCommandBuffer {
                command_buffer: command_buffer.clone(),
                commands: encoding.result.commands,
                unsynced_pass_resource_infos: record_result.unsynced_pass_resource_infos,
            });
            encoders.push((encoding.level, command_buffer, Some(encoder)));
        }

        let submits = SubmitCompiler::<A>::new().compile(&self.hal_device, synced)?;

        let mut fence_values = Vec::with_capacity(submits.len());
        let queue = self.queue.lock();
        for submit in submits {
            let fence_value = self.submit_one(&queue, submit, &mut encoders)?;
            fence_values.push(fence_value);
        }
        Ok(fence_values)
    }

    /// Submits one compiled batch, then hands every command buffer it
    /// contains to the deferred deleter together with the encoder that
    /// produced it — `encoders` is threaded through rather than recreated,
    /// so the encoder comes back to [`CommandBufferPool`] exactly once,
    /// the moment its command buffer's fence retires.
    fn submit_one(
        &self,
        queue: &A::Queue,
        submit: VulkanSubmit<A>,
        encoders: &mut [(CommandBufferLevel, A::CommandBuffer, Option<A::CommandEncoder>)],
    ) -> Result<hal::FenceValue, CoreError> {
        let fence = self.fences.acquire(&self.hal_device)?;
        let fence_value = unsafe { self.hal_device.get_fence_value(&fence) }?;
        let target_value = fence_value + 1;

        let wait_semaphores: Vec<(A::Semaphore, hal::StageFlags)> =
            submit.info.wait_semaphores.iter().cloned().zip(submit.info.wait_stages.iter().copied()).collect();

        unsafe {
            queue.submit(&submit.info.command_buffers, &wait_semaphores, &submit.info.signal_semaphores, Some((&fence, target_value)))?;
        }

        // A `Present` submit's `queue_present` call is issued by the
        // façade, which owns the `A::SurfaceTexture` the swapchain handed
        // out; this core only guarantees the acquire wait and
        // `swapchain_index` bookkeeping the Submit Compiler already wired
        // into `submit.info` (spec §4.4, §5 "a submit with Present kind
        // synchronously issues queue_present after queue_submit").

        for (level, finished, encoder_slot) in encoders.iter_mut() {
            if submit.info.command_buffers.iter().any(|cb| cb == finished) {
                if let Some(encoder) = encoder_slot.take() {
                    self.deleter.safe_destroy_command_buffer(*level, finished.clone(), encoder);
                }
            }
        }

        self.tracker.add(target_value, fence, vec![submit.object]);
        Ok(target_value)
    }

    /// Checks every acquired fence's current value against the hal device
    /// and clears any that have retired, releasing it back to the fence
    /// pool and running the deferred deleter's drain. The façade is
    /// expected to call this periodically (e.g. once per frame) rather
    /// than the core polling on its own thread.
    pub fn poll_fences(&self, fence: &A::Fence, fence_value: hal::FenceValue) -> Result<(), CoreError> {
        let retired = unsafe { self.hal_device.get_fence_value(fence) }?;
        if retired >= fence_value {
            self.tracker.clear(fence_value);
            self.fences.release(fence.clone());
        }
        Ok(())
    }

    /// Waits for every pending submission to complete, then drains every
    /// queued destroy unconditionally (spec §4.6: the destructor path
    /// assumes `device_wait_idle` already ran).
    pub fn shutdown(&self) -> Result<(), CoreError> {
        unsafe { self.hal_device.wait_idle() }?;
        self.deleter.destroy_remaining();
        self.semaphores.destroy_all(&self.hal_device);
        self.fences.destroy_all(&self.hal_device);
        self.command_buffers.destroy_all(&self.hal_device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hal::empty::{signal_fence, Context, EmptyDevice, EmptyQueue};

    use super::*;
    use crate::command::Recorder;

    fn device() -> Arc<Device<Context>> {
        Device::new(Arc::new(EmptyDevice::new()), EmptyQueue, gpu_types::Limits::default())
    }

    #[test]
    fn create_and_immediately_destroy_buffer_is_not_deferred() {
        let device = device();
        let buffer = device.create_buffer(256, gpu_types::BufferUsages::STORAGE).unwrap();
        device.destroy_buffer(buffer);
        // Nothing inflight references it, so the deleter's queue stays empty.
        assert_eq!(device.deleter.queued_buffer_count(), 0);
    }

    #[test]
    fn submit_a_bare_compute_dispatch_and_retire_its_fence() {
        let device = device();
        let layout = device.create_pipeline_layout().unwrap();
        let pipeline = device.create_compute_pipeline(layout).unwrap();

        let mut recorder = Recorder::<Context>::new();
        recorder.begin_compute_pass();
        recorder.set_compute_pipeline(pipeline);
        recorder.dispatch(1, 1, 1).unwrap();
        recorder.end_compute_pass();
        let result = recorder.finish();

        let fence_values = device
            .submit(vec![PendingEncoding { level: CommandBufferLevel::Primary, result }])
            .unwrap();
        assert_eq!(fence_values.len(), 1);

        // The empty backend's queue signals the fence synchronously, so the
        // first poll already observes it retired.
        let fence = device.fences.acquire(&device.hal_device).unwrap();
        signal_fence(&fence, fence_values[0]);
        device.poll_fences(&fence, fence_values[0]).unwrap();
    }

    #[test]
    fn compute_pipeline_destroy_is_deferred_while_its_fence_is_outstanding() {
        let device = device();
        let layout = device.create_pipeline_layout().unwrap();
        let pipeline = device.create_compute_pipeline(layout).unwrap();

        let mut recorder = Recorder::<Context>::new();
        recorder.begin_compute_pass();
        recorder.set_compute_pipeline(pipeline.clone());
        recorder.dispatch(1, 1, 1).unwrap();
        recorder.end_compute_pass();
        let result = recorder.finish();

        let fence_values = device
            .submit(vec![PendingEncoding { level: CommandBufferLevel::Primary, result }])
            .unwrap();

        device.destroy_compute_pipeline(pipeline);
        assert_eq!(device.deleter.queued_compute_pipeline_count(), 1);

        device.tracker.clear(fence_values[0]);
        assert_eq!(device.deleter.queued_compute_pipeline_count(), 0);
    }

    #[test]
    fn shutdown_waits_idle_and_drains_every_deferred_destroy() {
        let device = device();
        let buffer = device.create_buffer(64, gpu_types::BufferUsages::STORAGE).unwrap();
        let fence = device.fences.acquire(&device.hal_device).unwrap();
        device.tracker.add(1, fence, vec![Default::default()]);
        device.destroy_buffer(buffer);
        assert_eq!(device.deleter.queued_buffer_count(), 1);

        // shutdown drains unconditionally (spec §4.6: it assumes
        // wait_idle already ran), regardless of what the tracker thinks.
        device.shutdown().unwrap();
        assert_eq!(device.deleter.queued_buffer_count(), 0);
    }
}
