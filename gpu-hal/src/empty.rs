//! A backend that does no GPU work.
//!
//! Every handle type is a bare `u64` counter; every command is a no-op.
//! `gpu-core`'s test suite links against this backend so the Synchronizer
//! and Submit Compiler's barrier/semaphore bookkeeping can be asserted on
//! without a live GPU, matching the observability goal spec's design notes
//! call out explicitly.

use crate::{
    AccessFlags, Api, BufferBarrier, ClearValue, CommandBufferLevel, CommandEncoder,
    DescriptorPoolSizes, Device, DeviceError, FenceValue, FramebufferDescriptor, IndexFormat,
    Queue, RenderArea, RenderPassDescriptor, StageFlags, SurfaceError, TextureBarrier,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn next_handle(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed)
}

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub struct Context;

impl Api for Context {
    type Device = EmptyDevice;
    type Queue = EmptyQueue;
    type CommandEncoder = EmptyEncoder;

    type Buffer = Handle;
    type Texture = Handle;
    type TextureView = Handle;
    type Sampler = Handle;
    type CommandBuffer = Handle;
    type Semaphore = Handle;
    type Fence = EmptyFence;
    type BindGroupLayout = Handle;
    type BindGroup = Handle;
    type PipelineLayout = Handle;
    type RenderPipeline = Handle;
    type ComputePipeline = Handle;
    type QuerySet = Handle;
    type RenderPass = Handle;
    type Framebuffer = Handle;
    type DescriptorPool = Handle;
    type SurfaceTexture = Handle;
}

/// An opaque counter standing in for any object this backend "creates".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

fn fresh() -> Handle {
    Handle(next_handle(&HANDLE_COUNTER))
}

#[derive(Clone, Debug)]
pub struct EmptyFence {
    value: Arc<AtomicU64>,
}

/// One barrier command as the synchronizer issued it, retained for test
/// assertions (spec §8's barrier-count properties read these back).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedBarrier {
    pub src_stage: StageFlags,
    pub dst_stage: StageFlags,
    pub buffer_count: usize,
    pub texture_count: usize,
}

#[derive(Default)]
struct EncoderLog {
    barriers: Vec<RecordedBarrier>,
    render_passes_begun: u32,
    draws: u32,
    dispatches: u32,
}

pub struct EmptyEncoder {
    log: EncoderLog,
    ended: bool,
}

impl EmptyEncoder {
    pub fn new() -> Self {
        Self { log: EncoderLog::default(), ended: false }
    }

    pub fn recorded_barriers(&self) -> &[RecordedBarrier] {
        &self.log.barriers
    }
}

impl Default for EmptyEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEncoder<Context> for EmptyEncoder {
    unsafe fn begin_encoding(&mut self) -> Result<(), DeviceError> {
        self.ended = false;
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<Handle, DeviceError> {
        self.ended = true;
        Ok(fresh())
    }

    unsafe fn discard_encoding(&mut self) {
        self.log = EncoderLog::default();
    }

    unsafe fn cmd_pipeline_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        buffer_barriers: &[BufferBarrier<Context>],
        texture_barriers: &[TextureBarrier<Context>],
    ) {
        self.log.barriers.push(RecordedBarrier {
            src_stage,
            dst_stage,
            buffer_count: buffer_barriers.len(),
            texture_count: texture_barriers.len(),
        });
    }

    unsafe fn cmd_begin_render_pass(
        &mut self,
        _render_pass: &Handle,
        _framebuffer: &Handle,
        _render_area: RenderArea,
        _clear_values: &[ClearValue],
    ) {
        self.log.render_passes_begun += 1;
    }

    unsafe fn cmd_end_render_pass(&mut self) {}
    unsafe fn cmd_bind_render_pipeline(&mut self, _pipeline: &Handle, _layout: &Handle) {}
    unsafe fn cmd_bind_compute_pipeline(&mut self, _pipeline: &Handle, _layout: &Handle) {}
    unsafe fn cmd_bind_descriptor_set(&mut self, _index: u32, _set: &Handle) {}
    unsafe fn cmd_bind_vertex_buffer(&mut self, _slot: u32, _buffer: &Handle) {}
    unsafe fn cmd_bind_index_buffer(&mut self, _buffer: &Handle, _format: IndexFormat) {}
    unsafe fn cmd_set_viewport(&mut self) {}
    unsafe fn cmd_set_scissor(&mut self) {}
    unsafe fn cmd_set_blend_constant(&mut self, _constant: [f32; 4]) {}

    unsafe fn cmd_draw(&mut self, _vertex_count: u32, _instance_count: u32) {
        self.log.draws += 1;
    }

    unsafe fn cmd_draw_indexed(&mut self, _index_count: u32, _instance_count: u32) {
        self.log.draws += 1;
    }

    unsafe fn cmd_draw_indirect(&mut self, _buffer: &Handle, _offset: u64) {
        self.log.draws += 1;
    }

    unsafe fn cmd_draw_indexed_indirect(&mut self, _buffer: &Handle, _offset: u64) {
        self.log.draws += 1;
    }

    unsafe fn cmd_dispatch(&mut self, _x: u32, _y: u32, _z: u32) {
        self.log.dispatches += 1;
    }

    unsafe fn cmd_dispatch_indirect(&mut self, _buffer: &Handle, _offset: u64) {
        self.log.dispatches += 1;
    }

    unsafe fn cmd_begin_query(&mut self, _set: &Handle, _index: u32) {}
    unsafe fn cmd_end_query(&mut self, _set: &Handle, _index: u32) {}
    unsafe fn cmd_write_timestamp(&mut self, _set: &Handle, _index: u32) {}
    unsafe fn cmd_resolve_query_set(&mut self, _set: &Handle, _start: u32, _count: u32) {}
    unsafe fn cmd_copy_buffer_to_buffer(&mut self, _src: &Handle, _dst: &Handle, _size: u64) {}
    unsafe fn cmd_copy_buffer_to_texture(
        &mut self,
        _src: &Handle,
        _dst: &Handle,
        _mip_level: u32,
        _extent: gpu_types::Extent3d,
    ) {
    }
    unsafe fn cmd_copy_texture_to_buffer(
        &mut self,
        _src: &Handle,
        _dst: &Handle,
        _mip_level: u32,
        _extent: gpu_types::Extent3d,
    ) {
    }
    unsafe fn cmd_copy_texture_to_texture(
        &mut self,
        _src: &Handle,
        _dst: &Handle,
        _mip_level: u32,
        _extent: gpu_types::Extent3d,
    ) {
    }
    unsafe fn cmd_clear_buffer(&mut self, _buffer: &Handle, _offset: u64, _size: u64) {}
}

pub struct EmptyDevice {
    fences: Mutex<Vec<Arc<AtomicU64>>>,
}

impl EmptyDevice {
    pub fn new() -> Self {
        Self { fences: Mutex::new(Vec::new()) }
    }
}

impl Default for EmptyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device<Context> for EmptyDevice {
    unsafe fn create_buffer(
        &self,
        _size: u64,
        _usage: gpu_types::BufferUsages,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_buffer(&self, _buffer: Handle) {}

    unsafe fn create_texture(
        &self,
        _format: gpu_types::TextureFormat,
        _extent: gpu_types::Extent3d,
        _mip_levels: u32,
        _samples: u32,
        _usage: gpu_types::TextureUsages,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_texture(&self, _texture: Handle) {}

    unsafe fn create_texture_view(&self, _texture: &Handle) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_texture_view(&self, _view: Handle) {}

    unsafe fn create_sampler(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_sampler(&self, _sampler: Handle) {}

    unsafe fn create_bind_group_layout(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_bind_group_layout(&self, _layout: Handle) {}

    unsafe fn create_bind_group(
        &self,
        _pool: &Handle,
        _layout: &Handle,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_bind_group(&self, _group: Handle) {}

    unsafe fn create_pipeline_layout(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_pipeline_layout(&self, _layout: Handle) {}

    unsafe fn create_render_pipeline(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_render_pipeline(&self, _pipeline: Handle) {}

    unsafe fn create_compute_pipeline(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_compute_pipeline(&self, _pipeline: Handle) {}

    unsafe fn create_query_set(&self, _count: u32) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_query_set(&self, _set: Handle) {}

    unsafe fn create_render_pass(
        &self,
        _desc: &RenderPassDescriptor,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_render_pass(&self, _pass: Handle) {}

    unsafe fn create_framebuffer(
        &self,
        _desc: &FramebufferDescriptor<Context>,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_framebuffer(&self, _framebuffer: Handle) {}

    unsafe fn create_descriptor_pool(
        &self,
        _max_sets: u32,
        _sizes: DescriptorPoolSizes,
    ) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_descriptor_pool(&self, _pool: Handle) {}

    unsafe fn allocate_command_buffer(
        &self,
        _level: CommandBufferLevel,
    ) -> Result<EmptyEncoder, DeviceError> {
        Ok(EmptyEncoder::new())
    }
    unsafe fn destroy_command_encoder(&self, _encoder: EmptyEncoder) {}

    unsafe fn create_semaphore(&self) -> Result<Handle, DeviceError> {
        Ok(fresh())
    }
    unsafe fn destroy_semaphore(&self, _semaphore: Handle) {}

    unsafe fn create_fence(&self) -> Result<EmptyFence, DeviceError> {
        let value = Arc::new(AtomicU64::new(0));
        self.fences.lock().push(value.clone());
        Ok(EmptyFence { value })
    }
    unsafe fn destroy_fence(&self, _fence: EmptyFence) {}

    unsafe fn get_fence_value(&self, fence: &EmptyFence) -> Result<FenceValue, DeviceError> {
        Ok(fence.value.load(Ordering::Acquire))
    }

    unsafe fn wait_idle(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub struct EmptyQueue;

impl Queue<Context> for EmptyQueue {
    unsafe fn submit(
        &self,
        _command_buffers: &[Handle],
        _wait_semaphores: &[(Handle, StageFlags)],
        _signal_semaphores: &[Handle],
        signal_fence: Option<(&EmptyFence, FenceValue)>,
    ) -> Result<(), DeviceError> {
        if let Some((fence, value)) = signal_fence {
            fence.value.store(value, Ordering::Release);
        }
        Ok(())
    }

    unsafe fn present(
        &self,
        _surface_texture: Handle,
        _wait_semaphores: &[Handle],
    ) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// Drives a fence to a value directly, bypassing `submit`, for tests that
/// want to simulate a GPU completing work asynchronously.
pub fn signal_fence(fence: &EmptyFence, value: FenceValue) {
    fence.value.store(value, Ordering::Release);
}

/// Unused by the backend itself; retained so callers don't need to depend
/// on `AccessFlags` just to build a `BufferBarrier`/`TextureBarrier` in
/// tests.
pub const _ALL_ACCESS: AccessFlags = AccessFlags::MEMORY_READ;
