/*! The "Vulkan-like low-level GPU" gpu-core is written against.
 *
 * This crate defines the capability set spec §1 describes in the abstract
 * (explicit barriers, image layouts, queue-family ownership, timeline/binary
 * semaphores, fences, descriptor pools, render-pass objects) as a set of
 * Rust traits, plus two implementations of it:
 *
 * - [`vulkan`], a real backend built on `ash`.
 * - [`empty`], a backend that performs no GPU work and just records what it
 *   was asked to do. gpu-core's test suite links against this one so that
 *   the synchronization invariants in spec §8 are checkable without a GPU.
 *
 * As spec §1 notes, the numeric GPU-driver bindings themselves are out of
 * scope for this exercise; this crate exists so `gpu-core` has a concrete,
 * compilable interface to program against.
 */

#![allow(clippy::too_many_arguments)]

#[cfg(feature = "vulkan")]
pub mod vulkan;

pub mod empty;

use std::fmt::Debug;

pub use gpu_types as wgt;

/// The value a fence counts up to. Matches `wgpu-hal`'s `FenceValue` (a
/// monotonically increasing submission counter rather than a raw `VkFence`).
pub type FenceValue = u64;

#[derive(Clone, Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("device lost")]
    Lost,
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface lost")]
    Lost,
    #[error("surface is out of date and must be reconfigured")]
    Outdated,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Image layout, named the way spec §3 names them rather than after
/// `VkImageLayout`'s full enumeration — only the layouts the synchronizer
/// and copy path actually transition into appear here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

bitflags::bitflags! {
    /// Pipeline stage mask, matching `VkPipelineStageFlagBits` but limited to
    /// the stages spec §3/§4 actually names.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        const TOP_OF_PIPE            = 1 << 0;
        const BOTTOM_OF_PIPE         = 1 << 1;
        const VERTEX_INPUT           = 1 << 2;
        const VERTEX_SHADER          = 1 << 3;
        const FRAGMENT_SHADER        = 1 << 4;
        const EARLY_FRAGMENT_TESTS   = 1 << 5;
        const LATE_FRAGMENT_TESTS    = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER         = 1 << 8;
        const TRANSFER               = 1 << 9;
        const ALL_COMMANDS           = 1 << 10;
        const NONE                   = 0;
    }
}

bitflags::bitflags! {
    /// Memory access mask, matching `VkAccessFlagBits`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const NONE                          = 0;
        const INDIRECT_COMMAND_READ         = 1 << 0;
        const INDEX_READ                    = 1 << 1;
        const VERTEX_ATTRIBUTE_READ         = 1 << 2;
        const UNIFORM_READ                  = 1 << 3;
        const SHADER_READ                   = 1 << 4;
        const SHADER_WRITE                  = 1 << 5;
        const COLOR_ATTACHMENT_READ         = 1 << 6;
        const COLOR_ATTACHMENT_WRITE        = 1 << 7;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 9;
        const TRANSFER_READ                 = 1 << 10;
        const TRANSFER_WRITE                = 1 << 11;
        const MEMORY_READ                   = 1 << 12;
        const MEMORY_WRITE                  = 1 << 13;
    }
}

/// How a color/depth-stencil attachment begins and ends a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// Index format, named the way spec-level callers pick it: a vertex index
/// buffer's element width, needed by `cmd_bind_index_buffer` to pick the
/// right `VkIndexType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// The rectangle `cmd_begin_render_pass` clips rendering to, matching
/// `VkRenderPassBeginInfo::renderArea`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One attachment's clear value, matching `VkClearValue`'s union.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// One `VkBufferMemoryBarrier`-equivalent.
#[derive(Clone, Debug)]
pub struct BufferBarrier<A: Api> {
    pub buffer: A::Buffer,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// One `VkImageMemoryBarrier`-equivalent.
#[derive(Clone, Debug)]
pub struct TextureBarrier<A: Api> {
    pub texture: A::Texture,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

/// Describes one color or depth-stencil attachment for the render-pass
/// cache's key (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: gpu_types::TextureFormat,
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: TextureLayout,
    pub final_layout: TextureLayout,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderPassDescriptor {
    pub colors: Vec<AttachmentDesc>,
    pub depth_stencil: Option<AttachmentDesc>,
}

#[derive(Clone, Debug)]
pub struct FramebufferDescriptor<A: Api> {
    pub render_pass: A::RenderPass,
    pub color_views: Vec<A::TextureView>,
    pub resolve_views: Vec<Option<A::TextureView>>,
    pub depth_stencil_view: Option<A::TextureView>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptorPoolSizes {
    pub uniform_buffers: u32,
    pub uniform_buffers_dynamic: u32,
    pub samplers: u32,
    pub sampled_images: u32,
    pub combined_image_samplers: u32,
    pub input_attachments: u32,
    pub storage_buffers: u32,
    pub storage_buffers_dynamic: u32,
}

/// The small, closed backend set this capability set is implemented for.
/// Per the design notes, this stands in for the source's base-class
/// pointer + `downcast` pattern: a tagged set of associated types rather
/// than open dynamic dispatch.
pub trait Api: Clone + Debug + Sized + 'static {
    type Device: Device<Self>;
    type Queue: Queue<Self>;
    type CommandEncoder: CommandEncoder<Self>;

    type Buffer: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type Texture: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type TextureView: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type Sampler: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type CommandBuffer: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type Semaphore: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type Fence: Clone + Debug + Send + Sync;
    type BindGroupLayout: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type BindGroup: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type PipelineLayout: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type RenderPipeline: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type ComputePipeline: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type QuerySet: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type RenderPass: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type Framebuffer: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type DescriptorPool: Clone + Debug + PartialEq + Eq + std::hash::Hash + Send + Sync;
    type SurfaceTexture: Clone + Debug + Send + Sync;
}

/// Device-level object creation and destruction. Every `create_*`/`destroy_*`
/// pair here backs one of spec §4.7's pools or caches, or one of §6's
/// `create` operations.
pub trait Device<A: Api> {
    unsafe fn create_buffer(
        &self,
        size: u64,
        usage: gpu_types::BufferUsages,
    ) -> Result<A::Buffer, DeviceError>;
    unsafe fn destroy_buffer(&self, buffer: A::Buffer);

    unsafe fn create_texture(
        &self,
        format: gpu_types::TextureFormat,
        extent: gpu_types::Extent3d,
        mip_levels: u32,
        samples: u32,
        usage: gpu_types::TextureUsages,
    ) -> Result<A::Texture, DeviceError>;
    unsafe fn destroy_texture(&self, texture: A::Texture);

    unsafe fn create_texture_view(&self, texture: &A::Texture) -> Result<A::TextureView, DeviceError>;
    unsafe fn destroy_texture_view(&self, view: A::TextureView);

    unsafe fn create_sampler(&self) -> Result<A::Sampler, DeviceError>;
    unsafe fn destroy_sampler(&self, sampler: A::Sampler);

    unsafe fn create_bind_group_layout(&self) -> Result<A::BindGroupLayout, DeviceError>;
    unsafe fn destroy_bind_group_layout(&self, layout: A::BindGroupLayout);

    unsafe fn create_bind_group(
        &self,
        pool: &A::DescriptorPool,
        layout: &A::BindGroupLayout,
    ) -> Result<A::BindGroup, DeviceError>;
    unsafe fn destroy_bind_group(&self, group: A::BindGroup);

    unsafe fn create_pipeline_layout(&self) -> Result<A::PipelineLayout, DeviceError>;
    unsafe fn destroy_pipeline_layout(&self, layout: A::PipelineLayout);

    unsafe fn create_render_pipeline(&self) -> Result<A::RenderPipeline, DeviceError>;
    unsafe fn destroy_render_pipeline(&self, pipeline: A::RenderPipeline);

    unsafe fn create_compute_pipeline(&self) -> Result<A::ComputePipeline, DeviceError>;
    unsafe fn destroy_compute_pipeline(&self, pipeline: A::ComputePipeline);

    unsafe fn create_query_set(&self, count: u32) -> Result<A::QuerySet, DeviceError>;
    unsafe fn destroy_query_set(&self, set: A::QuerySet);

    /// Structural lookup is the cache's job (gpu-core); this call always
    /// allocates a fresh render pass object.
    unsafe fn create_render_pass(
        &self,
        desc: &RenderPassDescriptor,
    ) -> Result<A::RenderPass, DeviceError>;
    unsafe fn destroy_render_pass(&self, pass: A::RenderPass);

    unsafe fn create_framebuffer(
        &self,
        desc: &FramebufferDescriptor<A>,
    ) -> Result<A::Framebuffer, DeviceError>;
    unsafe fn destroy_framebuffer(&self, framebuffer: A::Framebuffer);

    unsafe fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: DescriptorPoolSizes,
    ) -> Result<A::DescriptorPool, DeviceError>;
    unsafe fn destroy_descriptor_pool(&self, pool: A::DescriptorPool);

    unsafe fn allocate_command_buffer(
        &self,
        level: CommandBufferLevel,
    ) -> Result<A::CommandEncoder, DeviceError>;
    unsafe fn destroy_command_encoder(&self, encoder: A::CommandEncoder);

    unsafe fn create_semaphore(&self) -> Result<A::Semaphore, DeviceError>;
    unsafe fn destroy_semaphore(&self, semaphore: A::Semaphore);

    unsafe fn create_fence(&self) -> Result<A::Fence, DeviceError>;
    unsafe fn destroy_fence(&self, fence: A::Fence);
    /// Highest fence value this fence has observed as signaled.
    unsafe fn get_fence_value(&self, fence: &A::Fence) -> Result<FenceValue, DeviceError>;
    unsafe fn wait_idle(&self) -> Result<(), DeviceError>;
}

/// A single queue submission and presentation surface.
pub trait Queue<A: Api> {
    unsafe fn submit(
        &self,
        command_buffers: &[A::CommandBuffer],
        wait_semaphores: &[(A::Semaphore, StageFlags)],
        signal_semaphores: &[A::Semaphore],
        signal_fence: Option<(&A::Fence, FenceValue)>,
    ) -> Result<(), DeviceError>;

    unsafe fn present(
        &self,
        surface_texture: A::SurfaceTexture,
        wait_semaphores: &[A::Semaphore],
    ) -> Result<(), SurfaceError>;
}

/// Records GPU commands into one command buffer. Mirrors the `CmdBind*` /
/// `CmdDraw*` / `CmdPipelineBarrier` surface spec §4.3 drives; the
/// Synchronizer calls straight through to these.
pub trait CommandEncoder<A: Api> {
    unsafe fn begin_encoding(&mut self) -> Result<(), DeviceError>;
    unsafe fn end_encoding(&mut self) -> Result<A::CommandBuffer, DeviceError>;
    unsafe fn discard_encoding(&mut self);

    unsafe fn cmd_pipeline_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        buffer_barriers: &[BufferBarrier<A>],
        texture_barriers: &[TextureBarrier<A>],
    );

    unsafe fn cmd_begin_render_pass(
        &mut self,
        render_pass: &A::RenderPass,
        framebuffer: &A::Framebuffer,
        render_area: RenderArea,
        clear_values: &[ClearValue],
    );
    unsafe fn cmd_end_render_pass(&mut self);

    unsafe fn cmd_bind_render_pipeline(&mut self, pipeline: &A::RenderPipeline, layout: &A::PipelineLayout);
    unsafe fn cmd_bind_compute_pipeline(&mut self, pipeline: &A::ComputePipeline, layout: &A::PipelineLayout);
    unsafe fn cmd_bind_descriptor_set(&mut self, index: u32, set: &A::BindGroup);
    unsafe fn cmd_bind_vertex_buffer(&mut self, slot: u32, buffer: &A::Buffer);
    unsafe fn cmd_bind_index_buffer(&mut self, buffer: &A::Buffer, format: IndexFormat);

    unsafe fn cmd_set_viewport(&mut self);
    unsafe fn cmd_set_scissor(&mut self);
    unsafe fn cmd_set_blend_constant(&mut self, constant: [f32; 4]);

    unsafe fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32);
    unsafe fn cmd_draw_indexed(&mut self, index_count: u32, instance_count: u32);
    unsafe fn cmd_draw_indirect(&mut self, buffer: &A::Buffer, offset: u64);
    unsafe fn cmd_draw_indexed_indirect(&mut self, buffer: &A::Buffer, offset: u64);

    unsafe fn cmd_dispatch(&mut self, x: u32, y: u32, z: u32);
    unsafe fn cmd_dispatch_indirect(&mut self, buffer: &A::Buffer, offset: u64);

    unsafe fn cmd_begin_query(&mut self, set: &A::QuerySet, index: u32);
    unsafe fn cmd_end_query(&mut self, set: &A::QuerySet, index: u32);
    unsafe fn cmd_write_timestamp(&mut self, set: &A::QuerySet, index: u32);
    unsafe fn cmd_resolve_query_set(&mut self, set: &A::QuerySet, start: u32, count: u32);

    unsafe fn cmd_copy_buffer_to_buffer(&mut self, src: &A::Buffer, dst: &A::Buffer, size: u64);
    unsafe fn cmd_copy_buffer_to_texture(
        &mut self,
        src: &A::Buffer,
        dst: &A::Texture,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    );
    unsafe fn cmd_copy_texture_to_buffer(
        &mut self,
        src: &A::Texture,
        dst: &A::Buffer,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    );
    unsafe fn cmd_copy_texture_to_texture(
        &mut self,
        src: &A::Texture,
        dst: &A::Texture,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    );
    unsafe fn cmd_clear_buffer(&mut self, buffer: &A::Buffer, offset: u64, size: u64);
}
