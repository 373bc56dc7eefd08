//! Command Recorder (spec §4.1): encodes API calls into typed command
//! records grouped by pass, and drives the Resource Tracker.

mod recorder;

pub use recorder::Recorder;

use std::sync::Arc;

use hal::{Api, ClearValue, IndexFormat, RenderArea};

use crate::resource::{BindGroup, Buffer, ComputePipeline, RenderPipeline, Texture, TextureView};

/// One WebGPU-encoder call, recorded immutably. One variant per command
/// kind rather than a parallel enum + downcast, per spec §9's design note.
pub enum Command<A: Api> {
    BeginComputePass,
    SetComputePipeline(Arc<ComputePipeline<A>>),
    SetComputeBindGroup {
        index: u32,
        bind_group: Arc<BindGroup<A>>,
        dynamic_offsets: Vec<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: Arc<Buffer<A>>,
        offset: u64,
    },
    EndComputePass,

    BeginRenderPass {
        render_pass: A::RenderPass,
        framebuffer: A::Framebuffer,
        color_attachments: Vec<RenderAttachment<A>>,
        depth_stencil_attachment: Option<RenderAttachment<A>>,
        render_area: RenderArea,
        clear_values: Vec<ClearValue>,
        occlusion_query_set: Option<A::QuerySet>,
        timestamp_writes: Option<TimestampWrites<A>>,
    },
    SetRenderPipeline(Arc<RenderPipeline<A>>),
    SetBindGroup {
        index: u32,
        bind_group: Arc<BindGroup<A>>,
        dynamic_offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer<A>>,
    },
    SetIndexBuffer {
        buffer: Arc<Buffer<A>>,
        format: IndexFormat,
    },
    ExecuteBundle(Vec<Arc<RenderBundle<A>>>),
    SetViewport,
    SetScissor,
    SetBlendConstant([f32; 4]),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    DrawIndirect {
        buffer: Arc<Buffer<A>>,
        offset: u64,
    },
    DrawIndexedIndirect {
        buffer: Arc<Buffer<A>>,
        offset: u64,
    },
    BeginOcclusionQuery {
        index: u32,
    },
    EndOcclusionQuery,
    EndRenderPass,

    CopyBufferToBuffer {
        src: Arc<Buffer<A>>,
        dst: Arc<Buffer<A>>,
        size: u64,
    },
    CopyBufferToTexture {
        src: Arc<Buffer<A>>,
        dst: Arc<Texture<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    },
    CopyTextureToBuffer {
        src: Arc<Texture<A>>,
        dst: Arc<Buffer<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    },
    CopyTextureToTexture {
        src: Arc<Texture<A>>,
        dst: Arc<Texture<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    },
    ResolveQuerySet {
        start: u32,
        count: u32,
    },
    WriteTimestamp {
        index: u32,
    },
    ClearBuffer {
        buffer: Arc<Buffer<A>>,
        offset: u64,
        size: u64,
    },
}

/// One color/depth-stencil attachment as seen by `BeginRenderPass`;
/// carries the attachment's view and the layouts its render-pass object
/// was created with, so the tracker can populate `dst`/`src` without
/// re-deriving them from the render-pass cache key.
pub struct RenderAttachment<A: Api> {
    pub view: Arc<TextureView<A>>,
    pub texture: Arc<Texture<A>>,
    pub initial_layout: hal::TextureLayout,
    pub final_layout: hal::TextureLayout,
    /// Set by the caller when `texture.owner == TextureOwner::Swapchain`:
    /// the presentation engine's acquire semaphore and the swapchain image
    /// index this attachment came from (spec §3 `SwapchainTexture`). The
    /// Submit Compiler reads this to pick `kind = Present` and wire the
    /// acquire wait.
    pub swapchain_acquire: Option<(A::Semaphore, u32)>,
}

/// Where a render pass's timestamp query writes land, mirroring WebGPU's
/// `RenderPassTimestampWrites`: a query set plus the optional indices for
/// the pass's start/end.
pub struct TimestampWrites<A: Api> {
    pub query_set: A::QuerySet,
    pub beginning_of_pass_write_index: Option<u32>,
    pub end_of_pass_write_index: Option<u32>,
}

/// A pre-recorded sequence of render-pass commands, replayable from inside
/// another pass via `Command::ExecuteBundle` — WebGPU's `GPURenderBundle`.
pub struct RenderBundle<A: Api> {
    pub commands: Vec<Command<A>>,
}

/// Output of `finish()`: the recorded commands plus one [`crate::types::PassResourceInfo`]
/// per pass boundary. Copy commands contribute no pass info (spec §3).
pub struct CommandEncodingResult<A: Api> {
    pub commands: Vec<Command<A>>,
    pub pass_resource_infos: Vec<crate::types::PassResourceInfo>,
}
