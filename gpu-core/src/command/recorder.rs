use std::sync::Arc;

use hal::{Api, ClearValue, IndexFormat, RenderArea};

use super::{Command, CommandEncodingResult, RenderAttachment, RenderBundle, TimestampWrites};
use crate::error::{record_error, CoreError};
use crate::resource::{BindGroup, Buffer, ComputePipeline, RenderPipeline, Texture};
use crate::track::ResourceTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PassKind {
    None,
    Compute,
    Render,
}

/// Encodes API calls into a typed command list and feeds the Resource
/// Tracker. Performs no GPU calls itself — a pure encoder, per spec §4.1.
pub struct Recorder<A: Api> {
    commands: Vec<Command<A>>,
    tracker: ResourceTracker,
    pass: PassKind,
    has_pipeline: bool,
}

impl<A: Api> Default for Recorder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Api> Recorder<A> {
    pub fn new() -> Self {
        Self { commands: Vec::new(), tracker: ResourceTracker::new(), pass: PassKind::None, has_pipeline: false }
    }

    pub fn begin_compute_pass(&mut self) {
        debug_assert_eq!(self.pass, PassKind::None, "begin_compute_pass called while a pass is already open");
        self.tracker.begin_compute_pass();
        self.pass = PassKind::Compute;
        self.has_pipeline = false;
        self.commands.push(Command::BeginComputePass);
    }

    pub fn set_compute_pipeline(&mut self, pipeline: Arc<ComputePipeline<A>>) {
        self.has_pipeline = true;
        self.commands.push(Command::SetComputePipeline(pipeline));
    }

    pub fn set_compute_bind_group(
        &mut self,
        index: u32,
        bind_group: Arc<BindGroup<A>>,
        dynamic_offsets: Vec<u32>,
    ) {
        self.tracker.add_compute_bind_group(&bind_group);
        self.commands.push(Command::SetComputeBindGroup { index, bind_group, dynamic_offsets });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("dispatch without a bound pipeline"), "dispatch without pipeline");
        self.commands.push(Command::Dispatch { x, y, z });
        Ok(())
    }

    pub fn dispatch_indirect(&mut self, buffer: Arc<Buffer<A>>, offset: u64) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("dispatch_indirect without a bound pipeline"), "dispatch without pipeline");
        self.commands.push(Command::DispatchIndirect { buffer, offset });
        Ok(())
    }

    pub fn end_compute_pass(&mut self) {
        self.tracker.end_compute_pass();
        self.pass = PassKind::None;
        self.commands.push(Command::EndComputePass);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn begin_render_pass(
        &mut self,
        render_pass: A::RenderPass,
        framebuffer: A::Framebuffer,
        color_attachments: Vec<RenderAttachment<A>>,
        depth_stencil_attachment: Option<RenderAttachment<A>>,
        render_area: RenderArea,
        clear_values: Vec<ClearValue>,
        occlusion_query_set: Option<A::QuerySet>,
        timestamp_writes: Option<TimestampWrites<A>>,
    ) -> Result<(), CoreError> {
        record_error!(
            self.pass != PassKind::None,
            CoreError::InvalidState("begin_render_pass called while a pass is already open"),
            "nested pass"
        );
        record_error!(
            color_attachments.is_empty() && depth_stencil_attachment.is_none(),
            CoreError::InvalidState("begin_render_pass with no attachments"),
            "render pass with no attachments"
        );

        self.tracker.begin_render_pass();
        for attachment in color_attachments.iter().chain(depth_stencil_attachment.iter()) {
            self.tracker.add_color_attachment(
                attachment.texture.id(),
                attachment.initial_layout,
                attachment.final_layout,
                0,
                1,
                0,
                1,
            );
        }
        self.pass = PassKind::Render;
        self.has_pipeline = false;
        self.commands.push(Command::BeginRenderPass {
            render_pass,
            framebuffer,
            color_attachments,
            depth_stencil_attachment,
            render_area,
            clear_values,
            occlusion_query_set,
            timestamp_writes,
        });
        Ok(())
    }

    pub fn set_render_pipeline(&mut self, pipeline: Arc<RenderPipeline<A>>) {
        self.has_pipeline = true;
        self.commands.push(Command::SetRenderPipeline(pipeline));
    }

    pub fn set_bind_group(&mut self, index: u32, bind_group: Arc<BindGroup<A>>, dynamic_offsets: Vec<u32>) {
        self.tracker.add_render_bind_group(&bind_group);
        self.commands.push(Command::SetBindGroup { index, bind_group, dynamic_offsets });
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: Arc<Buffer<A>>) {
        self.tracker.add_vertex_buffer(buffer.id());
        self.commands.push(Command::SetVertexBuffer { slot, buffer });
    }

    pub fn set_index_buffer(&mut self, buffer: Arc<Buffer<A>>, format: IndexFormat) {
        self.tracker.add_index_buffer(buffer.id());
        self.commands.push(Command::SetIndexBuffer { buffer, format });
    }

    /// Replays a pre-recorded bundle's commands into the current render
    /// pass, feeding each one through the same Resource Tracker calls a
    /// directly-recorded command would (spec §4.1/§4.2 apply uniformly to
    /// bundled and inline commands alike).
    pub fn execute_bundle(&mut self, bundles: Vec<Arc<RenderBundle<A>>>) {
        for bundle in &bundles {
            for command in &bundle.commands {
                match command {
                    Command::SetBindGroup { bind_group, .. } => self.tracker.add_render_bind_group(bind_group),
                    Command::SetVertexBuffer { buffer, .. } => self.tracker.add_vertex_buffer(buffer.id()),
                    Command::SetIndexBuffer { buffer, .. } => self.tracker.add_index_buffer(buffer.id()),
                    _ => {}
                }
            }
        }
        self.commands.push(Command::ExecuteBundle(bundles));
    }

    pub fn set_viewport(&mut self) {
        self.commands.push(Command::SetViewport);
    }

    pub fn set_scissor(&mut self) {
        self.commands.push(Command::SetScissor);
    }

    pub fn set_blend_constant(&mut self, constant: [f32; 4]) {
        self.commands.push(Command::SetBlendConstant(constant));
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("draw without a bound pipeline"), "draw without pipeline");
        self.commands.push(Command::Draw { vertex_count, instance_count });
        Ok(())
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("draw_indexed without a bound pipeline"), "draw without pipeline");
        self.commands.push(Command::DrawIndexed { index_count, instance_count });
        Ok(())
    }

    pub fn draw_indirect(&mut self, buffer: Arc<Buffer<A>>, offset: u64) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("draw_indirect without a bound pipeline"), "draw without pipeline");
        self.commands.push(Command::DrawIndirect { buffer, offset });
        Ok(())
    }

    pub fn draw_indexed_indirect(&mut self, buffer: Arc<Buffer<A>>, offset: u64) -> Result<(), CoreError> {
        record_error!(!self.has_pipeline, CoreError::InvalidState("draw_indexed_indirect without a bound pipeline"), "draw without pipeline");
        self.commands.push(Command::DrawIndexedIndirect { buffer, offset });
        Ok(())
    }

    pub fn begin_occlusion_query(&mut self, index: u32) {
        self.commands.push(Command::BeginOcclusionQuery { index });
    }

    pub fn end_occlusion_query(&mut self) {
        self.commands.push(Command::EndOcclusionQuery);
    }

    pub fn end_render_pass(&mut self) {
        self.tracker.end_render_pass();
        self.pass = PassKind::None;
        self.commands.push(Command::EndRenderPass);
    }

    pub fn copy_buffer_to_buffer(&mut self, src: Arc<Buffer<A>>, dst: Arc<Buffer<A>>, size: u64) {
        self.commands.push(Command::CopyBufferToBuffer { src, dst, size });
    }

    pub fn copy_buffer_to_texture(
        &mut self,
        src: Arc<Buffer<A>>,
        dst: Arc<Texture<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        self.commands.push(Command::CopyBufferToTexture { src, dst, mip_level, extent });
    }

    pub fn copy_texture_to_buffer(
        &mut self,
        src: Arc<Texture<A>>,
        dst: Arc<Buffer<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        self.commands.push(Command::CopyTextureToBuffer { src, dst, mip_level, extent });
    }

    pub fn copy_texture_to_texture(
        &mut self,
        src: Arc<Texture<A>>,
        dst: Arc<Texture<A>>,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        self.commands.push(Command::CopyTextureToTexture { src, dst, mip_level, extent });
    }

    pub fn resolve_query_set(&mut self, start: u32, count: u32) {
        self.commands.push(Command::ResolveQuerySet { start, count });
    }

    pub fn write_timestamp(&mut self, index: u32) {
        self.commands.push(Command::WriteTimestamp { index });
    }

    pub fn clear_buffer(&mut self, buffer: Arc<Buffer<A>>, offset: u64, size: u64) {
        self.commands.push(Command::ClearBuffer { buffer, offset, size });
    }

    pub fn finish(self) -> CommandEncodingResult<A> {
        CommandEncodingResult { commands: self.commands, pass_resource_infos: self.tracker.finish() }
    }
}
