//! Synchronizer (spec §4.3): replays a recorded command stream against the
//! underlying GPU API, emitting pipeline barriers for every dependency
//! between a pass's `dst` and an earlier pass's `src` within the same
//! command buffer. Unresolved cross-command-buffer dependencies are
//! carried forward in [`CommandRecordResult::unsynced_pass_resource_infos`].

use rustc_hash::FxHashMap;

use hal::{AccessFlags, Api, BufferBarrier, CommandEncoder as _, StageFlags, TextureBarrier, TextureLayout};

use crate::command::Command;
use crate::error::CoreError;
use crate::resource::{BufferId, TextureId};
use crate::types::PassResourceInfo;

/// Output of the Synchronizer: the commands have all been replayed into
/// the hal command buffer by the time this is produced; what's left is
/// the bookkeeping the Submit Compiler needs.
pub struct CommandRecordResult {
    pub unsynced_pass_resource_infos: Vec<PassResourceInfo>,
}

#[derive(Default)]
struct Activated {
    buffers: Vec<BufferId>,
    textures: Vec<TextureId>,
}

pub struct Synchronizer<A: Api> {
    passes: Vec<PassResourceInfo>,
    pass_index: isize,
    activated: Activated,
    buffer_handles: FxHashMap<BufferId, A::Buffer>,
    texture_handles: FxHashMap<TextureId, A::Texture>,
}

impl<A: Api> Synchronizer<A> {
    pub fn new(passes: Vec<PassResourceInfo>) -> Self {
        Self {
            passes,
            pass_index: -1,
            activated: Activated::default(),
            buffer_handles: FxHashMap::default(),
            texture_handles: FxHashMap::default(),
        }
    }

    /// Replays `commands` into `encoder`, inserting barriers where the
    /// tracked pass infos say a dependency exists. Does not call
    /// `begin_encoding`/`end_encoding` — the caller owns the encoder's
    /// lifecycle.
    pub fn record(
        mut self,
        encoder: &mut A::CommandEncoder,
        commands: &[Command<A>],
    ) -> Result<CommandRecordResult, CoreError> {
        for command in commands {
            self.record_command(encoder, command);
        }

        let unsynced = self.passes.into_iter().filter(|p| !p.src.is_empty()).collect();
        Ok(CommandRecordResult { unsynced_pass_resource_infos: unsynced })
    }

    fn record_command(&mut self, encoder: &mut A::CommandEncoder, command: &Command<A>) {
        match command {
            Command::BeginComputePass => {
                self.pass_index += 1;
                self.activated = Activated::default();
            }
            Command::SetComputePipeline(pipeline) => unsafe {
                encoder.cmd_bind_compute_pipeline(&pipeline.raw, pipeline.layout());
            },
            Command::SetComputeBindGroup { index, bind_group, .. } => {
                unsafe { encoder.cmd_bind_descriptor_set(*index, &bind_group.raw) };
                for (_, buffer) in &bind_group.buffers {
                    self.register_buffer(buffer);
                    self.activated.buffers.push(buffer.id());
                }
                for (_, texture, _view) in &bind_group.textures {
                    self.register_texture(texture);
                    self.activated.textures.push(texture.id());
                }
            }
            Command::Dispatch { x, y, z } => {
                self.sync(encoder);
                unsafe { encoder.cmd_dispatch(*x, *y, *z) };
            }
            Command::DispatchIndirect { buffer, offset } => {
                self.register_buffer(buffer);
                self.sync(encoder);
                unsafe { encoder.cmd_dispatch_indirect(&buffer.raw, *offset) };
            }
            Command::EndComputePass => {}

            Command::BeginRenderPass {
                render_pass,
                framebuffer,
                color_attachments,
                depth_stencil_attachment,
                render_area,
                clear_values,
                occlusion_query_set: _,
                timestamp_writes: _,
            } => {
                self.pass_index += 1;
                self.activated = Activated::default();
                for attachment in color_attachments.iter().chain(depth_stencil_attachment.iter()) {
                    self.register_texture(&attachment.texture);
                }
                if let Some(current) = self.current_pass() {
                    self.activated.buffers = current.dst.buffers.keys().copied().collect();
                    self.activated.textures = current.dst.textures.keys().copied().collect();
                }
                self.sync(encoder);
                unsafe { encoder.cmd_begin_render_pass(render_pass, framebuffer, *render_area, clear_values) };
            }
            Command::SetRenderPipeline(pipeline) => unsafe {
                encoder.cmd_bind_render_pipeline(&pipeline.raw, pipeline.layout());
            },
            Command::SetBindGroup { index, bind_group, .. } => {
                unsafe { encoder.cmd_bind_descriptor_set(*index, &bind_group.raw) };
                for (_, buffer) in &bind_group.buffers {
                    self.register_buffer(buffer);
                }
                for (_, texture, _view) in &bind_group.textures {
                    self.register_texture(texture);
                }
            }
            Command::SetVertexBuffer { slot, buffer } => {
                self.register_buffer(buffer);
                unsafe { encoder.cmd_bind_vertex_buffer(*slot, &buffer.raw) };
            }
            Command::SetIndexBuffer { buffer, format } => {
                self.register_buffer(buffer);
                unsafe { encoder.cmd_bind_index_buffer(&buffer.raw, *format) };
            }
            Command::SetViewport => unsafe { encoder.cmd_set_viewport() },
            Command::SetScissor => unsafe { encoder.cmd_set_scissor() },
            Command::SetBlendConstant(c) => unsafe { encoder.cmd_set_blend_constant(*c) },
            Command::Draw { vertex_count, instance_count } => unsafe {
                encoder.cmd_draw(*vertex_count, *instance_count);
            },
            Command::DrawIndexed { index_count, instance_count } => unsafe {
                encoder.cmd_draw_indexed(*index_count, *instance_count);
            },
            Command::DrawIndirect { buffer, offset } => {
                self.register_buffer(buffer);
                unsafe { encoder.cmd_draw_indirect(&buffer.raw, *offset) };
            }
            Command::DrawIndexedIndirect { buffer, offset } => {
                self.register_buffer(buffer);
                unsafe { encoder.cmd_draw_indexed_indirect(&buffer.raw, *offset) };
            }
            Command::BeginOcclusionQuery { .. } | Command::EndOcclusionQuery => {}
            Command::EndRenderPass => unsafe { encoder.cmd_end_render_pass() },

            Command::CopyBufferToBuffer { src, dst, size } => {
                self.register_buffer(src);
                self.register_buffer(dst);
                unsafe { encoder.cmd_copy_buffer_to_buffer(&src.raw, &dst.raw, *size) };
            }
            Command::CopyBufferToTexture { src, dst, mip_level, extent } => {
                self.register_buffer(src);
                self.register_texture(dst);
                self.with_copy_bracket(encoder, dst, |encoder| unsafe {
                    encoder.cmd_copy_buffer_to_texture(&src.raw, &dst.raw, *mip_level, *extent);
                });
            }
            Command::CopyTextureToBuffer { src, dst, mip_level, extent } => {
                self.register_texture(src);
                self.register_buffer(dst);
                self.with_copy_bracket(encoder, src, |encoder| unsafe {
                    encoder.cmd_copy_texture_to_buffer(&src.raw, &dst.raw, *mip_level, *extent);
                });
            }
            Command::CopyTextureToTexture { src, dst, mip_level, extent } => {
                self.register_texture(src);
                self.register_texture(dst);
                self.with_copy_bracket(encoder, src, |encoder| unsafe {
                    encoder.cmd_copy_texture_to_texture(&src.raw, &dst.raw, *mip_level, *extent);
                });
            }
            Command::ResolveQuerySet { .. } | Command::WriteTimestamp { .. } => {}
            Command::ClearBuffer { buffer, offset, size } => {
                self.register_buffer(buffer);
                unsafe { encoder.cmd_clear_buffer(&buffer.raw, *offset, *size) };
            }
            Command::ExecuteBundle(bundles) => {
                for bundle in bundles {
                    for inner in &bundle.commands {
                        self.record_command(encoder, inner);
                    }
                }
            }
        }
    }

    fn register_buffer(&mut self, buffer: &std::sync::Arc<crate::resource::Buffer<A>>) {
        self.buffer_handles.entry(buffer.id()).or_insert_with(|| buffer.raw().clone());
    }

    fn register_texture(&mut self, texture: &std::sync::Arc<crate::resource::Texture<A>>) {
        self.texture_handles.entry(texture.id()).or_insert_with(|| texture.raw().clone());
    }

    fn current_pass(&self) -> Option<&PassResourceInfo> {
        (self.pass_index >= 0).then(|| &self.passes[self.pass_index as usize])
    }

    /// `sync()`: drains `self.activated`, matching each entry against
    /// the nearest preceding pass's `src` and emitting one batched
    /// pipeline barrier for everything matched.
    fn sync(&mut self, encoder: &mut A::CommandEncoder) {
        if self.activated.buffers.is_empty() && self.activated.textures.is_empty() {
            return;
        }

        let mut src_stage = StageFlags::NONE;
        let mut dst_stage = StageFlags::NONE;
        let mut buffer_barriers = Vec::new();
        let mut texture_barriers = Vec::new();

        for buffer in std::mem::take(&mut self.activated.buffers) {
            let Some(current_dst) = self.current_pass().and_then(|p| p.dst.buffers.get(&buffer)).copied() else {
                continue;
            };
            if let Some(producer) = self.find_and_remove_producer_buffer(buffer) {
                src_stage |= producer.stage_flags;
                dst_stage |= current_dst.stage_flags;
                buffer_barriers.push((buffer, producer.access_flags, current_dst.access_flags));
            }
        }

        for texture in std::mem::take(&mut self.activated.textures) {
            let Some(current_dst) = self.current_pass().and_then(|p| p.dst.textures.get(&texture)).copied() else {
                continue;
            };
            if let Some(producer) = self.find_and_remove_producer_texture(texture) {
                src_stage |= producer.stage_flags;
                dst_stage |= current_dst.stage_flags;
                texture_barriers.push((
                    texture,
                    producer.access_flags,
                    current_dst.access_flags,
                    producer.layout,
                    current_dst.layout,
                    current_dst.base_mip,
                    current_dst.mip_count,
                    current_dst.base_layer,
                    current_dst.layer_count,
                ));
            }
        }

        if buffer_barriers.is_empty() && texture_barriers.is_empty() {
            return;
        }

        let hal_buffer_barriers: Vec<BufferBarrier<A>> = buffer_barriers
            .iter()
            .filter_map(|&(id, src_access, dst_access)| {
                self.buffer_handles.get(&id).map(|raw| BufferBarrier { buffer: raw.clone(), src_access, dst_access })
            })
            .collect();

        let hal_texture_barriers: Vec<TextureBarrier<A>> = texture_barriers
            .iter()
            .filter_map(
                |&(id, src_access, dst_access, old_layout, new_layout, base_mip, mip_count, base_layer, layer_count)| {
                    self.texture_handles.get(&id).map(|raw| TextureBarrier {
                        texture: raw.clone(),
                        src_access,
                        dst_access,
                        old_layout,
                        new_layout,
                        base_mip,
                        mip_count,
                        base_layer,
                        layer_count,
                    })
                },
            )
            .collect();

        unsafe {
            encoder.cmd_pipeline_barrier(src_stage, dst_stage, &hal_buffer_barriers, &hal_texture_barriers);
        }
    }

    fn find_and_remove_producer_buffer(&mut self, buffer: BufferId) -> Option<crate::types::BufferUsageInfo> {
        let limit = self.pass_index.max(0) as usize;
        for j in (0..limit).rev() {
            if let Some(info) = self.passes[j].src.buffers.remove(&buffer) {
                return Some(info);
            }
        }
        None
    }

    fn find_and_remove_producer_texture(&mut self, texture: TextureId) -> Option<crate::types::TextureUsageInfo> {
        let limit = self.pass_index.max(0) as usize;
        for j in (0..limit).rev() {
            if let Some(info) = self.passes[j].src.textures.remove(&texture) {
                return Some(info);
            }
        }
        None
    }

    /// Copy commands bracket their own transitions and never touch the
    /// pass-dependency machinery (spec §4.3 "Copy path"): record the
    /// pre-copy layout, transition to the transfer layout, run the body,
    /// transition back.
    fn with_copy_bracket(
        &mut self,
        encoder: &mut A::CommandEncoder,
        texture: &std::sync::Arc<crate::resource::Texture<A>>,
        body: impl FnOnce(&mut A::CommandEncoder),
    ) {
        let transfer_layout = TextureLayout::TransferDst;
        let pre_layout = texture.current_layout(0);

        let enter = TextureBarrier::<A> {
            texture: texture.raw().clone(),
            src_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
            dst_access: AccessFlags::TRANSFER_WRITE | AccessFlags::TRANSFER_READ,
            old_layout: pre_layout,
            new_layout: transfer_layout,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        unsafe {
            encoder.cmd_pipeline_barrier(StageFlags::BOTTOM_OF_PIPE, StageFlags::TRANSFER, &[], std::slice::from_ref(&enter));
        }
        texture.set_layout(0, transfer_layout);

        body(encoder);

        let restore_layout = if pre_layout == TextureLayout::Undefined {
            final_layout_from_usage(texture.usage)
        } else {
            pre_layout
        };
        let exit = TextureBarrier::<A> {
            texture: texture.raw().clone(),
            src_access: AccessFlags::TRANSFER_WRITE | AccessFlags::TRANSFER_READ,
            dst_access: AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
            old_layout: transfer_layout,
            new_layout: restore_layout,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        unsafe {
            encoder.cmd_pipeline_barrier(StageFlags::TRANSFER, StageFlags::BOTTOM_OF_PIPE, &[], std::slice::from_ref(&exit));
        }
        texture.set_layout(0, restore_layout);
    }
}

fn final_layout_from_usage(usage: gpu_types::TextureUsages) -> TextureLayout {
    if usage.contains(gpu_types::TextureUsages::RENDER_ATTACHMENT) {
        TextureLayout::ColorAttachment
    } else if usage.contains(gpu_types::TextureUsages::TEXTURE_BINDING) {
        TextureLayout::ShaderReadOnly
    } else {
        TextureLayout::General
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hal::empty::{Context, EmptyEncoder, Handle};
    use hal::{AccessFlags, StageFlags, TextureLayout};

    use super::*;
    use crate::resource::{Buffer, Texture, TextureOwner};
    use crate::types::{BufferUsageInfo, TextureUsageInfo};

    fn buffer(handle: u64) -> Arc<Buffer<Context>> {
        Buffer::new(Handle(handle), 256, gpu_types::BufferUsages::STORAGE)
    }

    fn texture(handle: u64) -> Arc<Texture<Context>> {
        Texture::new(
            Handle(handle),
            gpu_types::TextureFormat::Rgba8Unorm,
            gpu_types::Extent3d { width: 4, height: 4, depth_or_array_layers: 1 },
            1,
            1,
            gpu_types::TextureUsages::TEXTURE_BINDING,
            TextureOwner::SelfOwned,
        )
    }

    #[test]
    fn matching_src_dst_produces_one_barrier() {
        let buf = buffer(1);
        let mut pass0 = PassResourceInfo::default();
        pass0.src.add_buffer(
            buf.id(),
            BufferUsageInfo { stage_flags: StageFlags::COMPUTE_SHADER, access_flags: AccessFlags::SHADER_WRITE },
        );
        let mut pass1 = PassResourceInfo::default();
        pass1.dst.add_buffer(
            buf.id(),
            BufferUsageInfo { stage_flags: StageFlags::COMPUTE_SHADER, access_flags: AccessFlags::SHADER_READ },
        );

        let commands = vec![
            Command::BeginComputePass,
            Command::EndComputePass,
            Command::BeginComputePass,
            Command::Dispatch { x: 1, y: 1, z: 1 },
            Command::EndComputePass,
        ];

        let mut synchronizer = Synchronizer::<Context>::new(vec![pass0, pass1]);
        synchronizer.register_buffer(&buf);
        let mut encoder = EmptyEncoder::new();
        let result = synchronizer.record(&mut encoder, &commands).unwrap();

        assert!(result.unsynced_pass_resource_infos.iter().all(|p| p.src.is_empty()));
        assert_eq!(encoder.recorded_barriers().len(), 1);
        assert_eq!(encoder.recorded_barriers()[0].buffer_count, 1);
    }

    #[test]
    fn unmatched_dst_with_no_prior_src_leaves_no_barrier() {
        let buf = buffer(2);
        let mut pass0 = PassResourceInfo::default();
        pass0.dst.add_buffer(
            buf.id(),
            BufferUsageInfo { stage_flags: StageFlags::COMPUTE_SHADER, access_flags: AccessFlags::SHADER_READ },
        );

        let commands = vec![Command::BeginComputePass, Command::Dispatch { x: 1, y: 1, z: 1 }, Command::EndComputePass];

        let mut synchronizer = Synchronizer::<Context>::new(vec![pass0]);
        synchronizer.register_buffer(&buf);
        let mut encoder = EmptyEncoder::new();
        synchronizer.record(&mut encoder, &commands).unwrap();

        assert!(encoder.recorded_barriers().is_empty());
    }

    #[test]
    fn texture_barrier_matches_across_passes() {
        let tex = texture(3);
        let mut pass0 = PassResourceInfo::default();
        pass0.src.add_texture(
            tex.id(),
            TextureUsageInfo {
                stage_flags: StageFlags::COLOR_ATTACHMENT_OUTPUT,
                access_flags: AccessFlags::COLOR_ATTACHMENT_WRITE,
                layout: TextureLayout::ColorAttachment,
                base_mip: 0,
                mip_count: 1,
                base_layer: 0,
                layer_count: 1,
            },
        );
        let mut pass1 = PassResourceInfo::default();
        pass1.dst.add_texture(
            tex.id(),
            TextureUsageInfo {
                stage_flags: StageFlags::FRAGMENT_SHADER,
                access_flags: AccessFlags::SHADER_READ,
                layout: TextureLayout::ShaderReadOnly,
                base_mip: 0,
                mip_count: 1,
                base_layer: 0,
                layer_count: 1,
            },
        );

        let commands = vec![
            Command::BeginComputePass,
            Command::EndComputePass,
            Command::BeginComputePass,
            Command::Dispatch { x: 1, y: 1, z: 1 },
            Command::EndComputePass,
        ];

        let mut synchronizer = Synchronizer::<Context>::new(vec![pass0, pass1]);
        synchronizer.register_texture(&tex);
        let mut encoder = EmptyEncoder::new();
        synchronizer.record(&mut encoder, &commands).unwrap();

        assert_eq!(encoder.recorded_barriers()[0].texture_count, 1);
    }
}
