//! Submit Compiler (spec §4.4): partitions a sequence of already-synchronized
//! command buffers into submission groups, breaking a group wherever a
//! command buffer depends on a resource an earlier one produced and wiring
//! a signal/wait semaphore pair across the break.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use hal::{Api, Device as _, StageFlags};

use crate::command::Command;
use crate::error::CoreError;
use crate::resource::{BindGroup, BindGroupLayout, Buffer, ComputePipeline, RenderPipeline, Texture, TextureId, TextureView};
use crate::types::{PassResourceInfo, ResourceInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitKind {
    Render,
    Compute,
    Transfer,
    Present,
    None,
}

/// Every GPU object one submission references, kept alive by the Inflight
/// Tracker until the submission's fence retires (spec §4.5/§9 "reference
/// counting" design note).
pub struct ReferencedObjectSet<A: Api> {
    pub buffers: Vec<Arc<Buffer<A>>>,
    pub textures: Vec<Arc<Texture<A>>>,
    pub texture_views: Vec<Arc<TextureView<A>>>,
    pub bind_groups: Vec<Arc<BindGroup<A>>>,
    pub bind_group_layouts: Vec<Arc<BindGroupLayout<A>>>,
    pub render_pipelines: Vec<Arc<RenderPipeline<A>>>,
    pub compute_pipelines: Vec<Arc<ComputePipeline<A>>>,
    pub render_passes: Vec<A::RenderPass>,
    pub framebuffers: Vec<A::Framebuffer>,
    pub command_buffers: Vec<A::CommandBuffer>,
    pub samplers: Vec<A::Sampler>,
}

impl<A: Api> Default for ReferencedObjectSet<A> {
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

impl<A: Api> ReferencedObjectSet<A> {
    fn extend_from_commands(&mut self, commands: &[Command<A>]) {
        for command in commands {
            match command {
                Command::SetComputePipeline(p) => self.compute_pipelines.push(p.clone()),
                Command::SetComputeBindGroup { bind_group, .. } => self.push_bind_group(bind_group),
                Command::DispatchIndirect { buffer, .. } => self.buffers.push(buffer.clone()),
                Command::BeginRenderPass { render_pass, framebuffer, color_attachments, depth_stencil_attachment, .. } => {
                    self.render_passes.push(render_pass.clone());
                    self.framebuffers.push(framebuffer.clone());
                    for attachment in color_attachments.iter().chain(depth_stencil_attachment.iter()) {
                        self.textures.push(attachment.texture.clone());
                        self.texture_views.push(attachment.view.clone());
                    }
                }
                Command::SetRenderPipeline(p) => self.render_pipelines.push(p.clone()),
                Command::SetBindGroup { bind_group, .. } => self.push_bind_group(bind_group),
                Command::SetVertexBuffer { buffer, .. } | Command::SetIndexBuffer { buffer, .. } => {
                    self.buffers.push(buffer.clone())
                }
                Command::ExecuteBundle(bundles) => {
                    for bundle in bundles {
                        self.extend_from_commands(&bundle.commands);
                    }
                }
                Command::DrawIndirect { buffer, .. } | Command::DrawIndexedIndirect { buffer, .. } => {
                    self.buffers.push(buffer.clone())
                }
                Command::CopyBufferToBuffer { src, dst, .. } => {
                    self.buffers.push(src.clone());
                    self.buffers.push(dst.clone());
                }
                Command::CopyBufferToTexture { src, dst, .. } => {
                    self.buffers.push(src.clone());
                    self.textures.push(dst.clone());
                }
                Command::CopyTextureToBuffer { src, dst, .. } => {
                    self.textures.push(src.clone());
                    self.buffers.push(dst.clone());
                }
                Command::CopyTextureToTexture { src, dst, .. } => {
                    self.textures.push(src.clone());
                    self.textures.push(dst.clone());
                }
                Command::ClearBuffer { buffer, .. } => self.buffers.push(buffer.clone()),
                _ => {}
            }
        }
    }

    fn push_bind_group(&mut self, bind_group: &Arc<BindGroup<A>>) {
        self.bind_group_layouts.push(bind_group.layout.clone());
        for (_, buffer) in &bind_group.buffers {
            self.buffers.push(buffer.clone());
        }
        for (_, texture, view) in &bind_group.textures {
            self.textures.push(texture.clone());
            self.texture_views.push(view.clone());
        }
        for (_, sampler) in &bind_group.samplers {
            self.samplers.push(sampler.raw().clone());
        }
        self.bind_groups.push(bind_group.clone());
    }
}

pub struct SubmitInfo<A: Api> {
    pub command_buffers: Vec<A::CommandBuffer>,
    pub wait_semaphores: Vec<A::Semaphore>,
    pub wait_stages: Vec<StageFlags>,
    pub signal_semaphores: Vec<A::Semaphore>,
    pub kind: SubmitKind,
    pub swapchain_index: Option<u32>,
}

impl<A: Api> Default for SubmitInfo<A> {
    fn default() -> Self {
        Self {
            command_buffers: Vec::new(),
            wait_semaphores: Vec::new(),
            wait_stages: Vec::new(),
            signal_semaphores: Vec::new(),
            kind: SubmitKind::None,
            swapchain_index: None,
        }
    }
}

impl Default for SubmitKind {
    fn default() -> Self {
        SubmitKind::None
    }
}

pub struct VulkanSubmit<A: Api> {
    pub info: SubmitInfo<A>,
    pub object: ReferencedObjectSet<A>,
}

/// One already-recorded-and-synchronized command buffer, as handed to the
/// Submit Compiler. `commands`/`unsynced_pass_resource_infos` come straight
/// out of the Command Recorder and Synchronizer.
pub struct SyncedCommandBuffer<A: Api> {
    pub command_buffer: A::CommandBuffer,
    pub commands: Vec<Command<A>>,
    pub unsynced_pass_resource_infos: Vec<PassResourceInfo>,
}

/// Tags a previously-seen pass info with which submit ultimately contains
/// it — `None` while its submit is still open (`current`).
struct TrackedSrc {
    info: ResourceInfo,
    submit_index: Option<usize>,
}

pub struct SubmitCompiler<A: Api> {
    submits: Vec<VulkanSubmit<A>>,
    current: SubmitInfo<A>,
    current_objects: ReferencedObjectSet<A>,
    submitted_srcs: Vec<TrackedSrc>,
}

impl<A: Api> SubmitCompiler<A> {
    pub fn new() -> Self {
        Self {
            submits: Vec::new(),
            current: SubmitInfo::default(),
            current_objects: ReferencedObjectSet::default(),
            submitted_srcs: Vec::new(),
        }
    }

    pub fn compile(
        mut self,
        device: &A::Device,
        inputs: Vec<SyncedCommandBuffer<A>>,
    ) -> Result<Vec<VulkanSubmit<A>>, CoreError> {
        for result in inputs {
            self.compile_one(device, result)?;
        }

        if !self.current.command_buffers.is_empty() || self.submits.is_empty() {
            self.submits.push(VulkanSubmit { info: self.current, object: self.current_objects });
        }

        Ok(self.submits)
    }

    fn compile_one(&mut self, device: &A::Device, result: SyncedCommandBuffer<A>) -> Result<(), CoreError> {
        let swapchain_attachments = collect_swapchain_attachments(&result.commands);

        // For each already-known producer, find the matching dst stage in
        // this command buffer, if any — that stage becomes the wait stage
        // (spec §4.4 step 4: "wait_stage = dst_usage.stage_flags").
        let dependencies: Vec<(usize, StageFlags)> = self
            .submitted_srcs
            .iter()
            .enumerate()
            .filter_map(|(i, tracked)| {
                let stage = result.unsynced_pass_resource_infos.iter().find_map(|pass| {
                    let buffer_stage = tracked.info.buffers.keys().find_map(|b| pass.dst.buffers.get(b)).map(|u| u.stage_flags);
                    let texture_stage =
                        tracked.info.textures.keys().find_map(|t| pass.dst.textures.get(t)).map(|u| u.stage_flags);
                    buffer_stage.or(texture_stage)
                })?;
                Some((i, stage))
            })
            .collect();

        if !dependencies.is_empty() && !self.current.command_buffers.is_empty() {
            self.close_current(device)?;
        }

        self.current.command_buffers.push(result.command_buffer.clone());
        self.current_objects.command_buffers.push(result.command_buffer.clone());

        for (idx, wait_stage) in dependencies {
            let submit_index = match self.submitted_srcs[idx].submit_index {
                Some(i) => i,
                None => self.submits.len() - 1,
            };
            for semaphore in self.submits[submit_index].info.signal_semaphores.clone() {
                self.current.wait_semaphores.push(semaphore);
                self.current.wait_stages.push(wait_stage);
            }
        }

        for attachment in &swapchain_attachments {
            self.current.wait_semaphores.push(attachment.acquire_semaphore.clone());
            self.current.wait_stages.push(StageFlags::COLOR_ATTACHMENT_OUTPUT);
            self.current.swapchain_index = Some(attachment.image_index);
        }

        let swapchain_textures: FxHashSet<TextureId> = swapchain_attachments.iter().map(|a| a.texture).collect();
        let last_src = result.unsynced_pass_resource_infos.last().map(|p| &p.src);
        self.current.kind = determine_kind(last_src, &swapchain_textures);

        self.current_objects.extend_from_commands(&result.commands);

        for pass in &result.unsynced_pass_resource_infos {
            if !pass.src.is_empty() {
                self.submitted_srcs.push(TrackedSrc { info: pass.src.clone(), submit_index: None });
            }
        }

        Ok(())
    }

    fn close_current(&mut self, device: &A::Device) -> Result<(), CoreError> {
        let signal = unsafe { device.create_semaphore() }?;
        self.current.signal_semaphores.push(signal);

        let closed_index = self.submits.len();
        for tracked in &mut self.submitted_srcs {
            if tracked.submit_index.is_none() {
                tracked.submit_index = Some(closed_index);
            }
        }

        let info = std::mem::take(&mut self.current);
        let objects = std::mem::take(&mut self.current_objects);
        self.submits.push(VulkanSubmit { info, object: objects });
        Ok(())
    }
}

impl<A: Api> Default for SubmitCompiler<A> {
    fn default() -> Self {
        Self::new()
    }
}

struct SwapchainAttachment<A: Api> {
    texture: TextureId,
    acquire_semaphore: A::Semaphore,
    image_index: u32,
}

fn collect_swapchain_attachments<A: Api>(commands: &[Command<A>]) -> Vec<SwapchainAttachment<A>> {
    let mut out = Vec::new();
    for command in commands {
        if let Command::BeginRenderPass { color_attachments, depth_stencil_attachment, .. } = command {
            for attachment in color_attachments.iter().chain(depth_stencil_attachment.iter()) {
                if let Some((semaphore, index)) = &attachment.swapchain_acquire {
                    out.push(SwapchainAttachment {
                        texture: attachment.texture.id(),
                        acquire_semaphore: semaphore.clone(),
                        image_index: *index,
                    });
                }
            }
        }
    }
    out
}

fn determine_kind(last_src: Option<&ResourceInfo>, swapchain_textures: &FxHashSet<TextureId>) -> SubmitKind {
    let Some(src) = last_src else { return SubmitKind::None };

    let color_attachment_textures: Vec<&TextureId> = src
        .textures
        .iter()
        .filter(|(_, info)| info.stage_flags.contains(StageFlags::COLOR_ATTACHMENT_OUTPUT))
        .map(|(id, _)| id)
        .collect();

    if !color_attachment_textures.is_empty() {
        return if color_attachment_textures.iter().any(|id| swapchain_textures.contains(id)) {
            SubmitKind::Present
        } else {
            SubmitKind::Render
        };
    }

    let any_compute = src.buffers.values().any(|b| b.stage_flags.contains(StageFlags::COMPUTE_SHADER))
        || src.textures.values().any(|t| t.stage_flags.contains(StageFlags::COMPUTE_SHADER));
    if any_compute {
        return SubmitKind::Compute;
    }

    let any_transfer = src.buffers.values().any(|b| b.stage_flags.contains(StageFlags::TRANSFER))
        || src.textures.values().any(|t| t.stage_flags.contains(StageFlags::TRANSFER));
    if any_transfer {
        return SubmitKind::Transfer;
    }

    SubmitKind::None
}

#[cfg(test)]
mod tests {
    use hal::empty::{Context, EmptyDevice, Handle};
    use hal::{AccessFlags, StageFlags};

    use super::*;
    use crate::resource::Buffer;
    use crate::types::BufferUsageInfo;

    fn synced(command_buffer: u64, passes: Vec<PassResourceInfo>) -> SyncedCommandBuffer<Context> {
        SyncedCommandBuffer { command_buffer: Handle(command_buffer), commands: Vec::new(), unsynced_pass_resource_infos: passes }
    }

    #[test]
    fn single_pass_no_dependencies_yields_one_submit_no_semaphores() {
        let device = EmptyDevice::new();
        let compiler = SubmitCompiler::<Context>::new();
        let mut pass = PassResourceInfo::default();
        pass.src.add_buffer(
            Buffer::<Context>::new(Handle(1), 4, gpu_types::BufferUsages::STORAGE).id(),
            BufferUsageInfo { stage_flags: StageFlags::COMPUTE_SHADER, access_flags: AccessFlags::SHADER_WRITE },
        );
        let submits = compiler.compile(&device, vec![synced(1, vec![pass])]).unwrap();
        assert_eq!(submits.len(), 1);
        assert!(submits[0].info.wait_semaphores.is_empty());
        assert!(submits[0].info.signal_semaphores.is_empty());
    }

    #[test]
    fn cross_command_buffer_dependency_creates_two_submits_with_semaphore() {
        let device = EmptyDevice::new();
        let compiler = SubmitCompiler::<Context>::new();
        let buf = Buffer::<Context>::new(Handle(1), 4, gpu_types::BufferUsages::STORAGE);

        let mut producer_pass = PassResourceInfo::default();
        producer_pass.src.add_buffer(
            buf.id(),
            BufferUsageInfo { stage_flags: StageFlags::COMPUTE_SHADER, access_flags: AccessFlags::SHADER_WRITE },
        );
        let mut consumer_pass = PassResourceInfo::default();
        consumer_pass.dst.add_buffer(
            buf.id(),
            BufferUsageInfo { stage_flags: StageFlags::VERTEX_INPUT, access_flags: AccessFlags::VERTEX_ATTRIBUTE_READ },
        );

        let submits = compiler
            .compile(&device, vec![synced(1, vec![producer_pass]), synced(2, vec![consumer_pass])])
            .unwrap();

        assert_eq!(submits.len(), 2);
        assert_eq!(submits[0].info.signal_semaphores.len(), 1);
        assert_eq!(submits[1].info.wait_semaphores.len(), 1);
        assert_eq!(submits[1].info.wait_stages[0], StageFlags::VERTEX_INPUT);
    }

    #[test]
    fn zero_passes_yields_one_empty_submit_of_kind_none() {
        let device = EmptyDevice::new();
        let compiler = SubmitCompiler::<Context>::new();
        let submits = compiler.compile(&device, Vec::new()).unwrap();
        assert_eq!(submits.len(), 1);
        assert_eq!(submits[0].info.kind, SubmitKind::None);
    }

    #[test]
    fn swapchain_attachment_yields_present_kind_with_acquire_wait() {
        use crate::command::{Command, RenderAttachment};
        use crate::resource::{Texture, TextureOwner, TextureViewKey};
        use crate::types::TextureUsageInfo;

        let device = EmptyDevice::new();
        let compiler = SubmitCompiler::<Context>::new();

        let swapchain_texture = Texture::<Context>::new(
            Handle(1),
            gpu_types::TextureFormat::Rgba8Unorm,
            gpu_types::Extent3d { width: 4, height: 4, depth_or_array_layers: 1 },
            1,
            1,
            gpu_types::TextureUsages::RENDER_ATTACHMENT,
            TextureOwner::Swapchain,
        );
        let view = crate::resource::TextureView::<Context>::new(
            Handle(2),
            TextureViewKey { base_mip: 0, mip_count: 1, base_layer: 0, layer_count: 1 },
        );
        let acquire_semaphore = Handle(3);

        let commands = vec![Command::BeginRenderPass {
            render_pass: Handle(4),
            framebuffer: Handle(5),
            color_attachments: vec![RenderAttachment {
                view,
                texture: swapchain_texture.clone(),
                initial_layout: hal::TextureLayout::Undefined,
                final_layout: hal::TextureLayout::PresentSrc,
                swapchain_acquire: Some((acquire_semaphore, 2)),
            }],
            depth_stencil_attachment: None,
            render_area: hal::RenderArea { x: 0, y: 0, width: 4, height: 4 },
            clear_values: Vec::new(),
            occlusion_query_set: None,
            timestamp_writes: None,
        }];

        let mut pass = PassResourceInfo::default();
        pass.src.add_texture(
            swapchain_texture.id(),
            TextureUsageInfo {
                stage_flags: StageFlags::COLOR_ATTACHMENT_OUTPUT,
                access_flags: AccessFlags::COLOR_ATTACHMENT_WRITE,
                layout: hal::TextureLayout::PresentSrc,
                base_mip: 0,
                mip_count: 1,
                base_layer: 0,
                layer_count: 1,
            },
        );

        let synced = SyncedCommandBuffer { command_buffer: Handle(6), commands, unsynced_pass_resource_infos: vec![pass] };
        let submits = compiler.compile(&device, vec![synced]).unwrap();

        assert_eq!(submits.len(), 1);
        assert_eq!(submits[0].info.kind, SubmitKind::Present);
        assert_eq!(submits[0].info.swapchain_index, Some(2));
        assert_eq!(submits[0].info.wait_semaphores, vec![acquire_semaphore]);
        assert_eq!(submits[0].info.wait_stages, vec![StageFlags::COLOR_ATTACHMENT_OUTPUT]);
    }
}
