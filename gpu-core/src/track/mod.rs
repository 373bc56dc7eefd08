//! Resource Tracker (spec §4.2): consumes Command Recorder calls and
//! produces one [`PassResourceInfo`] per pass.

use hal::{AccessFlags, StageFlags, TextureLayout};

use crate::resource::{
    BindGroup, BindGroupLayoutEntryKind, BufferBindingType, BufferId, StorageTextureAccess, TextureId,
};
use crate::types::{BufferUsageInfo, PassResourceInfo, TextureUsageInfo};

/// Invariant: every command that begins or ends a pass is observed by the
/// recorder before updating `current`; everything else folds into the
/// pass currently open.
pub struct ResourceTracker {
    current: PassResourceInfo,
    finished: Vec<PassResourceInfo>,
    in_pass: bool,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self { current: PassResourceInfo::default(), finished: Vec::new(), in_pass: false }
    }

    fn begin_pass(&mut self) {
        debug_assert!(!self.in_pass, "begin_pass called while already inside a pass");
        self.current = PassResourceInfo::default();
        self.in_pass = true;
    }

    fn end_pass(&mut self) {
        debug_assert!(self.in_pass, "end_pass called while not inside a pass");
        self.finished.push(std::mem::take(&mut self.current));
        self.in_pass = false;
    }

    pub fn begin_compute_pass(&mut self) {
        self.begin_pass();
    }

    pub fn end_compute_pass(&mut self) {
        self.end_pass();
    }

    pub fn begin_render_pass(&mut self) {
        self.begin_pass();
    }

    pub fn end_render_pass(&mut self) {
        self.end_pass();
    }

    /// Records a color (or resolve) attachment entering a render pass.
    /// `initial_layout`/`final_layout` come from the attachment
    /// descriptor the render-pass cache key carries.
    pub fn add_color_attachment(
        &mut self,
        texture: TextureId,
        initial_layout: TextureLayout,
        final_layout: TextureLayout,
        base_mip: u32,
        mip_count: u32,
        base_layer: u32,
        layer_count: u32,
    ) {
        self.current.dst.add_texture(
            texture,
            TextureUsageInfo {
                stage_flags: StageFlags::FRAGMENT_SHADER,
                access_flags: AccessFlags::NONE,
                layout: initial_layout,
                base_mip,
                mip_count,
                base_layer,
                layer_count,
            },
        );
        self.current.src.add_texture(
            texture,
            TextureUsageInfo {
                stage_flags: StageFlags::COLOR_ATTACHMENT_OUTPUT,
                access_flags: AccessFlags::COLOR_ATTACHMENT_WRITE,
                layout: final_layout,
                base_mip,
                mip_count,
                base_layer,
                layer_count,
            },
        );
    }

    /// Compute bind groups are treated as both consumers and producers:
    /// WebGPU storage access is unknown at record time. Spec §9 flags
    /// this as over-synchronization a refined policy could narrow using
    /// the bind-group layout.
    pub fn add_compute_bind_group<A: hal::Api>(&mut self, bind_group: &BindGroup<A>) {
        for (_, buffer) in &bind_group.buffers {
            let buffer = buffer.id();
            self.current.dst.add_buffer(
                buffer,
                BufferUsageInfo {
                    stage_flags: StageFlags::COMPUTE_SHADER,
                    access_flags: AccessFlags::SHADER_READ,
                },
            );
            self.current.src.add_buffer(
                buffer,
                BufferUsageInfo {
                    stage_flags: StageFlags::COMPUTE_SHADER,
                    access_flags: AccessFlags::SHADER_WRITE,
                },
            );
        }
        for (_, texture, _view) in &bind_group.textures {
            let texture = texture.id();
            self.current.dst.add_texture(
                texture,
                TextureUsageInfo {
                    stage_flags: StageFlags::COMPUTE_SHADER,
                    access_flags: AccessFlags::SHADER_READ,
                    layout: TextureLayout::General,
                    base_mip: 0,
                    mip_count: u32::MAX,
                    base_layer: 0,
                    layer_count: u32::MAX,
                },
            );
            self.current.src.add_texture(
                texture,
                TextureUsageInfo {
                    stage_flags: StageFlags::COMPUTE_SHADER,
                    access_flags: AccessFlags::SHADER_WRITE,
                    layout: TextureLayout::General,
                    base_mip: 0,
                    mip_count: u32::MAX,
                    base_layer: 0,
                    layer_count: u32::MAX,
                },
            );
        }
    }

    /// Render bind groups consult the layout: stage bits OR'd from each
    /// entry's visibility, access narrowed by binding type.
    pub fn add_render_bind_group<A: hal::Api>(&mut self, bind_group: &BindGroup<A>) {
        for (binding, buffer) in &bind_group.buffers {
            let Some(entry) = bind_group.layout_entry(*binding) else { continue };
            let BindGroupLayoutEntryKind::Buffer(binding_type) = entry.kind else { continue };
            let stage = visibility_to_stage(entry.visibility);
            let access = match binding_type {
                BufferBindingType::Uniform => AccessFlags::UNIFORM_READ,
                BufferBindingType::Storage => AccessFlags::SHADER_WRITE,
                BufferBindingType::ReadOnlyStorage => AccessFlags::SHADER_READ,
            };
            self.current
                .dst
                .add_buffer(buffer.id(), BufferUsageInfo { stage_flags: stage, access_flags: access });
        }
        for (binding, texture, _view) in &bind_group.textures {
            let Some(entry) = bind_group.layout_entry(*binding) else { continue };
            let stage = visibility_to_stage(entry.visibility);
            match entry.kind {
                BindGroupLayoutEntryKind::StorageTexture(access, ..) => {
                    let access_flags = match access {
                        StorageTextureAccess::ReadOnly => AccessFlags::SHADER_READ,
                        StorageTextureAccess::WriteOnly => AccessFlags::SHADER_WRITE,
                        StorageTextureAccess::ReadWrite => {
                            AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE
                        }
                    };
                    self.current.dst.add_texture(
                        texture.id(),
                        TextureUsageInfo {
                            stage_flags: stage,
                            access_flags,
                            layout: TextureLayout::General,
                            base_mip: 0,
                            mip_count: u32::MAX,
                            base_layer: 0,
                            layer_count: u32::MAX,
                        },
                    );
                }
                _ => {
                    self.current.dst.add_texture(
                        texture.id(),
                        TextureUsageInfo {
                            stage_flags: stage,
                            access_flags: AccessFlags::SHADER_READ,
                            layout: TextureLayout::ShaderReadOnly,
                            base_mip: 0,
                            mip_count: u32::MAX,
                            base_layer: 0,
                            layer_count: u32::MAX,
                        },
                    );
                }
            }
        }
        // Samplers carry no memory of their own to synchronize against —
        // descriptor-only bindings, nothing for the tracker to record.
    }

    pub fn add_vertex_buffer(&mut self, buffer: BufferId) {
        self.current.dst.add_buffer(
            buffer,
            BufferUsageInfo {
                stage_flags: StageFlags::VERTEX_INPUT,
                access_flags: AccessFlags::VERTEX_ATTRIBUTE_READ,
            },
        );
    }

    pub fn add_index_buffer(&mut self, buffer: BufferId) {
        self.current.dst.add_buffer(
            buffer,
            BufferUsageInfo { stage_flags: StageFlags::VERTEX_INPUT, access_flags: AccessFlags::INDEX_READ },
        );
    }

    /// Called by `finish()`; returns every pass recorded so far.
    pub fn finish(mut self) -> Vec<PassResourceInfo> {
        debug_assert!(!self.in_pass, "finish() called with an unclosed pass");
        if self.in_pass {
            self.finished.push(self.current);
        }
        self.finished
    }
}

fn visibility_to_stage(visibility: crate::resource::ShaderStages) -> StageFlags {
    let mut stage = StageFlags::NONE;
    if visibility.vertex {
        stage |= StageFlags::VERTEX_SHADER;
    }
    if visibility.fragment {
        stage |= StageFlags::FRAGMENT_SHADER;
    }
    if visibility.compute {
        stage |= StageFlags::COMPUTE_SHADER;
    }
    stage
}
