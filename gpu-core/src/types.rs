//! The `PassResourceInfo`/`ResourceInfo` vocabulary spec §3 defines, shared
//! by the tracker, synchronizer, and submit compiler.

use rustc_hash::FxHashMap;

use crate::resource::{BufferId, TextureId};
use hal::{AccessFlags, StageFlags, TextureLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferUsageInfo {
    pub stage_flags: StageFlags,
    pub access_flags: AccessFlags,
}

impl BufferUsageInfo {
    pub fn merge(&mut self, other: BufferUsageInfo) {
        self.stage_flags |= other.stage_flags;
        self.access_flags |= other.access_flags;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureUsageInfo {
    pub stage_flags: StageFlags,
    pub access_flags: AccessFlags,
    pub layout: TextureLayout,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl TextureUsageInfo {
    pub fn merge(&mut self, other: TextureUsageInfo) {
        self.stage_flags |= other.stage_flags;
        self.access_flags |= other.access_flags;
        self.layout = other.layout;
    }
}

/// `{ buffers: map<Buffer, BufferUsageInfo>, textures: map<Texture, TextureUsageInfo> }`
#[derive(Clone, Debug, Default)]
pub struct ResourceInfo {
    pub buffers: FxHashMap<BufferId, BufferUsageInfo>,
    pub textures: FxHashMap<TextureId, TextureUsageInfo>,
}

impl ResourceInfo {
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty()
    }

    pub fn add_buffer(&mut self, id: BufferId, info: BufferUsageInfo) {
        self.buffers
            .entry(id)
            .and_modify(|existing| existing.merge(info))
            .or_insert(info);
    }

    pub fn add_texture(&mut self, id: TextureId, info: TextureUsageInfo) {
        self.textures
            .entry(id)
            .and_modify(|existing| existing.merge(info))
            .or_insert(info);
    }
}

/// `{ src: ResourceInfo, dst: ResourceInfo }`, produced per pass by the
/// Resource Tracker (spec §4.2).
#[derive(Clone, Debug, Default)]
pub struct PassResourceInfo {
    /// What the pass produces as an output; future passes synchronize
    /// against this.
    pub src: ResourceInfo,
    /// What the pass consumes as an input; needs synchronization with
    /// prior producers.
    pub dst: ResourceInfo,
}

impl PassResourceInfo {
    pub fn is_empty(&self) -> bool {
        self.src.is_empty() && self.dst.is_empty()
    }
}
