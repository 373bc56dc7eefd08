//! Value types shared between `gpu-hal` and `gpu-core`.
//!
//! This crate carries no behavior: it is the common vocabulary (formats,
//! extents, usage flags, device limits) that both the low-level backend and
//! the command-graph compiler need to agree on.

#![warn(trivial_casts, trivial_numeric_casts, unused_extern_crates)]

/// Maximum number of simultaneously bound color attachments.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;
/// Maximum number of vertex buffers bound to a render pipeline.
pub const MAX_VERTEX_BUFFERS: usize = 16;
/// Maximum number of bind groups bound to a pipeline layout.
pub const MAX_BIND_GROUPS: usize = 8;

/// A 3D extent, used for texture dimensions and copy regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

/// Dimensionality of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

/// Texel formats a texture may be created with. Not exhaustive of WebGPU's
/// format list; enough variety to exercise aspect/byte-size-dependent code
/// paths in the synchronizer and caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    R8Unorm,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }
}

bitflags::bitflags! {
    /// Mirrors the `Buffer::create` usage flags of spec §6.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsages: u32 {
        const COPY_SRC        = 1 << 0;
        const COPY_DST        = 1 << 1;
        const INDEX           = 1 << 2;
        const VERTEX          = 1 << 3;
        const UNIFORM         = 1 << 4;
        const STORAGE         = 1 << 5;
        const INDIRECT        = 1 << 6;
        const MAP_READ        = 1 << 7;
        const MAP_WRITE       = 1 << 8;
        const QUERY_RESOLVE   = 1 << 9;
    }
}

bitflags::bitflags! {
    /// Mirrors the `Texture::create` usage flags of spec §6.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        const COPY_SRC         = 1 << 0;
        const COPY_DST         = 1 << 1;
        const TEXTURE_BINDING  = 1 << 2;
        const STORAGE_BINDING  = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Per-descriptor-type caps a physical device reports, used to clamp the
/// descriptor pool's per-type allocation counts (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorLimits {
    pub max_uniform_buffers: u32,
    pub max_uniform_buffers_dynamic: u32,
    pub max_samplers: u32,
    pub max_sampled_images: u32,
    pub max_combined_image_samplers: u32,
    pub max_input_attachments: u32,
    pub max_storage_buffers: u32,
    pub max_storage_buffers_dynamic: u32,
}

impl Default for DescriptorLimits {
    /// A conservative default matching the Vulkan 1.0 "core" minimum
    /// guarantees; real adapters report larger numbers but the descriptor
    /// pool always clamps to `min(32, limit)` per spec §4.7 regardless.
    fn default() -> Self {
        Self {
            max_uniform_buffers: 90,
            max_uniform_buffers_dynamic: 8,
            max_samplers: 4000,
            max_sampled_images: 4000,
            max_combined_image_samplers: 4000,
            max_input_attachments: 4,
            max_storage_buffers: 24,
            max_storage_buffers_dynamic: 4,
        }
    }
}

/// Device-wide limits consulted by the caches and pools. Deliberately a
/// small subset of a full WebGPU `Limits` struct — only the fields the
/// in-scope subsystems actually read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    pub descriptors: DescriptorLimits,
    pub max_color_attachments: u32,
    pub max_vertex_buffers: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            descriptors: DescriptorLimits::default(),
            max_color_attachments: MAX_COLOR_ATTACHMENTS as u32,
            max_vertex_buffers: MAX_VERTEX_BUFFERS as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_report_depth_stencil() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn buffer_usage_flags_compose() {
        let usage = BufferUsages::VERTEX | BufferUsages::COPY_DST;
        assert!(usage.contains(BufferUsages::VERTEX));
        assert!(!usage.contains(BufferUsages::INDEX));
    }
}
