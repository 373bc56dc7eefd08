//! Caches (spec §4.7). The image-view cache lives on [`crate::resource::Texture`]
//! itself rather than here, since its lifetime and invalidation are
//! already scoped to one texture.

pub mod framebuffer;
pub mod render_pass;

pub use framebuffer::FramebufferCache;
pub use render_pass::RenderPassCache;
