//! GPU-object handle types.
//!
//! Per the design notes on reference counting (spec §9), every resource is
//! a strong handle into an arena slot: an `Arc<Shared<...>>` wrapping the
//! backend-native handle plus whatever bookkeeping the owning subsystem
//! needs. `Clone` is cheap (bumps the `Arc`); the last clone's `Drop`
//! releases the application's hold on the slot, but the object is only
//! actually destroyed once the Deferred Deleter (§4.6) has also observed
//! every inflight fence referencing it retire.
//!
//! `BufferId`/`TextureId` etc. are the *keys* the tracker, synchronizer and
//! submit compiler index by — cheap `Copy` identifiers derived from the
//! `Arc`'s address, not the `Arc` itself, so `PassResourceInfo` maps don't
//! need to hold a strong reference per entry.

use std::hash::Hash;
use std::sync::Arc;

use hal::{Api, TextureLayout};
use parking_lot::Mutex;

/// A `Copy`, `Hash`-able identifier for a resource, derived from the
/// address of its backing `Arc`. Stable for the resource's lifetime;
/// never reused while any handle keeping it alive exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub(crate) usize);

fn arena_address<T>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as usize
}

/// Where a texture's memory comes from, per spec §3's `Texture` data
/// model: `SelfOwned | Swapchain`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureOwner {
    SelfOwned,
    /// Swapchain-owned textures carry an acquire semaphore and an image
    /// index; their final layout must be `PresentSrc`.
    Swapchain,
}

pub struct Buffer<A: Api> {
    pub(crate) raw: A::Buffer,
    pub size: u64,
    pub usage: gpu_types::BufferUsages,
}

impl<A: Api> Buffer<A> {
    pub fn new(raw: A::Buffer, size: u64, usage: gpu_types::BufferUsages) -> Arc<Self> {
        Arc::new(Self { raw, size, usage })
    }

    pub fn id(self: &Arc<Self>) -> BufferId {
        BufferId(arena_address(self))
    }

    pub fn raw(&self) -> &A::Buffer {
        &self.raw
    }
}

pub struct Sampler<A: Api> {
    pub(crate) raw: A::Sampler,
}

impl<A: Api> Sampler<A> {
    pub fn new(raw: A::Sampler) -> Arc<Self> {
        Arc::new(Self { raw })
    }

    pub fn raw(&self) -> &A::Sampler {
        &self.raw
    }
}

/// One texture's current per-mip layout vector, the invariant spec §3
/// requires: "current layout is updated exactly when a barrier
/// transitioning that mip is emitted".
pub struct Texture<A: Api> {
    pub(crate) raw: A::Texture,
    pub format: gpu_types::TextureFormat,
    pub extent: gpu_types::Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: gpu_types::TextureUsages,
    pub owner: TextureOwner,
    current_layouts: Mutex<Vec<TextureLayout>>,
    views: Mutex<rustc_hash::FxHashMap<TextureViewKey, Arc<TextureView<A>>>>,
}

/// Image-view cache key (spec §3: "a child image-view cache keyed by
/// `(dimension, aspect, base_mip, mip_count, base_layer, layer_count)`").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureViewKey {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl<A: Api> Texture<A> {
    pub fn new(
        raw: A::Texture,
        format: gpu_types::TextureFormat,
        extent: gpu_types::Extent3d,
        mip_level_count: u32,
        sample_count: u32,
        usage: gpu_types::TextureUsages,
        owner: TextureOwner,
    ) -> Arc<Self> {
        Arc::new(Self {
            raw,
            format,
            extent,
            mip_level_count,
            sample_count,
            usage,
            owner,
            current_layouts: Mutex::new(vec![TextureLayout::Undefined; mip_level_count.max(1) as usize]),
            views: Mutex::new(rustc_hash::FxHashMap::default()),
        })
    }

    pub fn id(self: &Arc<Self>) -> TextureId {
        TextureId(arena_address(self))
    }

    pub fn raw(&self) -> &A::Texture {
        &self.raw
    }

    pub fn current_layout(&self, mip: u32) -> TextureLayout {
        self.current_layouts.lock()[mip as usize]
    }

    /// Called by the Synchronizer exactly when it emits a barrier
    /// transitioning `mip`.
    pub fn set_layout(&self, mip: u32, layout: TextureLayout) {
        self.current_layouts.lock()[mip as usize] = layout;
    }

    /// Returns the cached view for `key`, or `None` on a cache miss. The
    /// image-view cache itself lives on the texture (spec §3); callers
    /// insert on miss via [`Texture::insert_view`].
    pub fn cached_view(&self, key: TextureViewKey) -> Option<Arc<TextureView<A>>> {
        self.views.lock().get(&key).cloned()
    }

    pub fn insert_view(&self, key: TextureViewKey, view: Arc<TextureView<A>>) {
        self.views.lock().insert(key, view);
    }

    /// Evicts every cached view, called by the deleter right before a
    /// texture is actually destroyed.
    pub fn clear_view_cache(&self) -> Vec<Arc<TextureView<A>>> {
        self.views.lock().drain().map(|(_, v)| v).collect()
    }
}

pub struct TextureView<A: Api> {
    pub(crate) raw: A::TextureView,
    pub key: TextureViewKey,
}

impl<A: Api> TextureView<A> {
    pub fn new(raw: A::TextureView, key: TextureViewKey) -> Arc<Self> {
        Arc::new(Self { raw, key })
    }

    pub fn id(self: &Arc<Self>) -> TextureViewId {
        TextureViewId(arena_address(self))
    }

    pub fn raw(&self) -> &A::TextureView {
        &self.raw
    }
}

/// An immutable snapshot of `(buffer bindings, sampler bindings,
/// texture-view bindings, layout)` — never mutated after creation (spec
/// §3's `BindGroup` invariant).
///
/// Texture bindings are keyed by the owning texture's id, not the view's:
/// barriers transition the underlying image, so that's what the tracker
/// and synchronizer need to look dependencies up by.
pub struct BindGroup<A: Api> {
    pub(crate) raw: A::BindGroup,
    /// The one-pool-per-set descriptor pool this bind group was allocated
    /// from (spec §4.7); the deleter destroys it alongside the bind group.
    pub(crate) descriptor_pool: A::DescriptorPool,
    pub layout: Arc<BindGroupLayout<A>>,
    pub buffers: Vec<(u32, Arc<Buffer<A>>)>,
    pub textures: Vec<(u32, Arc<Texture<A>>, Arc<TextureView<A>>)>,
    pub samplers: Vec<(u32, Arc<Sampler<A>>)>,
}

impl<A: Api> BindGroup<A> {
    pub fn new(
        raw: A::BindGroup,
        descriptor_pool: A::DescriptorPool,
        layout: Arc<BindGroupLayout<A>>,
        buffers: Vec<(u32, Arc<Buffer<A>>)>,
        textures: Vec<(u32, Arc<Texture<A>>, Arc<TextureView<A>>)>,
        samplers: Vec<(u32, Arc<Sampler<A>>)>,
    ) -> Arc<Self> {
        Arc::new(Self { raw, descriptor_pool, layout, buffers, textures, samplers })
    }

    pub fn raw(&self) -> &A::BindGroup {
        &self.raw
    }

    pub fn descriptor_pool(&self) -> &A::DescriptorPool {
        &self.descriptor_pool
    }

    pub fn layout_entry(&self, binding: u32) -> Option<BindGroupLayoutEntry> {
        self.layout.entry(binding).copied()
    }
}

/// Describes how a bind-group-layout entry is accessed, narrowing the
/// generic-storage over-synchronization the source's compute path applies
/// (spec §9 open question). The Resource Tracker consults this when it
/// can (render bind groups); compute bind groups fall back to treating
/// storage buffers as both read and write, exactly as the source does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferBindingType {
    Uniform,
    Storage,
    ReadOnlyStorage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderStages {
    pub vertex: bool,
    pub fragment: bool,
    pub compute: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerBindingType {
    Filtering,
    NonFiltering,
    Comparison,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageTextureAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindGroupLayoutEntryKind {
    Buffer(BufferBindingType),
    Texture,
    Sampler(SamplerBindingType),
    StorageTexture(StorageTextureAccess, gpu_types::TextureFormat, TextureViewDimension),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub kind: BindGroupLayoutEntryKind,
}

pub struct BindGroupLayout<A: Api> {
    pub(crate) raw: A::BindGroupLayout,
    pub entries: Vec<BindGroupLayoutEntry>,
}

impl<A: Api> BindGroupLayout<A> {
    pub fn new(raw: A::BindGroupLayout, entries: Vec<BindGroupLayoutEntry>) -> Arc<Self> {
        Arc::new(Self { raw, entries })
    }

    pub fn raw(&self) -> &A::BindGroupLayout {
        &self.raw
    }

    pub fn entry(&self, binding: u32) -> Option<&BindGroupLayoutEntry> {
        self.entries.iter().find(|e| e.binding == binding)
    }
}

/// Wraps a raw pipeline handle together with the layout it was created
/// with. Unlike [`BindGroup`], whose layout is a shared, independently
/// destroyed `BindGroupLayout<A>`, a pipeline's layout is device-owned
/// for exactly as long as the pipeline — there is no cache or deferred
/// destruction path for `A::PipelineLayout` in this model, so it is kept
/// as the raw backend handle rather than a second wrapper type.
pub struct RenderPipeline<A: Api> {
    pub(crate) raw: A::RenderPipeline,
    pub(crate) layout: A::PipelineLayout,
}

impl<A: Api> RenderPipeline<A> {
    pub fn new(raw: A::RenderPipeline, layout: A::PipelineLayout) -> Arc<Self> {
        Arc::new(Self { raw, layout })
    }

    pub fn raw(&self) -> &A::RenderPipeline {
        &self.raw
    }

    pub fn layout(&self) -> &A::PipelineLayout {
        &self.layout
    }
}

pub struct ComputePipeline<A: Api> {
    pub(crate) raw: A::ComputePipeline,
    pub(crate) layout: A::PipelineLayout,
}

impl<A: Api> ComputePipeline<A> {
    pub fn new(raw: A::ComputePipeline, layout: A::PipelineLayout) -> Arc<Self> {
        Arc::new(Self { raw, layout })
    }

    pub fn raw(&self) -> &A::ComputePipeline {
        &self.raw
    }

    pub fn layout(&self) -> &A::PipelineLayout {
        &self.layout
    }
}

fn _assert_hash_eq() {
    fn assert<T: Hash + Eq>() {}
    assert::<BufferId>();
    assert::<TextureId>();
}

#[cfg(test)]
mod tests {
    use hal::empty::{Context, Handle};

    use super::*;

    fn key() -> TextureViewKey {
        TextureViewKey { base_mip: 0, mip_count: 1, base_layer: 0, layer_count: 1 }
    }

    fn texture() -> Arc<Texture<Context>> {
        Texture::new(
            Handle(1),
            gpu_types::TextureFormat::Rgba8Unorm,
            gpu_types::Extent3d { width: 4, height: 4, depth_or_array_layers: 1 },
            1,
            1,
            gpu_types::TextureUsages::TEXTURE_BINDING,
            TextureOwner::SelfOwned,
        )
    }

    #[test]
    fn view_cache_misses_until_inserted_then_hits() {
        let tex = texture();
        assert!(tex.cached_view(key()).is_none());

        let view = TextureView::new(Handle(2), key());
        tex.insert_view(key(), view.clone());

        let cached = tex.cached_view(key()).unwrap();
        assert!(Arc::ptr_eq(&cached, &view));
    }

    #[test]
    fn clear_view_cache_empties_it_and_returns_every_view() {
        let tex = texture();
        tex.insert_view(key(), TextureView::new(Handle(2), key()));

        let drained = tex.clear_view_cache();
        assert_eq!(drained.len(), 1);
        assert!(tex.cached_view(key()).is_none());
    }

    #[test]
    fn layout_starts_undefined_and_tracks_set_layout() {
        let tex = texture();
        assert_eq!(tex.current_layout(0), TextureLayout::Undefined);
        tex.set_layout(0, TextureLayout::ShaderReadOnly);
        assert_eq!(tex.current_layout(0), TextureLayout::ShaderReadOnly);
    }

    #[test]
    fn two_distinct_buffers_have_distinct_ids() {
        let a = Buffer::<Context>::new(Handle(10), 16, gpu_types::BufferUsages::STORAGE);
        let b = Buffer::<Context>::new(Handle(11), 16, gpu_types::BufferUsages::STORAGE);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
    }

    #[test]
    fn bind_group_layout_entry_lookup_by_binding() {
        let entries = vec![BindGroupLayoutEntry {
            binding: 3,
            visibility: ShaderStages { vertex: false, fragment: true, compute: false },
            kind: BindGroupLayoutEntryKind::Buffer(BufferBindingType::Uniform),
        }];
        let layout = BindGroupLayout::<Context>::new(Handle(20), entries);
        assert!(layout.entry(3).is_some());
        assert!(layout.entry(4).is_none());
    }
}
