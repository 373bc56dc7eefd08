//! Inflight Tracker (spec §4.5): maps a fence to every GPU object the
//! submission it guards referenced, and notifies subscribers — the
//! Deferred Deleter chief among them — when a fence retires.
//!
//! Keyed by [`hal::FenceValue`] rather than `A::Fence` itself: a timeline
//! semaphore's monotonically increasing counter is the thing that is
//! actually `Copy + Eq + Hash`, and is exactly what `get_fence_value`
//! reports back once a submission completes.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use hal::{Api, FenceValue};

use crate::resource::{BindGroup, BindGroupLayout, Buffer, ComputePipeline, RenderPipeline, Texture, TextureView};
use crate::submit::ReferencedObjectSet;

/// One fence value's accumulated referenced-object set. A plain struct
/// rather than the generic `ReferencedObjectSet` alone because multiple
/// submits can share one fence (spec §4.5: "merge every handle in
/// `submits` into `inflight[fence]`").
pub struct InflightEntry<A: Api> {
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

impl<A: Api> Default for InflightEntry<A> {
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

impl<A: Api> InflightEntry<A> {
    fn merge(&mut self, object: ReferencedObjectSet<A>) {
        self.buffers.extend(object.buffers);
        self.textures.extend(object.textures);
        self.texture_views.extend(object.texture_views);
        self.bind_groups.extend(object.bind_groups);
        self.bind_group_layouts.extend(object.bind_group_layouts);
        self.render_pipelines.extend(object.render_pipelines);
        self.compute_pipelines.extend(object.compute_pipelines);
        self.render_passes.extend(object.render_passes);
        self.framebuffers.extend(object.framebuffers);
        self.command_buffers.extend(object.command_buffers);
        self.samplers.extend(object.samplers);
    }

    fn contains_buffer(&self, id: crate::resource::BufferId) -> bool {
        self.buffers.iter().any(|b| b.id() == id)
    }

    fn contains_texture(&self, id: crate::resource::TextureId) -> bool {
        self.textures.iter().any(|t| t.id() == id)
    }

    fn contains_texture_view(&self, id: crate::resource::TextureViewId) -> bool {
        self.texture_views.iter().any(|v| v.id() == id)
    }

    fn contains_render_pass(&self, pass: &A::RenderPass) -> bool {
        self.render_passes.iter().any(|p| p == pass)
    }

    fn contains_framebuffer(&self, fb: &A::Framebuffer) -> bool {
        self.framebuffers.iter().any(|f| f == fb)
    }

    fn contains_bind_group(&self, group: &A::BindGroup) -> bool {
        self.bind_groups.iter().any(|g| g.raw() == group)
    }

    fn contains_bind_group_layout(&self, layout: &A::BindGroupLayout) -> bool {
        self.bind_group_layouts.iter().any(|l| l.raw() == layout)
    }

    fn contains_render_pipeline(&self, pipeline: &A::RenderPipeline) -> bool {
        self.render_pipelines.iter().any(|p| p.raw() == pipeline)
    }

    fn contains_compute_pipeline(&self, pipeline: &A::ComputePipeline) -> bool {
        self.compute_pipelines.iter().any(|p| p.raw() == pipeline)
    }

    fn contains_command_buffer(&self, cb: &A::CommandBuffer) -> bool {
        self.command_buffers.iter().any(|c| c == cb)
    }

    fn contains_sampler(&self, sampler: &A::Sampler) -> bool {
        self.samplers.iter().any(|s| s == sampler)
    }
}

struct FenceSlot<A: Api> {
    fence: A::Fence,
    data: InflightEntry<A>,
}

type SubscriberCallback<A> = Box<dyn Fn(FenceValue, &<A as Api>::Fence, &InflightEntry<A>) + Send + Sync>;

struct Subscriber<A: Api> {
    id: u64,
    callback: SubscriberCallback<A>,
}

pub struct InflightTracker<A: Api> {
    inner: Mutex<Inner<A>>,
}

struct Inner<A: Api> {
    entries: FxHashMap<FenceValue, FenceSlot<A>>,
    subscribers: Vec<Subscriber<A>>,
    next_subscriber_id: u64,
}

impl<A: Api> InflightTracker<A> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { entries: FxHashMap::default(), subscribers: Vec::new(), next_subscriber_id: 1 }),
        }
    }

    /// Merges every handle in `submits` into `inflight[fence_value]`.
    /// Multiple calls for the same fence value accumulate rather than
    /// overwrite, matching submissions that share one fence.
    pub fn add(&self, fence_value: FenceValue, fence: A::Fence, submits: Vec<ReferencedObjectSet<A>>) {
        let mut inner = self.inner.lock();
        let slot = inner
            .entries
            .entry(fence_value)
            .or_insert_with(|| FenceSlot { fence, data: InflightEntry::default() });
        for object in submits {
            slot.data.merge(object);
        }
    }

    /// Removes `fence_value`'s entry *before* notifying subscribers, so a
    /// subscriber's reentrant `is_inflight` call never observes objects
    /// that are in the middle of being retired (spec §4.5 invariant).
    pub fn clear(&self, fence_value: FenceValue) {
        let (removed, subscriber_ids) = {
            let mut inner = self.inner.lock();
            let Some(removed) = inner.entries.remove(&fence_value) else {
                return;
            };
            (removed, inner.subscribers.iter().map(|s| s.id).collect::<Vec<_>>())
        };

        let inner = self.inner.lock();
        for id in subscriber_ids {
            if let Some(sub) = inner.subscribers.iter().find(|s| s.id == id) {
                (sub.callback)(fence_value, &removed.fence, &removed.data);
            }
        }
    }

    pub fn is_inflight_buffer(&self, id: crate::resource::BufferId) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_buffer(id))
    }

    pub fn is_inflight_texture(&self, id: crate::resource::TextureId) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_texture(id))
    }

    pub fn is_inflight_texture_view(&self, id: crate::resource::TextureViewId) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_texture_view(id))
    }

    pub fn is_inflight_render_pass(&self, pass: &A::RenderPass) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_render_pass(pass))
    }

    pub fn is_inflight_framebuffer(&self, fb: &A::Framebuffer) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_framebuffer(fb))
    }

    pub fn is_inflight_bind_group(&self, group: &A::BindGroup) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_bind_group(group))
    }

    pub fn is_inflight_bind_group_layout(&self, layout: &A::BindGroupLayout) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_bind_group_layout(layout))
    }

    pub fn is_inflight_render_pipeline(&self, pipeline: &A::RenderPipeline) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_render_pipeline(pipeline))
    }

    pub fn is_inflight_compute_pipeline(&self, pipeline: &A::ComputePipeline) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_compute_pipeline(pipeline))
    }

    pub fn is_inflight_command_buffer(&self, cb: &A::CommandBuffer) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_command_buffer(cb))
    }

    pub fn is_inflight_sampler(&self, sampler: &A::Sampler) -> bool {
        self.inner.lock().entries.values().any(|e| e.data.contains_sampler(sampler))
    }

    /// Returns a subscriber id the caller can later pass to [`Self::unsubscribe`].
    pub fn subscribe(&self, callback: impl Fn(FenceValue, &A::Fence, &InflightEntry<A>) + Send + Sync + 'static) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner.subscribers.push(Subscriber { id, callback: Box::new(callback) });
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.inner.lock().subscribers.retain(|s| s.id != id);
    }
}

impl<A: Api> Default for InflightTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use hal::empty::{Context, EmptyDevice, Handle};
    use hal::Device;

    use super::*;
    use crate::resource::Buffer;

    fn buffer() -> Arc<Buffer<Context>> {
        Buffer::new(Handle(1), 16, gpu_types::BufferUsages::STORAGE)
    }

    #[test]
    fn buffer_inflight_until_fence_cleared() {
        let tracker: InflightTracker<Context> = InflightTracker::new();
        let device = EmptyDevice::new();
        let fence = unsafe { device.create_fence() }.unwrap();
        let buf = buffer();
        let mut object = ReferencedObjectSet::<Context>::default();
        object.buffers.push(buf.clone());

        tracker.add(100, fence, vec![object]);
        assert!(tracker.is_inflight_buffer(buf.id()));

        tracker.clear(100);
        assert!(!tracker.is_inflight_buffer(buf.id()));
    }

    #[test]
    fn clear_happens_before_subscriber_callback_observes_it() {
        let tracker: InflightTracker<Context> = InflightTracker::new();
        let device = EmptyDevice::new();
        let fence = unsafe { device.create_fence() }.unwrap();
        let buf = buffer();
        let mut object = ReferencedObjectSet::<Context>::default();
        object.buffers.push(buf.clone());
        tracker.add(200, fence, vec![object]);

        let saw_cleared_before_callback = Arc::new(AtomicBool::new(false));
        let saw_cleared_before_callback2 = saw_cleared_before_callback.clone();
        let id = buf.id();
        let tracker = Arc::new(tracker);
        let tracker2 = tracker.clone();
        tracker.subscribe(move |_value, _fence, _entry| {
            saw_cleared_before_callback2.store(!tracker2.is_inflight_buffer(id), Ordering::SeqCst);
        });

        tracker.clear(200);
        assert!(saw_cleared_before_callback.load(Ordering::SeqCst));
    }

    #[test]
    fn clear_of_unknown_fence_is_a_no_op() {
        let tracker: InflightTracker<Context> = InflightTracker::new();
        tracker.clear(999);
    }
}
