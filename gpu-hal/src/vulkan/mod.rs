/*!
# Vulkan backend.

This backend assumes a physical device, logical device and queue have
already been selected and created by the caller — that selection belongs
to the public façade this crate sits behind, which is out of scope here.
What this module owns is everything downstream of `VkDevice`: buffers,
textures, command encoding, and the raw semaphore/fence primitives
gpu-core's pools and caches allocate from.

## Fences

Fences are Vulkan timeline semaphores (`VK_KHR_timeline_semaphore`),
matching `gpu-core`'s [`FenceValue`](crate::FenceValue) model directly —
no `VkFence` pool fallback, since every target of this crate carries
Vulkan 1.2.
*/

mod command;
mod conv;
mod device;
mod fence;
mod queue;
mod surface;

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

pub use fence::Fence;
pub use surface::{Surface, SurfaceConfiguration};

#[derive(Clone, Debug)]
pub struct Context;

impl crate::Api for Context {
    type Device = Device;
    type Queue = Queue;
    type CommandEncoder = CommandEncoder;

    type Buffer = Buffer;
    type Texture = Texture;
    type TextureView = TextureView;
    type Sampler = Sampler;
    type CommandBuffer = CommandBuffer;
    type Semaphore = Semaphore;
    type Fence = Fence;
    type BindGroupLayout = BindGroupLayout;
    type BindGroup = BindGroup;
    type PipelineLayout = PipelineLayout;
    type RenderPipeline = RenderPipeline;
    type ComputePipeline = ComputePipeline;
    type QuerySet = QuerySet;
    type RenderPass = RenderPass;
    type Framebuffer = Framebuffer;
    type DescriptorPool = DescriptorPool;
    type SurfaceTexture = SurfaceTexture;
}

/// Shared state every `Buffer`/`Texture`/etc. handle on this backend holds
/// a reference to, so a raw Vulkan handle can always reach the `ash::Device`
/// that owns it without threading a `&Device` through every call.
pub(crate) struct DeviceShared {
    pub(crate) raw: ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) queue_family_index: u32,
}

pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
    mem_allocator: Mutex<gpu_alloc::GpuAllocator<vk::DeviceMemory>>,
    desc_allocator:
        Mutex<gpu_descriptor::DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>>,
}

impl Device {
    /// Wraps an already-created, already-configured Vulkan device. Physical
    /// device selection, instance creation and extension negotiation all
    /// happen above this layer.
    ///
    /// # Safety
    ///
    /// `raw` must have been created from `physical_device` with
    /// `VK_KHR_timeline_semaphore` enabled (core in Vulkan 1.2+).
    pub unsafe fn from_raw(
        raw: ash::Device,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        mem_config: gpu_alloc::Config,
        mem_props: gpu_alloc::DeviceProperties<'static>,
    ) -> Self {
        Self {
            shared: Arc::new(DeviceShared { raw, physical_device, queue_family_index }),
            mem_allocator: Mutex::new(gpu_alloc::GpuAllocator::new(mem_config, mem_props)),
            desc_allocator: Mutex::new(gpu_descriptor::DescriptorAllocator::new()),
        }
    }
}

pub struct Queue {
    pub(crate) raw: vk::Queue,
    pub(crate) device: Arc<DeviceShared>,
    pub(crate) swapchain_fn: Option<ash::extensions::khr::Swapchain>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Buffer {
    pub(crate) raw: vk::Buffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Texture {
    pub(crate) raw: vk::Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureView {
    pub(crate) raw: vk::ImageView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sampler {
    pub(crate) raw: vk::Sampler,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandBuffer {
    pub(crate) raw: vk::CommandBuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Semaphore {
    pub(crate) raw: vk::Semaphore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindGroupLayout {
    pub(crate) raw: vk::DescriptorSetLayout,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindGroup {
    pub(crate) raw: vk::DescriptorSet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineLayout {
    pub(crate) raw: vk::PipelineLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderPipeline {
    pub(crate) raw: vk::Pipeline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComputePipeline {
    pub(crate) raw: vk::Pipeline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuerySet {
    pub(crate) raw: vk::QueryPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderPass {
    pub(crate) raw: vk::RenderPass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Framebuffer {
    pub(crate) raw: vk::Framebuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorPool {
    pub(crate) raw: vk::DescriptorPool,
}

#[derive(Clone, Debug)]
pub struct SurfaceTexture {
    pub(crate) index: u32,
    pub(crate) texture: Texture,
    pub(crate) wait_semaphore: vk::Semaphore,
    pub(crate) swapchain: vk::SwapchainKHR,
}

/// Allocation recycling storage for a single [`CommandEncoder`], so
/// repeated `begin_encoding`/barrier-heavy passes don't reallocate a `Vec`
/// every call.
#[derive(Default)]
struct Temp {
    buffer_barriers: Vec<vk::BufferMemoryBarrier>,
    image_barriers: Vec<vk::ImageMemoryBarrier>,
}

impl Temp {
    fn clear(&mut self) {
        self.buffer_barriers.clear();
        self.image_barriers.clear();
    }
}

pub struct CommandEncoder {
    pub(crate) raw: vk::CommandPool,
    pub(crate) device: Arc<DeviceShared>,
    pub(crate) active: vk::CommandBuffer,
    temp: Temp,
    free: Vec<vk::CommandBuffer>,
    /// Layout and bind point from the most recent `cmd_bind_render_pipeline`/
    /// `cmd_bind_compute_pipeline`, so a later `cmd_bind_descriptor_set` on
    /// the same pass knows which `VkPipelineLayout`/`VkPipelineBindPoint` to
    /// bind against.
    active_pipeline_layout: Option<(vk::PipelineLayout, vk::PipelineBindPoint)>,
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder").field("raw", &self.raw).finish()
    }
}

impl From<vk::Result> for crate::DeviceError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::OutOfHostMemory,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Self::OutOfDeviceMemory,
            vk::Result::ERROR_DEVICE_LOST => Self::Lost,
            other => {
                log::warn!("unrecognized Vulkan error {other:?}");
                Self::Lost
            }
        }
    }
}
