use ash::vk;

/// A Vulkan timeline semaphore standing in for [`crate::FenceValue`]
/// tracking. Unlike the upstream backend this is grounded on, this port
/// assumes `VK_KHR_timeline_semaphore` (core since Vulkan 1.2) is always
/// available and drops the legacy `VkFence`-pool fallback — the gpu-core
/// Inflight Tracker (spec §4.5) only ever needs "the highest value this
/// fence has reached", which a timeline semaphore gives for free.
#[derive(Debug, Clone, Copy)]
pub struct Fence {
    pub(super) raw: vk::Semaphore,
}

impl Fence {
    pub(super) fn get_latest(&self, device: &ash::Device) -> Result<crate::FenceValue, crate::DeviceError> {
        unsafe { Ok(device.get_semaphore_counter_value(self.raw)?) }
    }
}
