use ash::vk;

use super::{CommandBuffer, Fence, Queue, Semaphore, SurfaceTexture};
use crate::{DeviceError, FenceValue, StageFlags, SurfaceError};

impl crate::Queue<super::Context> for Queue {
    unsafe fn submit(
        &self,
        command_buffers: &[CommandBuffer],
        wait_semaphores: &[(Semaphore, StageFlags)],
        signal_semaphores: &[Semaphore],
        signal_fence: Option<(&Fence, FenceValue)>,
    ) -> Result<(), DeviceError> {
        let vk_cmd_buffers: Vec<_> = command_buffers.iter().map(|c| c.raw).collect();
        let wait_raw: Vec<_> = wait_semaphores.iter().map(|(s, _)| s.raw).collect();
        let wait_stages: Vec<_> =
            wait_semaphores.iter().map(|(_, s)| super::conv::map_stage_flags(*s)).collect();
        let signal_raw: Vec<_> = signal_semaphores.iter().map(|s| s.raw).collect();

        let mut fence_semaphores = signal_raw.clone();
        let mut fence_values: Vec<u64> = signal_semaphores.iter().map(|_| 0).collect();
        if let Some((fence, value)) = signal_fence {
            fence_semaphores.push(fence.raw);
            fence_values.push(value);
        }

        let mut submit_info = vk::SubmitInfo::builder()
            .command_buffers(&vk_cmd_buffers)
            .wait_semaphores(&wait_raw)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&fence_semaphores);

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::builder().signal_semaphore_values(&fence_values);
        submit_info = submit_info.push_next(&mut timeline_info);

        profiling::scope!("vkQueueSubmit");
        unsafe {
            self.device
                .raw
                .queue_submit(self.raw, &[submit_info.build()], vk::Fence::null())?
        };
        Ok(())
    }

    unsafe fn present(
        &self,
        surface_texture: SurfaceTexture,
        wait_semaphores: &[Semaphore],
    ) -> Result<(), SurfaceError> {
        let swapchain_fn = self
            .swapchain_fn
            .as_ref()
            .expect("present() called on a queue with no swapchain extension loaded");

        let swapchains = [surface_texture.swapchain];
        let wait_raw: Vec<_> = wait_semaphores.iter().map(|s| s.raw).collect();
        let indices = [surface_texture.index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_raw)
            .swapchains(&swapchains)
            .image_indices(&indices);

        profiling::scope!("vkQueuePresentKHR");
        let suboptimal = unsafe { swapchain_fn.queue_present(self.raw, &present_info) }.map_err(
            |error| match error {
                vk::Result::ERROR_OUT_OF_DATE_KHR => SurfaceError::Outdated,
                vk::Result::ERROR_SURFACE_LOST_KHR => SurfaceError::Lost,
                other => SurfaceError::Device(DeviceError::from(other)),
            },
        )?;
        if suboptimal {
            log::warn!("suboptimal present of frame {}", surface_texture.index);
        }
        Ok(())
    }
}
