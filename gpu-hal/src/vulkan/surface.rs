use ash::vk;

/// Swapchain configuration, analogous to the façade layer's
/// `SurfaceConfiguration` (out of scope) — the fields this crate actually
/// needs to (re)create a `VkSwapchainKHR`.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceConfiguration {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub image_count: u32,
    pub present_mode: vk::PresentModeKHR,
}

/// Owns one `VkSurfaceKHR` and the `VkSwapchainKHR` currently configured
/// against it. Acquiring an image from this surface hands back a
/// [`super::SurfaceTexture`] the queue can later `present`.
pub struct Surface {
    pub(crate) raw: vk::SurfaceKHR,
    functor: ash::extensions::khr::Surface,
    swapchain_fn: ash::extensions::khr::Swapchain,
    swapchain: Option<SwapchainState>,
}

struct SwapchainState {
    raw: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    semaphores: Vec<vk::Semaphore>,
    next_semaphore: usize,
}

impl Surface {
    /// # Safety
    ///
    /// `raw` must have been created against the same `VkInstance` that
    /// `functor`/`swapchain_fn` were loaded from.
    pub unsafe fn from_raw(
        raw: vk::SurfaceKHR,
        functor: ash::extensions::khr::Surface,
        swapchain_fn: ash::extensions::khr::Swapchain,
    ) -> Self {
        Self { raw, functor, swapchain_fn, swapchain: None }
    }

    pub unsafe fn configure(
        &mut self,
        device: &ash::Device,
        config: SurfaceConfiguration,
    ) -> Result<(), crate::SurfaceError> {
        let old = self.swapchain.as_ref().map(|s| s.raw).unwrap_or(vk::SwapchainKHR::null());
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.raw)
            .min_image_count(config.image_count)
            .image_format(config.format)
            .image_color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(old);

        let raw = unsafe { self.swapchain_fn.create_swapchain(&info, None)? };
        if old != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_fn.destroy_swapchain(old, None) };
        }
        let images = unsafe { self.swapchain_fn.get_swapchain_images(raw)? };
        let semaphores = images
            .iter()
            .map(|_| unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None) })
            .collect::<Result<Vec<_>, _>>()?;

        self.swapchain = Some(SwapchainState { raw, images, semaphores, next_semaphore: 0 });
        Ok(())
    }

    pub unsafe fn acquire_texture(&mut self) -> Result<super::SurfaceTexture, crate::SurfaceError> {
        let state = self.swapchain.as_mut().expect("surface not configured");
        let semaphore = state.semaphores[state.next_semaphore];
        state.next_semaphore = (state.next_semaphore + 1) % state.semaphores.len();

        let (index, suboptimal) = unsafe {
            self.swapchain_fn.acquire_next_image(
                state.raw,
                !0,
                semaphore,
                vk::Fence::null(),
            )
        }
        .map_err(|error| match error {
            vk::Result::ERROR_OUT_OF_DATE_KHR => crate::SurfaceError::Outdated,
            vk::Result::ERROR_SURFACE_LOST_KHR => crate::SurfaceError::Lost,
            other => crate::SurfaceError::Device(crate::DeviceError::from(other)),
        })?;
        if suboptimal {
            log::warn!("suboptimal swapchain image {index}");
        }

        Ok(super::SurfaceTexture {
            index,
            texture: super::Texture { raw: state.images[index as usize] },
            wait_semaphore: semaphore,
            swapchain: state.raw,
        })
    }
}
