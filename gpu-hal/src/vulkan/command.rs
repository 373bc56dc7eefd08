use ash::vk;

use super::{conv, CommandBuffer, CommandEncoder};
use crate::{BufferBarrier, ClearValue, DeviceError, IndexFormat, RenderArea, StageFlags, TextureBarrier};

impl crate::CommandEncoder<super::Context> for CommandEncoder {
    unsafe fn begin_encoding(&mut self) -> Result<(), DeviceError> {
        self.temp.clear();
        let info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.raw.begin_command_buffer(self.active, &info)? };
        Ok(())
    }

    unsafe fn end_encoding(&mut self) -> Result<CommandBuffer, DeviceError> {
        unsafe { self.device.raw.end_command_buffer(self.active)? };
        Ok(CommandBuffer { raw: self.active })
    }

    unsafe fn discard_encoding(&mut self) {
        let _ = unsafe {
            self.device
                .raw
                .reset_command_buffer(self.active, vk::CommandBufferResetFlags::empty())
        };
        self.temp.clear();
    }

    unsafe fn cmd_pipeline_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        buffer_barriers: &[BufferBarrier<super::Context>],
        texture_barriers: &[TextureBarrier<super::Context>],
    ) {
        self.temp.buffer_barriers.clear();
        self.temp.image_barriers.clear();

        for b in buffer_barriers {
            self.temp.buffer_barriers.push(
                vk::BufferMemoryBarrier::builder()
                    .src_access_mask(conv::map_access_flags(b.src_access))
                    .dst_access_mask(conv::map_access_flags(b.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(b.buffer.raw)
                    .offset(0)
                    .size(vk::WHOLE_SIZE)
                    .build(),
            );
        }

        for t in texture_barriers {
            self.temp.image_barriers.push(
                vk::ImageMemoryBarrier::builder()
                    .src_access_mask(conv::map_access_flags(t.src_access))
                    .dst_access_mask(conv::map_access_flags(t.dst_access))
                    .old_layout(conv::map_texture_layout(t.old_layout))
                    .new_layout(conv::map_texture_layout(t.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(t.texture.raw)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: t.base_mip,
                        level_count: t.mip_count,
                        base_array_layer: t.base_layer,
                        layer_count: t.layer_count,
                    })
                    .build(),
            );
        }

        // Each barrier array carries its own length; passing zero for the
        // buffer/image counts here would silently drop every barrier built
        // above.
        unsafe {
            self.device.raw.cmd_pipeline_barrier(
                self.active,
                conv::map_stage_flags(src_stage),
                conv::map_stage_flags(dst_stage),
                vk::DependencyFlags::BY_REGION,
                &[],
                &self.temp.buffer_barriers,
                &self.temp.image_barriers,
            )
        };
    }

    unsafe fn cmd_begin_render_pass(
        &mut self,
        render_pass: &super::RenderPass,
        framebuffer: &super::Framebuffer,
        render_area: RenderArea,
        clear_values: &[ClearValue],
    ) {
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: render_area.x, y: render_area.y },
            extent: vk::Extent2D { width: render_area.width, height: render_area.height },
        };
        let raw_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|cv| match *cv {
                ClearValue::Color(color) => vk::ClearValue { color: vk::ClearColorValue { float32: color } },
                ClearValue::DepthStencil { depth, stencil } => {
                    vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth, stencil } }
                }
            })
            .collect();
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.raw)
            .framebuffer(framebuffer.raw)
            .render_area(area)
            .clear_values(&raw_clear_values);
        unsafe {
            self.device
                .raw
                .cmd_begin_render_pass(self.active, &info, vk::SubpassContents::INLINE)
        };
    }

    unsafe fn cmd_end_render_pass(&mut self) {
        unsafe { self.device.raw.cmd_end_render_pass(self.active) };
    }

    unsafe fn cmd_bind_render_pipeline(
        &mut self,
        pipeline: &super::RenderPipeline,
        layout: &super::PipelineLayout,
    ) {
        self.active_pipeline_layout = Some((layout.raw, vk::PipelineBindPoint::GRAPHICS));
        unsafe {
            self.device.raw.cmd_bind_pipeline(
                self.active,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.raw,
            )
        };
    }

    unsafe fn cmd_bind_compute_pipeline(
        &mut self,
        pipeline: &super::ComputePipeline,
        layout: &super::PipelineLayout,
    ) {
        self.active_pipeline_layout = Some((layout.raw, vk::PipelineBindPoint::COMPUTE));
        unsafe {
            self.device.raw.cmd_bind_pipeline(
                self.active,
                vk::PipelineBindPoint::COMPUTE,
                pipeline.raw,
            )
        };
    }

    unsafe fn cmd_bind_descriptor_set(&mut self, index: u32, set: &super::BindGroup) {
        let Some((layout, bind_point)) = self.active_pipeline_layout else {
            log::warn!("cmd_bind_descriptor_set called with no pipeline bound");
            return;
        };
        let sets = [set.raw];
        unsafe {
            self.device.raw.cmd_bind_descriptor_sets(
                self.active,
                bind_point,
                layout,
                index,
                &sets,
                &[],
            )
        };
    }

    unsafe fn cmd_bind_vertex_buffer(&mut self, slot: u32, buffer: &super::Buffer) {
        let buffers = [buffer.raw];
        let offsets = [0];
        unsafe {
            self.device
                .raw
                .cmd_bind_vertex_buffers(self.active, slot, &buffers, &offsets)
        };
    }

    unsafe fn cmd_bind_index_buffer(&mut self, buffer: &super::Buffer, format: IndexFormat) {
        let index_type = match format {
            IndexFormat::Uint16 => vk::IndexType::UINT16,
            IndexFormat::Uint32 => vk::IndexType::UINT32,
        };
        unsafe {
            self.device
                .raw
                .cmd_bind_index_buffer(self.active, buffer.raw, 0, index_type)
        };
    }

    unsafe fn cmd_set_viewport(&mut self) {}
    unsafe fn cmd_set_scissor(&mut self) {}
    unsafe fn cmd_set_blend_constant(&mut self, constant: [f32; 4]) {
        unsafe { self.device.raw.cmd_set_blend_constants(self.active, &constant) };
    }

    unsafe fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe { self.device.raw.cmd_draw(self.active, vertex_count, instance_count, 0, 0) };
    }

    unsafe fn cmd_draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .raw
                .cmd_draw_indexed(self.active, index_count, instance_count, 0, 0, 0)
        };
    }

    unsafe fn cmd_draw_indirect(&mut self, buffer: &super::Buffer, offset: u64) {
        unsafe { self.device.raw.cmd_draw_indirect(self.active, buffer.raw, offset, 1, 0) };
    }

    unsafe fn cmd_draw_indexed_indirect(&mut self, buffer: &super::Buffer, offset: u64) {
        unsafe {
            self.device
                .raw
                .cmd_draw_indexed_indirect(self.active, buffer.raw, offset, 1, 0)
        };
    }

    unsafe fn cmd_dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.device.raw.cmd_dispatch(self.active, x, y, z) };
    }

    unsafe fn cmd_dispatch_indirect(&mut self, buffer: &super::Buffer, offset: u64) {
        unsafe { self.device.raw.cmd_dispatch_indirect(self.active, buffer.raw, offset) };
    }

    unsafe fn cmd_begin_query(&mut self, set: &super::QuerySet, index: u32) {
        unsafe {
            self.device
                .raw
                .cmd_begin_query(self.active, set.raw, index, vk::QueryControlFlags::empty())
        };
    }

    unsafe fn cmd_end_query(&mut self, set: &super::QuerySet, index: u32) {
        unsafe { self.device.raw.cmd_end_query(self.active, set.raw, index) };
    }

    unsafe fn cmd_write_timestamp(&mut self, set: &super::QuerySet, index: u32) {
        unsafe {
            self.device.raw.cmd_write_timestamp(
                self.active,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                set.raw,
                index,
            )
        };
    }

    unsafe fn cmd_resolve_query_set(&mut self, set: &super::QuerySet, start: u32, count: u32) {
        // Resolving into a buffer requires a destination; left to the
        // façade layer, which owns the readback buffer.
        let _ = (set, start, count);
    }

    unsafe fn cmd_copy_buffer_to_buffer(&mut self, src: &super::Buffer, dst: &super::Buffer, size: u64) {
        let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
        unsafe {
            self.device
                .raw
                .cmd_copy_buffer(self.active, src.raw, dst.raw, &[region])
        };
    }

    unsafe fn cmd_copy_buffer_to_texture(
        &mut self,
        src: &super::Buffer,
        dst: &super::Texture,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth_or_array_layers,
            })
            .build();
        unsafe {
            self.device.raw.cmd_copy_buffer_to_image(
                self.active,
                src.raw,
                dst.raw,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }

    unsafe fn cmd_copy_texture_to_buffer(
        &mut self,
        src: &super::Texture,
        dst: &super::Buffer,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth_or_array_layers,
            })
            .build();
        unsafe {
            self.device.raw.cmd_copy_image_to_buffer(
                self.active,
                src.raw,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.raw,
                &[region],
            )
        };
    }

    unsafe fn cmd_copy_texture_to_texture(
        &mut self,
        src: &super::Texture,
        dst: &super::Texture,
        mip_level: u32,
        extent: gpu_types::Extent3d,
    ) {
        let subresource = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level,
            base_array_layer: 0,
            layer_count: 1,
        };
        let region = vk::ImageCopy::builder()
            .src_subresource(subresource)
            .src_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .dst_subresource(subresource)
            .dst_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth_or_array_layers,
            })
            .build();
        unsafe {
            self.device.raw.cmd_copy_image(
                self.active,
                src.raw,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.raw,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }

    unsafe fn cmd_clear_buffer(&mut self, buffer: &super::Buffer, offset: u64, size: u64) {
        unsafe {
            self.device
                .raw
                .cmd_fill_buffer(self.active, buffer.raw, offset, size, 0)
        };
    }
}
