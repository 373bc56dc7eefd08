//! Translation between this crate's vocabulary types and their `ash::vk`
//! counterparts.

use ash::vk;

pub fn map_texture_format(format: gpu_types::TextureFormat) -> vk::Format {
    use gpu_types::TextureFormat as Tf;
    match format {
        Tf::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Tf::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        Tf::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        Tf::R8Unorm => vk::Format::R8_UNORM,
        Tf::Depth32Float => vk::Format::D32_SFLOAT,
        Tf::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub fn map_image_aspect(format: gpu_types::TextureFormat) -> vk::ImageAspectFlags {
    if !format.is_depth_stencil() {
        vk::ImageAspectFlags::COLOR
    } else if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

pub fn map_texture_layout(layout: crate::TextureLayout) -> vk::ImageLayout {
    use crate::TextureLayout as L;
    match layout {
        L::Undefined => vk::ImageLayout::UNDEFINED,
        L::General => vk::ImageLayout::GENERAL,
        L::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        L::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        L::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        L::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        L::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        L::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn map_stage_flags(stages: crate::StageFlags) -> vk::PipelineStageFlags {
    use crate::StageFlags as S;
    let mut out = vk::PipelineStageFlags::empty();
    if stages.contains(S::TOP_OF_PIPE) {
        out |= vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if stages.contains(S::BOTTOM_OF_PIPE) {
        out |= vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }
    if stages.contains(S::VERTEX_INPUT) {
        out |= vk::PipelineStageFlags::VERTEX_INPUT;
    }
    if stages.contains(S::VERTEX_SHADER) {
        out |= vk::PipelineStageFlags::VERTEX_SHADER;
    }
    if stages.contains(S::FRAGMENT_SHADER) {
        out |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if stages.contains(S::EARLY_FRAGMENT_TESTS) {
        out |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    }
    if stages.contains(S::LATE_FRAGMENT_TESTS) {
        out |= vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    }
    if stages.contains(S::COLOR_ATTACHMENT_OUTPUT) {
        out |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    }
    if stages.contains(S::COMPUTE_SHADER) {
        out |= vk::PipelineStageFlags::COMPUTE_SHADER;
    }
    if stages.contains(S::TRANSFER) {
        out |= vk::PipelineStageFlags::TRANSFER;
    }
    if stages.contains(S::ALL_COMMANDS) {
        out |= vk::PipelineStageFlags::ALL_COMMANDS;
    }
    if out.is_empty() {
        out = vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    out
}

pub fn map_access_flags(access: crate::AccessFlags) -> vk::AccessFlags {
    use crate::AccessFlags as A;
    let mut out = vk::AccessFlags::empty();
    if access.contains(A::INDIRECT_COMMAND_READ) {
        out |= vk::AccessFlags::INDIRECT_COMMAND_READ;
    }
    if access.contains(A::INDEX_READ) {
        out |= vk::AccessFlags::INDEX_READ;
    }
    if access.contains(A::VERTEX_ATTRIBUTE_READ) {
        out |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if access.contains(A::UNIFORM_READ) {
        out |= vk::AccessFlags::UNIFORM_READ;
    }
    if access.contains(A::SHADER_READ) {
        out |= vk::AccessFlags::SHADER_READ;
    }
    if access.contains(A::SHADER_WRITE) {
        out |= vk::AccessFlags::SHADER_WRITE;
    }
    if access.contains(A::COLOR_ATTACHMENT_READ) {
        out |= vk::AccessFlags::COLOR_ATTACHMENT_READ;
    }
    if access.contains(A::COLOR_ATTACHMENT_WRITE) {
        out |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if access.contains(A::DEPTH_STENCIL_ATTACHMENT_READ) {
        out |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if access.contains(A::DEPTH_STENCIL_ATTACHMENT_WRITE) {
        out |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if access.contains(A::TRANSFER_READ) {
        out |= vk::AccessFlags::TRANSFER_READ;
    }
    if access.contains(A::TRANSFER_WRITE) {
        out |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if access.contains(A::MEMORY_READ) {
        out |= vk::AccessFlags::MEMORY_READ;
    }
    if access.contains(A::MEMORY_WRITE) {
        out |= vk::AccessFlags::MEMORY_WRITE;
    }
    out
}

pub fn map_buffer_usage(usage: gpu_types::BufferUsages) -> vk::BufferUsageFlags {
    use gpu_types::BufferUsages as U;
    let mut out = vk::BufferUsageFlags::empty();
    if usage.contains(U::COPY_SRC) {
        out |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(U::COPY_DST) {
        out |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(U::INDEX) {
        out |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(U::VERTEX) {
        out |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(U::UNIFORM) {
        out |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(U::STORAGE) {
        out |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(U::INDIRECT) {
        out |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    out
}

pub fn map_texture_usage(
    usage: gpu_types::TextureUsages,
    format: gpu_types::TextureFormat,
) -> vk::ImageUsageFlags {
    use gpu_types::TextureUsages as U;
    let mut out = vk::ImageUsageFlags::empty();
    if usage.contains(U::COPY_SRC) {
        out |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(U::COPY_DST) {
        out |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(U::TEXTURE_BINDING) {
        out |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(U::STORAGE_BINDING) {
        out |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(U::RENDER_ATTACHMENT) {
        out |= if format.is_depth_stencil() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
    }
    out
}
