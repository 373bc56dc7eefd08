//! Descriptor pool (spec §4.7): every allocation creates its own backing
//! `A::DescriptorPool`, sized by clamping per-descriptor-type counts
//! against the device's [`gpu_types::DescriptorLimits`]. One pool per
//! bind group — trades fragmentation and pool count for a trivial
//! per-set lifecycle (freeing a bind group just destroys its pool).

use hal::{Api, Device, DescriptorPoolSizes};

use crate::error::CoreError;

const PER_TYPE_CAP: u32 = 32;

fn clamp(limit: u32) -> u32 {
    PER_TYPE_CAP.min(limit)
}

/// Builds the clamped [`DescriptorPoolSizes`] a single bind-group
/// allocation needs, given the device's reported limits.
pub fn clamped_sizes(limits: &gpu_types::DescriptorLimits) -> DescriptorPoolSizes {
    DescriptorPoolSizes {
        uniform_buffers: clamp(limits.max_uniform_buffers),
        uniform_buffers_dynamic: clamp(limits.max_uniform_buffers_dynamic),
        samplers: clamp(limits.max_samplers),
        sampled_images: clamp(limits.max_sampled_images),
        combined_image_samplers: clamp(limits.max_combined_image_samplers),
        input_attachments: clamp(limits.max_input_attachments),
        storage_buffers: clamp(limits.max_storage_buffers),
        storage_buffers_dynamic: clamp(limits.max_storage_buffers_dynamic),
    }
}

/// Allocates a single-set descriptor pool sized for one bind-group
/// creation, clamped to `limits`.
pub fn allocate_pool_for_one_set<A: Api>(
    device: &A::Device,
    limits: &gpu_types::DescriptorLimits,
) -> Result<A::DescriptorPool, CoreError> {
    let sizes = clamped_sizes(limits);
    Ok(unsafe { device.create_descriptor_pool(1, sizes) }?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_large_limits_to_the_per_type_cap() {
        let limits = gpu_types::DescriptorLimits {
            max_uniform_buffers: 4000,
            max_uniform_buffers_dynamic: 4000,
            max_samplers: 4000,
            max_sampled_images: 4000,
            max_combined_image_samplers: 4000,
            max_input_attachments: 4000,
            max_storage_buffers: 4000,
            max_storage_buffers_dynamic: 4000,
        };
        let sizes = clamped_sizes(&limits);
        assert_eq!(sizes.uniform_buffers, 32);
        assert_eq!(sizes.storage_buffers_dynamic, 32);
    }

    #[test]
    fn never_exceeds_a_tight_device_limit() {
        let limits = gpu_types::DescriptorLimits {
            max_uniform_buffers: 4,
            max_uniform_buffers_dynamic: 8,
            max_samplers: 4000,
            max_sampled_images: 4000,
            max_combined_image_samplers: 4000,
            max_input_attachments: 4,
            max_storage_buffers: 24,
            max_storage_buffers_dynamic: 4,
        };
        let sizes = clamped_sizes(&limits);
        assert_eq!(sizes.uniform_buffers, 4);
        assert_eq!(sizes.input_attachments, 4);
        assert_eq!(sizes.storage_buffers, 24);
    }
}
