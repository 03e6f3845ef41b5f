//! Memory type selection
//!
//! Every image and buffer allocation picks its backing storage through the
//! scan below: lowest memory type index whose bit is set in the requirement
//! mask and whose property flags cover everything requested.

use ash::vk;

use crate::context::{VulkanError, VulkanResult};

/// Sentinel returned when no memory type satisfies a request
pub const NO_MEMORY_TYPE: u32 = u32::MAX;

/// Scan memory types from index 0 upward and return the first index whose
/// bit is set in `type_bits` and whose flags are a superset of `required`.
///
/// Returns [`NO_MEMORY_TYPE`] when nothing matches. Callers inside this
/// crate go through [`find_memory_type`], which turns the sentinel into an
/// error instead of letting an invalid index reach the allocator.
pub fn memory_type_index(
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
    memory_types: &[vk::MemoryType],
) -> u32 {
    for (i, memory_type) in memory_types.iter().enumerate() {
        if (type_bits & (1 << i)) != 0 && memory_type.property_flags.contains(required) {
            return i as u32;
        }
    }
    NO_MEMORY_TYPE
}

/// Checked memory type selection for allocations
pub fn find_memory_type(
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count as usize;
    let index = memory_type_index(type_bits, required, &memory_properties.memory_types[..count]);
    if index == NO_MEMORY_TYPE {
        return Err(VulkanError::NoSuitableMemoryType);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_type(flags: vk::MemoryPropertyFlags) -> vk::MemoryType {
        vk::MemoryType {
            property_flags: flags,
            heap_index: 0,
        }
    }

    fn sample_types() -> Vec<vk::MemoryType> {
        vec![
            memory_type(vk::MemoryPropertyFlags::HOST_VISIBLE),
            memory_type(vk::MemoryPropertyFlags::DEVICE_LOCAL),
            memory_type(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ),
        ]
    }

    #[test]
    fn picks_lowest_eligible_index() {
        // Mask 0b101 leaves indices 0 and 2 eligible; both are HOST_VISIBLE,
        // so the scan must settle on 0, not 2.
        let index = memory_type_index(
            0b101,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            &sample_types(),
        );
        assert_eq!(index, 0);
    }

    #[test]
    fn respects_requirement_mask() {
        // Only index 1 allowed by the mask, but it is not HOST_VISIBLE.
        let index = memory_type_index(
            0b010,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            &sample_types(),
        );
        assert_eq!(index, NO_MEMORY_TYPE);
    }

    #[test]
    fn requires_full_flag_superset() {
        let wanted =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let index = memory_type_index(0b111, wanted, &sample_types());
        assert_eq!(index, 2);
    }

    #[test]
    fn sentinel_when_no_match() {
        let index = memory_type_index(
            0b111,
            vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
            &sample_types(),
        );
        assert_eq!(index, NO_MEMORY_TYPE);
    }

    #[test]
    fn checked_lookup_surfaces_error() {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = 1;
        props.memory_types[0] = memory_type(vk::MemoryPropertyFlags::DEVICE_LOCAL);

        let result = find_memory_type(0b1, vk::MemoryPropertyFlags::HOST_VISIBLE, &props);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));

        let ok = find_memory_type(0b1, vk::MemoryPropertyFlags::DEVICE_LOCAL, &props);
        assert_eq!(ok.unwrap(), 0);
    }
}
