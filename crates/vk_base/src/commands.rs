//! Command buffer resources
//!
//! A single resettable command pool plus the per-image command buffers and
//! fences the frame loop cycles through. Buffer `i` belongs to swapchain
//! image `i` and is only safe to re-record after fence `i` has been observed
//! signaled.

use ash::{vk, Device};

use crate::context::{VulkanError, VulkanResult};
use crate::sync::Fence;

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a resettable command pool on the graphics family
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers from this pool
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees all buffers allocated from it.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Per-image command buffers and submission fences.
///
/// Holds exactly one command buffer and one fence per swapchain image; the
/// constructor fixes both lengths to the image count, and the fences start
/// signaled so the very first wait on each succeeds immediately.
pub struct FrameCommands {
    command_buffers: Vec<vk::CommandBuffer>,
    fences: Vec<Fence>,
}

impl FrameCommands {
    /// Allocate `image_count` command buffers and pre-signaled fences
    pub fn new(device: &Device, pool: &CommandPool, image_count: usize) -> VulkanResult<Self> {
        let command_buffers = pool.allocate_command_buffers(image_count as u32)?;

        let mut fences = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            fences.push(Fence::new(device.clone(), true)?);
        }

        debug_assert_eq!(command_buffers.len(), fences.len());

        Ok(Self {
            command_buffers,
            fences,
        })
    }

    /// Command buffer for swapchain image `index`
    pub fn command_buffer(&self, index: usize) -> vk::CommandBuffer {
        self.command_buffers[index]
    }

    /// Submission fence for swapchain image `index`
    pub fn fence(&self, index: usize) -> &Fence {
        &self.fences[index]
    }

    /// Number of per-image resource slots
    pub fn len(&self) -> usize {
        self.command_buffers.len()
    }

    /// Whether no slots exist (never true for a constructed renderer)
    pub fn is_empty(&self) -> bool {
        self.command_buffers.is_empty()
    }
}
