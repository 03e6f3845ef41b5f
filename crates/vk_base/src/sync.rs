//! Synchronization primitives
//!
//! RAII wrappers for semaphores and fences, and the single semaphore pair
//! the frame loop runs on. GPU-side ordering between acquire, render, and
//! present goes through the semaphores; CPU-side protection of command
//! buffers goes through per-image fences owned by the command module.

use ash::{vk, Device};

use crate::context::{VulkanError, VulkanResult};

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally pre-signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, fence })
    }

    /// Block until the fence signals or the timeout elapses
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout_ns)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// The one semaphore pair shared across all frames.
///
/// Exactly two binary semaphores exist for the whole run, not one pair per
/// swapchain image. Together with the per-image fences this caps CPU/GPU
/// overlap at a single frame in flight; per-image pairs would allow deeper
/// pipelining but change the protocol's observable behavior.
pub struct FrameSync {
    /// Signaled when the acquired image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering finishes; presentation waits on it
    pub render_finished: Semaphore,
}

impl FrameSync {
    /// Create the semaphore pair
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
        })
    }
}
