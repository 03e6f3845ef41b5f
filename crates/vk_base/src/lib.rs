//! # vk_base
//!
//! Vulkan device lifecycle and per-frame synchronization core.
//!
//! This crate owns the parts of a Vulkan application that every drawing
//! sample shares and nobody wants to rewrite: instance/device/queue setup,
//! a presentable swapchain with matching depth storage, a render pass and
//! framebuffer set, a pool of reusable command buffers, and the
//! fence/semaphore discipline that keeps the CPU from re-recording work the
//! GPU is still executing.
//!
//! Everything scene-specific (pipelines, geometry, textures, descriptor
//! sets) lives behind the [`FrameDelegate`] trait: the core opens a render
//! pass each frame and hands the delegate the command buffer.
//!
//! ```rust,no_run
//! use vk_base::prelude::*;
//!
//! struct ClearOnly;
//!
//! impl FrameDelegate for ClearOnly {
//!     fn prepare(&mut self, _ctx: &RenderContext<'_>) -> VulkanResult<()> { Ok(()) }
//!     fn cleanup(&mut self, _ctx: &RenderContext<'_>) {}
//!     fn record_frame(&mut self, _cmd: ash::vk::CommandBuffer, _frame: usize) -> VulkanResult<()> {
//!         Ok(())
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod buffer;
pub mod commands;
pub mod context;
pub mod frame;
pub mod framebuffer;
pub mod logging;
pub mod memory;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use context::{
    LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult,
};
pub use renderer::{FrameDelegate, RenderContext, Renderer, RendererConfig};
pub use window::WindowSource;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        buffer::{Buffer, IndexBuffer, UniformBuffer, VertexBuffer},
        renderer::{FrameDelegate, RenderContext, Renderer, RendererConfig},
        window::WindowSource,
        VulkanError, VulkanResult,
    };
}
