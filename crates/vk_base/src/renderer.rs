//! Renderer orchestration
//!
//! Owns the whole Vulkan object tree and the per-frame loop. Resources are
//! created in a fixed order and never recreated mid-run; destruction walks
//! the exact reverse order through RAII, after a full device idle wait.
//! Scene-specific work is delegated to a [`FrameDelegate`] injected per
//! call, never inherited from.

use ash::vk;

use crate::commands::{CommandPool, FrameCommands};
use crate::context::{VulkanContext, VulkanError, VulkanResult};
use crate::frame::{self, FrameFlow};
use crate::framebuffer::{DepthBuffer, Framebuffer};
use crate::render_pass::RenderPass;
use crate::swapchain::Swapchain;
use crate::sync::FrameSync;
use crate::window::WindowSource;

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan instance
    pub app_name: String,
    /// Background color every frame clears to
    pub clear_color: [f32; 4],
    /// Timeout for image acquire and fence waits, in nanoseconds.
    ///
    /// Defaults to unbounded; a finite value turns a wedged driver into a
    /// reportable error instead of a hang.
    pub frame_timeout_ns: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "vk_base application".to_string(),
            clear_color: [0.5, 0.25, 0.25, 0.0],
            frame_timeout_ns: u64::MAX,
        }
    }
}

/// Core resources handed to the delegate during `prepare` and `cleanup`.
///
/// Everything a drawing scenario needs to build pipelines, geometry buffers,
/// descriptor sets, and textures, without reaching into the renderer's
/// internals.
pub struct RenderContext<'a> {
    /// Vulkan instance handle
    pub instance: &'a ash::Instance,
    /// Logical device handle
    pub device: &'a ash::Device,
    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,
    /// Cached memory type table for allocation decisions
    pub memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
    /// The single submission queue
    pub graphics_queue: vk::Queue,
    /// Graphics queue family index
    pub graphics_family: u32,
    /// The render pass delegate pipelines must be compatible with
    pub render_pass: vk::RenderPass,
    /// Negotiated surface format
    pub surface_format: vk::SurfaceFormatKHR,
    /// Swapchain extent
    pub extent: vk::Extent2D,
    /// Swapchain image count; per-frame resources should match it
    pub image_count: usize,
}

/// Per-scenario drawing capability, injected into the renderer.
///
/// The three methods bracket the renderer's lifecycle: `prepare` runs once
/// after every core resource exists, `cleanup` once before any of them is
/// destroyed (device idle), and `record_frame` once per [`Renderer::render`]
/// call inside an already-open render pass.
pub trait FrameDelegate {
    /// Build pipelines, buffers, descriptor sets, textures
    fn prepare(&mut self, ctx: &RenderContext<'_>) -> VulkanResult<()>;

    /// Release everything allocated in `prepare`
    fn cleanup(&mut self, ctx: &RenderContext<'_>);

    /// Record drawing commands into the open command buffer.
    ///
    /// The render pass bound to the current framebuffer is already begun;
    /// the delegate must not begin/end passes or submit/present.
    /// `frame_index` selects per-image resources such as uniform buffer
    /// copies and is valid only for the span of this call.
    fn record_frame(
        &mut self,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
    ) -> VulkanResult<()>;
}

/// The rendering core: device lifecycle plus the frame loop.
///
/// Field declaration order is the reverse of creation order; RAII drops
/// walk the ownership tree leaves-first back to the instance.
pub struct Renderer {
    sync: FrameSync,
    frame_commands: FrameCommands,
    command_pool: CommandPool,
    framebuffers: Vec<Framebuffer>,
    render_pass: RenderPass,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    context: VulkanContext,
    config: RendererConfig,
    current_frame: usize,
    prepared: bool,
    shut_down: bool,
}

impl Renderer {
    /// Create every core resource in the fixed startup order
    pub fn new(window: &dyn WindowSource, config: RendererConfig) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, &config.app_name)?;
        let device = context.raw_device();

        let swapchain = Swapchain::new(
            device.clone(),
            context.swapchain_loader().clone(),
            context.surface,
            &context.surface_loader,
            &context.physical_device,
            window.framebuffer_size(),
        )?;

        let depth_buffer = DepthBuffer::new(
            device.clone(),
            &context.physical_device.memory_properties,
            swapchain.extent(),
        )?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format().format)?;

        let framebuffers: VulkanResult<Vec<Framebuffer>> = swapchain
            .image_views()
            .iter()
            .map(|&color_view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    color_view,
                    depth_buffer.image_view(),
                    swapchain.extent(),
                )
            })
            .collect();
        let framebuffers = framebuffers?;

        let command_pool = CommandPool::new(device.clone(), context.graphics_family())?;
        let frame_commands = FrameCommands::new(&device, &command_pool, swapchain.image_count())?;

        let sync = FrameSync::new(&device)?;

        // One framebuffer, one command buffer, one fence per swapchain
        // image, for the renderer's whole lifetime.
        if framebuffers.len() != swapchain.image_count()
            || frame_commands.len() != swapchain.image_count()
        {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "per-image resource mismatch: {} framebuffers, {} command slots, {} images",
                    framebuffers.len(),
                    frame_commands.len(),
                    swapchain.image_count()
                ),
            });
        }

        log::info!(
            "Renderer ready: {} swapchain images at {}x{}",
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            sync,
            frame_commands,
            command_pool,
            framebuffers,
            render_pass,
            depth_buffer,
            swapchain,
            context,
            config,
            current_frame: 0,
            prepared: false,
            shut_down: false,
        })
    }

    /// Core resource view for delegates
    pub fn render_context(&self) -> RenderContext<'_> {
        RenderContext {
            instance: &self.context.instance.instance,
            device: &self.context.device.device,
            physical_device: self.context.physical_device.device,
            memory_properties: &self.context.physical_device.memory_properties,
            graphics_queue: self.context.graphics_queue(),
            graphics_family: self.context.graphics_family(),
            render_pass: self.render_pass.handle(),
            surface_format: self.swapchain.format(),
            extent: self.swapchain.extent(),
            image_count: self.swapchain.image_count(),
        }
    }

    /// Invoke the delegate's one-time setup. Must be called exactly once,
    /// before the first [`render`](Self::render).
    pub fn prepare(&mut self, delegate: &mut dyn FrameDelegate) -> VulkanResult<()> {
        if self.prepared {
            return Err(VulkanError::InvalidOperation {
                reason: "prepare called twice".to_string(),
            });
        }
        delegate.prepare(&self.render_context())?;
        self.prepared = true;
        Ok(())
    }

    /// Render one frame.
    ///
    /// Walks the full per-frame protocol; any non-success result is fatal
    /// for the run and must not be retried. The delegate's `record_frame`
    /// runs inside the open render pass with the current image index.
    pub fn render(&mut self, delegate: &mut dyn FrameDelegate) -> VulkanResult<()> {
        if !self.prepared || self.shut_down {
            return Err(VulkanError::InvalidOperation {
                reason: "render outside the prepare/shutdown window".to_string(),
            });
        }

        let mut flow = RenderFrame {
            renderer: self,
            delegate,
        };
        let index = frame::drive_frame(&mut flow)?;
        self.current_frame = index as usize;
        Ok(())
    }

    /// Index of the most recently rendered swapchain image.
    ///
    /// Meaningful to the delegate only during `record_frame`, which receives
    /// the same value as an argument.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Swapchain image count (equals framebuffer/command buffer/fence count)
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Wait for the device, run the delegate's `cleanup`, and mark the
    /// renderer finished. Core resources are destroyed when the renderer is
    /// dropped, in reverse creation order.
    pub fn shutdown(&mut self, delegate: &mut dyn FrameDelegate) -> VulkanResult<()> {
        if self.shut_down {
            log::warn!("shutdown called twice; ignoring");
            return Ok(());
        }
        self.context.wait_idle()?;
        if self.prepared {
            delegate.cleanup(&self.render_context());
        }
        self.shut_down = true;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Sync objects and command buffers must not be destroyed while the
        // GPU still references them; fields drop right after this returns.
        let _ = self.context.wait_idle();
        if !self.shut_down {
            log::warn!("Renderer dropped without shutdown; delegate cleanup was skipped");
        }
    }
}

/// One in-flight frame: borrows the renderer and the delegate and maps the
/// frame protocol onto real Vulkan calls.
struct RenderFrame<'a> {
    renderer: &'a mut Renderer,
    delegate: &'a mut dyn FrameDelegate,
}

impl FrameFlow for RenderFrame<'_> {
    fn acquire_image(&mut self) -> VulkanResult<u32> {
        let (index, _suboptimal) = unsafe {
            self.renderer
                .context
                .swapchain_loader()
                .acquire_next_image(
                    self.renderer.swapchain.handle(),
                    self.renderer.config.frame_timeout_ns,
                    self.renderer.sync.image_available.handle(),
                    vk::Fence::null(),
                )
                .map_err(VulkanError::Api)?
        };
        Ok(index)
    }

    fn wait_fence(&mut self, image_index: u32) -> VulkanResult<()> {
        self.renderer
            .frame_commands
            .fence(image_index as usize)
            .wait(self.renderer.config.frame_timeout_ns)
    }

    fn record(&mut self, image_index: u32) -> VulkanResult<()> {
        let index = image_index as usize;
        self.renderer.current_frame = index;

        let device = &self.renderer.context.device.device;
        let command_buffer = self.renderer.frame_commands.command_buffer(index);

        // Implicit reset: the pool was created with RESET_COMMAND_BUFFER and
        // the fence wait guarantees the previous submission retired.
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.renderer.config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.renderer.render_pass.handle())
            .framebuffer(self.renderer.framebuffers[index].handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.renderer.swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        self.delegate.record_frame(command_buffer, index)?;

        unsafe {
            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    fn reset_fence(&mut self, image_index: u32) -> VulkanResult<()> {
        self.renderer.frame_commands.fence(image_index as usize).reset()
    }

    fn submit(&mut self, image_index: u32) -> VulkanResult<()> {
        let index = image_index as usize;
        let wait_semaphores = [self.renderer.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.renderer.frame_commands.command_buffer(index)];
        let signal_semaphores = [self.renderer.sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.renderer
                .context
                .device
                .device
                .queue_submit(
                    self.renderer.context.graphics_queue(),
                    &[submit_info.build()],
                    self.renderer.frame_commands.fence(index).handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, image_index: u32) -> VulkanResult<()> {
        let wait_semaphores = [self.renderer.sync.render_finished.handle()];
        let swapchains = [self.renderer.swapchain.handle()];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.renderer
                .context
                .swapchain_loader()
                .queue_present(self.renderer.context.graphics_queue(), &present_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }
}
