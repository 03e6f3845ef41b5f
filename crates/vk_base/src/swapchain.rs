//! Swapchain management
//!
//! Negotiates a surface format, resolves the presentable extent, and creates
//! the chain of color images the frame loop cycles through. The image count
//! chosen here fixes the cardinality of framebuffers, command buffers, and
//! fences for the lifetime of the renderer; resizing requires a full
//! teardown and rebuild, which this crate does not attempt.

use ash::extensions::khr::Surface;
use ash::{vk, Device};

use crate::context::{PhysicalDeviceInfo, VulkanError, VulkanResult};

/// The surface reports this in both dimensions when the platform leaves the
/// extent up to the swapchain.
const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Resolve the swapchain extent from the surface capability query.
///
/// An undefined capability extent means the window decides; otherwise the
/// reported extent is taken verbatim, whatever the window currently says.
pub fn resolve_extent(caps_extent: vk::Extent2D, window_size: (u32, u32)) -> vk::Extent2D {
    if caps_extent.width == UNDEFINED_EXTENT && caps_extent.height == UNDEFINED_EXTENT {
        vk::Extent2D {
            width: window_size.0,
            height: window_size.1,
        }
    } else {
        caps_extent
    }
}

/// Pick the presentable image count: at least two, or the surface minimum.
pub fn resolve_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    caps.min_image_count.max(2)
}

/// Scan the supported formats for an exact 4x8-bit UNORM match.
///
/// BGRA is preferred (what most desktop surfaces expose), RGBA accepted.
/// No match is an explicit failure; presenting through a format the scan
/// never confirmed would hand garbage state downstream.
pub fn select_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> VulkanResult<vk::SurfaceFormatKHR> {
    for wanted in [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM] {
        if let Some(found) = formats.iter().find(|f| f.format == wanted) {
            return Ok(*found);
        }
    }
    Err(VulkanError::NoMatchingSurfaceFormat)
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain and one 2D color view per image.
    ///
    /// Present mode is fixed FIFO: vsynced, no tearing, supported everywhere.
    pub fn new(
        device: Device,
        swapchain_loader: ash::extensions::khr::Swapchain,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device: &PhysicalDeviceInfo,
        window_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device.device, surface)
                .map_err(VulkanError::Api)?
        };

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device.device, surface)
                .map_err(VulkanError::Api)?
        };
        let format = select_surface_format(&formats)?;

        let extent = resolve_extent(caps.current_extent, window_size);
        let image_count = resolve_image_count(&caps);

        log::debug!(
            "Creating swapchain: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            image_count,
            format.format
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.create_image_view(&view_info, None) }
            })
            .collect();
        let image_views = image_views.map_err(VulkanError::Api)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Negotiated surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Color image views, one per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_extent_falls_back_to_window_size() {
        let caps_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let resolved = resolve_extent(caps_extent, (640, 480));
        assert_eq!(resolved.width, 640);
        assert_eq!(resolved.height, 480);
    }

    #[test]
    fn reported_extent_wins_over_window_size() {
        let caps_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let resolved = resolve_extent(caps_extent, (640, 480));
        assert_eq!(resolved.width, 800);
        assert_eq!(resolved.height, 600);
    }

    #[test]
    fn image_count_is_at_least_two() {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.min_image_count = 1;
        assert_eq!(resolve_image_count(&caps), 2);

        caps.min_image_count = 3;
        assert_eq!(resolve_image_count(&caps), 3);
    }

    #[test]
    fn format_scan_prefers_bgra() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let selected = select_surface_format(&formats).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn format_scan_fails_without_exact_match() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert!(matches!(
            select_surface_format(&formats),
            Err(VulkanError::NoMatchingSurfaceFormat)
        ));
    }
}
