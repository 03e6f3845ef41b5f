//! Vulkan context management
//!
//! Instance, physical device selection, logical device, and the surface
//! binding that ties them to a windowing collaborator. Objects here form the
//! root of the ownership tree: everything else in the crate is created from
//! and destroyed before the context.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::window::WindowSource;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device exposes a graphics-capable queue family
    #[error("No graphics queue family found")]
    NoGraphicsQueueFamily,

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The surface supports none of the formats the renderer can present in
    #[error("No matching surface format (wanted a 4x8-bit UNORM format)")]
    NoMatchingSurfaceFormat,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
///
/// In debug builds a `DebugUtils` messenger is attached that forwards
/// validation messages into the `log` facade. The messenger is an optional
/// component with its own setup/teardown pair, destroyed before the instance.
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create the instance with the surface extensions the window requires
    pub fn new(window: &dyn WindowSource, app_name: &str) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InvalidOperation { reason: "app name contains NUL".to_string() })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_1);

        let surface_extensions =
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .map_err(VulkanError::Api)?;

        #[allow(unused_mut)] // extended with the debug extension in debug builds
        let mut extensions: Vec<*const i8> = surface_extensions.to_vec();
        #[cfg(debug_assertions)]
        extensions.push(DebugUtils::name().as_ptr());

        let layer_names = if cfg!(debug_assertions) {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(messenger))
        };

        log::info!("Vulkan instance created for '{app_name}'");

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected physical device and its cached capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Memory type table, cached for allocation decisions
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDeviceInfo {
    /// Select the physical device and its graphics queue family.
    ///
    /// Takes the first enumerated device with no scoring; multi-GPU
    /// machines get whatever the driver lists first. The selection is
    /// logged so surprises are at least visible.
    pub fn select(instance: &Instance) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let device = *devices.first().ok_or_else(|| {
            VulkanError::InitializationFailed("No physical devices found".to_string())
        })?;

        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let graphics_family = queue_families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|index| index as u32)
            .ok_or(VulkanError::NoGraphicsQueueFamily)?;

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(device) };

        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
        });

        Ok(Self {
            device,
            properties,
            graphics_family,
            memory_properties,
        })
    }
}

/// Logical device wrapper with RAII cleanup
///
/// Owns the single graphics-capable queue all GPU work is submitted through.
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// The one submission queue
    pub graphics_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device and retrieve the submission queue
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let queue_priorities = [1.0];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(physical_device.graphics_family)
            .queue_priorities(&queue_priorities)
            .build();
        let queue_infos = [queue_info];

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical_device.graphics_family, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            graphics_family: physical_device.graphics_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Root of the Vulkan object tree: instance, surface, devices.
///
/// Field declaration order matters: Rust drops fields top to bottom, so the
/// surface loader and handles declared first are released before the device,
/// and the instance last of all.
pub struct VulkanContext {
    /// Vulkan surface bound to the window
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Logical device and submission queue
    pub device: LogicalDevice,
    /// Vulkan instance and debug messenger
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Create the full context against a windowing collaborator
    pub fn new(window: &dyn WindowSource, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
            .map_err(VulkanError::Api)?
        };

        // Until Self is assembled the Drop impl below cannot run, so any
        // failure from here on destroys the surface by hand.
        let build = || -> VulkanResult<(PhysicalDeviceInfo, LogicalDevice)> {
            let physical_device = PhysicalDeviceInfo::select(&instance.instance)?;

            let present_supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(
                        physical_device.device,
                        physical_device.graphics_family,
                        surface,
                    )
                    .map_err(VulkanError::Api)?
            };
            if !present_supported {
                return Err(VulkanError::InitializationFailed(
                    "Graphics queue family cannot present to the surface".to_string(),
                ));
            }

            let device = LogicalDevice::new(&instance.instance, &physical_device)?;
            Ok((physical_device, device))
        };

        let (physical_device, device) = match build() {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// Raw `ash` device handle, cloned for resource constructors
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// The single graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Graphics queue family index
    pub fn graphics_family(&self) -> u32 {
        self.physical_device.graphics_family
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: device before instance.
    }
}
