//! Vulkan instance and window surface
//!
//! [`VulkanInstance`] is created first and destroyed last. It optionally enables the
//! Khronos validation layer and routes its messages into the `log` facade.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use ash::{vk, Entry, Instance};
use std::ffi::{c_char, CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::{VulkanError, VulkanResult};
use crate::window::Window;

/// Name of the validation layer requested when validation is enabled
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

const ENGINE_NAME: &CStr = c"present_engine";

static VALIDATION_ERRORS: AtomicUsize = AtomicUsize::new(0);

/// Number of error-severity validation messages reported so far in this process
pub fn validation_error_count() -> usize {
    VALIDATION_ERRORS.load(Ordering::Relaxed)
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance with the extensions GLFW needs for presentation
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InstanceCreationFailed(format!("Failed to load Vulkan: {e}"))
        })?;

        if enable_validation {
            check_validation_layer(&entry)?;
        }

        log_instance_extensions(&entry);

        let app_name = CString::new(app_name).map_err(|e| {
            VulkanError::InstanceCreationFailed(format!("Invalid application name: {e}"))
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InstanceCreationFailed(e.to_string()))?;
        let mut extension_names = required_extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InstanceCreationFailed(e.to_string()))?;
        if enable_validation {
            extension_names.push(DebugUtils::name().to_owned());
        }
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        let layer_ptrs: Vec<*const c_char> = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| VulkanError::InstanceCreationFailed(format!("{e:?}")))?;

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!(
            "Created Vulkan instance (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance function table
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn check_validation_layer(entry: &Entry) -> VulkanResult<()> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(|e| VulkanError::InstanceCreationFailed(format!("{e:?}")))?;

    let found = layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);

    if found {
        Ok(())
    } else {
        Err(VulkanError::ValidationUnavailable {
            layer: VALIDATION_LAYER.to_string_lossy().into_owned(),
        })
    }
}

fn log_instance_extensions(entry: &Entry) {
    match entry.enumerate_instance_extension_properties(None) {
        Ok(extensions) => {
            log::debug!("Available instance extensions:");
            for extension in &extensions {
                let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                log::debug!("\t{}", name.to_string_lossy());
            }
        }
        Err(e) => log::warn!("Could not enumerate instance extensions: {:?}", e),
    }
}

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

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .map_err(|e| VulkanError::InstanceCreationFailed(format!("Debug messenger: {e:?}")))
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        VALIDATION_ERRORS.fetch_add(1, Ordering::Relaxed);
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentable surface bound to the native window
///
/// Owned alongside the instance and destroyed before it.
pub struct Surface {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for the window through GLFW
    pub fn new(instance: &VulkanInstance, window: &mut Window) -> VulkanResult<Self> {
        let loader = khr::Surface::new(instance.entry(), instance.instance());
        let surface = window
            .create_vulkan_surface(instance.instance().handle())
            .map_err(|e| VulkanError::SurfaceCreationFailed(e.to_string()))?;

        log::debug!("Created window surface");
        Ok(Self { loader, surface })
    }

    /// Raw surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn loader(&self) -> &khr::Surface {
        &self.loader
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .map_err(|e| VulkanError::SurfaceCreationFailed(format!("Capabilities query: {e:?}")))
    }

    /// Get surface formats for a physical device
    pub fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.surface)
        }
        .map_err(|e| VulkanError::SurfaceCreationFailed(format!("Format query: {e:?}")))
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }
        .map_err(|e| VulkanError::SurfaceCreationFailed(format!("Present mode query: {e:?}")))
    }

    /// Whether the queue family at `family_index` can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family_index, self.surface)
        }
        .map_err(|e| VulkanError::SurfaceCreationFailed(format!("Present support query: {e:?}")))
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
