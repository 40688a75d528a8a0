//! Physical device selection and logical device creation
//!
//! Selection is deliberately unranked: the first device in enumeration order that
//! has a graphics queue family, a present queue family, the swapchain extension and
//! at least one surface format and present mode wins.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};
use std::collections::BTreeSet;
use std::ffi::CStr;
use thiserror::Error;

use super::error::{VulkanError, VulkanResult};
use super::instance::Surface;

/// Device-level extensions every candidate must support
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [SwapchainLoader::name()]
}

/// Graphics and present queue family indices discovered on one device
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family with a nonzero queue count and the graphics bit
    pub graphics: Option<u32>,
    /// First family able to present to the surface
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan queue families once, stopping as soon as both indices are known
    ///
    /// `supports_present` is asked about each index until a present family is found.
    pub fn discover<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VulkanResult<Self>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if indices.graphics.is_none()
                && family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(index);
            }

            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Whether both families were found
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices, when complete
    pub fn resolved(&self) -> Option<(u32, u32)> {
        self.graphics.zip(self.present)
    }
}

/// Names in `required` that do not appear in `available`
pub fn missing_extensions(available: &[&CStr], required: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Why a candidate device was passed over
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceRejection {
    /// No graphics or no present queue family
    #[error("missing queue families (graphics: {graphics:?}, present: {present:?})")]
    MissingQueueFamilies {
        /// Graphics family, if found
        graphics: Option<u32>,
        /// Present family, if found
        present: Option<u32>,
    },

    /// Required extensions are unsupported
    #[error("missing extensions {0:?}")]
    MissingExtensions(Vec<String>),

    /// The surface reports no formats or no present modes for this device
    #[error("surface reports {formats} formats and {present_modes} present modes")]
    InadequateSurface {
        /// Number of surface formats reported
        formats: usize,
        /// Number of present modes reported
        present_modes: usize,
    },
}

/// Error to report once every candidate has been rejected
pub fn selection_failure(rejections: Vec<(String, DeviceRejection)>) -> VulkanError {
    let all_missing_extensions = !rejections.is_empty()
        && rejections
            .iter()
            .all(|(_, rejection)| matches!(rejection, DeviceRejection::MissingExtensions(_)));

    if all_missing_extensions {
        if let Some((device, DeviceRejection::MissingExtensions(missing))) = rejections.into_iter().next() {
            return VulkanError::DeviceExtensionMissing { device, missing };
        }
    }

    VulkanError::NoSuitableDevice
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Human-readable device name
    pub name: String,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, used for buffer allocation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first suitable physical device for rendering to `surface`
    pub fn select(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(VulkanError::device_query("enumerate_physical_devices"))?;

        if devices.is_empty() {
            return Err(VulkanError::DeviceEnumerationEmpty);
        }

        let mut rejections = Vec::new();
        for device in devices {
            match Self::evaluate(instance, device, surface)? {
                Ok(info) => {
                    log::info!("Selected GPU: {}", info.name);
                    return Ok(info);
                }
                Err((name, rejection)) => {
                    log::debug!("Rejected GPU {}: {}", name, rejection);
                    rejections.push((name, rejection));
                }
            }
        }

        Err(selection_failure(rejections))
    }

    fn evaluate(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> VulkanResult<Result<Self, (String, DeviceRejection)>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let indices = QueueFamilyIndices::discover(&families, |index| {
            surface.supports_present(device, index)
        })?;
        let Some((graphics_family, present_family)) = indices.resolved() else {
            return Ok(Err((
                name,
                DeviceRejection::MissingQueueFamilies {
                    graphics: indices.graphics,
                    present: indices.present,
                },
            )));
        };

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::device_query("enumerate_device_extension_properties"))?;
        let available: Vec<&CStr> = extensions
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();
        let missing = missing_extensions(&available, &required_device_extensions());
        if !missing.is_empty() {
            return Ok(Err((name, DeviceRejection::MissingExtensions(missing))));
        }

        let formats = surface.formats(device)?.len();
        let present_modes = surface.present_modes(device)?.len();
        if formats == 0 || present_modes == 0 {
            return Ok(Err((
                name,
                DeviceRejection::InadequateSurface {
                    formats,
                    present_modes,
                },
            )));
        }

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Ok(Self {
            device,
            name,
            properties,
            memory_properties,
            graphics_family,
            present_family,
        }))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: BTreeSet<u32> = [physical.graphics_family, physical.present_family]
            .into_iter()
            .collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_ptrs: Vec<_> = required_device_extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(VulkanError::DeviceCreationFailed)?;

        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Created logical device (graphics family {}, present family {})",
            physical.graphics_family,
            physical.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical.graphics_family,
            present_family: physical.present_family,
            swapchain_loader,
        })
    }

    /// Block until every queue on the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::frame("device_wait_idle"))
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
