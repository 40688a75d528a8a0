//! Vulkan swapchain management
//!
//! The `choose_*` functions are pure so they can be checked without a GPU; the
//! [`Swapchain`] wrapper applies them to live surface queries and owns the image
//! views derived from the swapchain images.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::device::{LogicalDevice, PhysicalDeviceInfo};
use super::error::{VulkanError, VulkanResult};
use super::instance::Surface;

/// Surface format used when the surface leaves the choice open
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the surface format
///
/// A lone `UNDEFINED` entry means any format is acceptable, so the preferred format
/// is used. Otherwise the preferred format wins wherever it appears, falling back to
/// the first entry.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    match available {
        [only] if only.format == vk::Format::UNDEFINED => PREFERRED_SURFACE_FORMAT,
        _ => available
            .iter()
            .find(|candidate| {
                candidate.format == PREFERRED_SURFACE_FORMAT.format
                    && candidate.color_space == PREFERRED_SURFACE_FORMAT.color_space
            })
            .or_else(|| available.first())
            .copied()
            .unwrap_or(PREFERRED_SURFACE_FORMAT),
    }
}

/// Pick the present mode: mailbox, then immediate, then FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut best = vk::PresentModeKHR::FIFO;
    for &mode in available {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        } else if mode == vk::PresentModeKHR::IMMEDIATE {
            best = mode;
        }
    }
    best
}

/// Pick the swapchain extent
///
/// A current extent of `u32::MAX` means the surface size follows the swapchain, so
/// the framebuffer size is clamped into the supported range instead.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum image count, bounded by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Sharing mode and the queue families that access swapchain images
pub fn choose_sharing_mode(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    }
}

/// Swapchain wrapper with RAII cleanup of the swapchain and its image views
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the surface at the given framebuffer size
    pub fn new(
        device: &LogicalDevice,
        physical: &PhysicalDeviceInfo,
        surface: &Surface,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let capabilities = surface.capabilities(physical.device)?;
        let format = choose_surface_format(&surface.formats(physical.device)?);
        let present_mode = choose_present_mode(&surface.present_modes(physical.device)?);
        let extent = choose_extent(&capabilities, framebuffer_size);
        let image_count = choose_image_count(&capabilities);
        let (sharing_mode, family_indices) =
            choose_sharing_mode(device.graphics_family, device.present_family);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = device.swapchain_loader.clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(VulkanError::SwapchainCreationFailed)?;

        // From here on, dropping `partial` releases whatever has been created.
        let mut partial = Self {
            device: device.device.clone(),
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            present_mode,
            extent,
        };

        partial.images = unsafe { partial.loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::SwapchainCreationFailed)?;

        for &image in &partial.images {
            let view = create_image_view(&partial.device, image, format.format)?;
            partial.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {} images, {:?}/{:?}, {:?}, {}x{}",
            partial.images.len(),
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height
        );

        Ok(partial)
    }

    /// Raw swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain extension loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.loader
    }

    /// Presentable images, owned by the presentation engine
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One color view per image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Selected surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Selected present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in self.image_views.iter().rev() {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_image_view(device: &Device, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
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

    unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::ImageViewCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn assert_format_eq(actual: vk::SurfaceFormatKHR, expected: vk::SurfaceFormatKHR) {
        assert_eq!(actual.format, expected.format);
        assert_eq!(actual.color_space, expected.color_space);
    }

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_format_preferred_alone() {
        let chosen = choose_surface_format(&[PREFERRED_SURFACE_FORMAT]);
        assert_format_eq(chosen, PREFERRED_SURFACE_FORMAT);
    }

    #[test]
    fn test_format_undefined_singleton_uses_default() {
        let chosen = choose_surface_format(&[surface_format(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )]);
        assert_format_eq(chosen, PREFERRED_SURFACE_FORMAT);
    }

    #[test]
    fn test_format_preferred_found_second() {
        let chosen = choose_surface_format(&[
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            PREFERRED_SURFACE_FORMAT,
        ]);
        assert_format_eq(chosen, PREFERRED_SURFACE_FORMAT);
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let first = surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let chosen = choose_surface_format(&[
            first,
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ]);
        assert_format_eq(chosen, first);
    }

    #[test]
    fn test_present_mode_preference() {
        use vk::PresentModeKHR as Mode;

        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::MAILBOX]), Mode::MAILBOX);
        assert_eq!(choose_present_mode(&[Mode::FIFO]), Mode::FIFO);
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE]), Mode::IMMEDIATE);
        assert_eq!(
            choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE, Mode::MAILBOX]),
            Mode::MAILBOX
        );
        assert_eq!(choose_present_mode(&[]), Mode::FIFO);
    }

    #[test]
    fn test_extent_clamped_when_surface_defers() {
        let caps = capabilities((u32::MAX, u32::MAX), (1, 1), (800, 600));
        let extent = choose_extent(&caps, (1000, 10));
        assert_eq!((extent.width, extent.height), (800, 10));
    }

    #[test]
    fn test_extent_uses_current_when_reported() {
        let caps = capabilities((640, 480), (1, 1), (4096, 4096));
        let extent = choose_extent(&caps, (1000, 10));
        assert_eq!((extent.width, extent.height), (640, 480));
    }

    #[test]
    fn test_image_count() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_sharing_mode() {
        let (mode, families) = choose_sharing_mode(0, 0);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());

        let (mode, families) = choose_sharing_mode(0, 2);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 2]);
    }
}
