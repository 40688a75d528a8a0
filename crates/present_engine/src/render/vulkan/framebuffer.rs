//! Framebuffer management

use ash::{vk, Device};

use super::error::{VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer binding `attachments` to `render_pass`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }
            .map_err(VulkanError::FramebufferCreationFailed)?;

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// One framebuffer per image view, in image order
    ///
    /// If any creation fails, the ones already built are dropped before returning.
    pub fn for_each_view(
        device: &Device,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<Self>> {
        image_views
            .iter()
            .map(|&view| Self::new(device.clone(), render_pass, &[view], extent))
            .collect()
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
