//! Semaphores, fences and the per-frame slot that groups them

use ash::{vk, Device};

use super::error::{VulkanError, VulkanResult};

/// Binary semaphore wrapper with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(VulkanError::SyncObjectCreationFailed)?;

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
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

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe { device.create_fence(&create_info, None) }
            .map_err(VulkanError::SyncObjectCreationFailed)?;

        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, u64::MAX) }
            .map_err(VulkanError::frame("wait_for_fences"))
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }
            .map_err(VulkanError::frame("reset_fences"))
    }

    /// Get the fence handle
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

/// Synchronization objects owned by one frame in flight
pub struct FrameSlot {
    /// Signaled when the acquired image is ready to be rendered into
    pub image_acquired: Semaphore,
    /// Signaled when rendering finished and the image can be presented
    pub render_finished: Semaphore,
    /// Signaled when the slot's submitted commands completed
    pub commands_complete: Fence,
}

impl FrameSlot {
    /// Create the slot with its fence signaled so the first wait returns at once
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_acquired: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            commands_complete: Fence::new(device.clone(), true)?,
        })
    }
}
