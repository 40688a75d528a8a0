//! Vulkan error types
//!
//! Every variant aborts the construction step or frame that produced it. The one
//! recoverable condition, an out-of-date or suboptimal swapchain, is reported through
//! [`AcquireOutcome`](super::frame_sync::AcquireOutcome) and
//! [`PresentOutcome`](super::frame_sync::PresentOutcome) instead.

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Validation was requested but the layer is not installed
    #[error("Validation layer {layer} requested but not available")]
    ValidationUnavailable {
        /// Name of the missing layer
        layer: String,
    },

    /// The loader could not be opened or the instance could not be created
    #[error("Instance creation failed: {0}")]
    InstanceCreationFailed(String),

    /// No Vulkan-capable GPU was reported
    #[error("Failed to find GPUs with Vulkan support")]
    DeviceEnumerationEmpty,

    /// GPUs exist, but none meets the queue, extension and surface requirements
    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    /// Querying GPUs or their properties failed
    #[error("Device query '{query}' failed: {result:?}")]
    DeviceQueryFailed {
        /// Which query failed
        query: &'static str,
        /// Result code reported by the driver
        result: vk::Result,
    },

    /// A device lacks required device-level extensions
    #[error("Device {device} is missing extensions: {missing:?}")]
    DeviceExtensionMissing {
        /// Device name
        device: String,
        /// Names of the unsupported extensions
        missing: Vec<String>,
    },

    /// The logical device could not be created
    #[error("Logical device creation failed: {0:?}")]
    DeviceCreationFailed(vk::Result),

    /// The window surface could not be created or queried
    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// The swapchain could not be created or its images queried
    #[error("Swapchain creation failed: {0:?}")]
    SwapchainCreationFailed(vk::Result),

    /// The live swapchain or something recorded against it is missing
    #[error("Swapchain resources unavailable: {0}")]
    SwapchainUnavailable(&'static str),

    /// An image view could not be created
    #[error("Image view creation failed: {0:?}")]
    ImageViewCreationFailed(vk::Result),

    /// The render pass could not be created
    #[error("Render pass creation failed: {0:?}")]
    RenderPassCreationFailed(vk::Result),

    /// Shader loading, pipeline layout or graphics pipeline creation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// A framebuffer could not be created
    #[error("Framebuffer creation failed: {0:?}")]
    FramebufferCreationFailed(vk::Result),

    /// Command pool creation, buffer allocation or recording failed
    #[error("Command pool or buffer operation failed: {0:?}")]
    CommandPoolOrBufferFailed(vk::Result),

    /// Buffer creation, memory allocation, binding or mapping failed
    #[error("Buffer or memory allocation failed: {0}")]
    BufferOrMemoryAllocationFailed(String),

    /// No memory type satisfies both the type filter and the property flags
    #[error("No suitable memory type (filter {type_filter:#b}, required {required:?})")]
    NoSuitableMemoryType {
        /// Bitmask of acceptable memory type indices
        type_filter: u32,
        /// Property flags the memory type must carry
        required: vk::MemoryPropertyFlags,
    },

    /// A semaphore or fence could not be created
    #[error("Synchronization object creation failed: {0:?}")]
    SyncObjectCreationFailed(vk::Result),

    /// A per-frame call (wait, acquire, submit, present, idle) failed fatally
    #[error("Frame operation '{operation}' failed: {result:?}")]
    FrameOperationFailed {
        /// Which call failed
        operation: &'static str,
        /// Result code reported by the driver
        result: vk::Result,
    },
}

impl VulkanError {
    /// Build a mapper for `map_err` on a per-frame call
    pub fn frame(operation: &'static str) -> impl Fn(vk::Result) -> Self {
        move |result| Self::FrameOperationFailed { operation, result }
    }

    /// Build a mapper for `map_err` on a physical-device query
    pub fn device_query(query: &'static str) -> impl Fn(vk::Result) -> Self {
        move |result| Self::DeviceQueryFailed { query, result }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_names_operation() {
        let error = VulkanError::frame("queue_submit")(vk::Result::ERROR_DEVICE_LOST);
        let message = error.to_string();
        assert!(message.contains("queue_submit"));
        assert!(message.contains("ERROR_DEVICE_LOST"));
    }

    #[test]
    fn test_device_query_error_is_not_an_instance_error() {
        let error = VulkanError::device_query("enumerate_physical_devices")(
            vk::Result::ERROR_INITIALIZATION_FAILED,
        );
        assert!(matches!(
            error,
            VulkanError::DeviceQueryFailed {
                query: "enumerate_physical_devices",
                result: vk::Result::ERROR_INITIALIZATION_FAILED,
            }
        ));
        assert!(!error.to_string().contains("Instance"));
    }

    #[test]
    fn test_memory_type_error_shows_filter_in_binary() {
        let error = VulkanError::NoSuitableMemoryType {
            type_filter: 0b0110,
            required: vk::MemoryPropertyFlags::HOST_VISIBLE,
        };
        assert!(error.to_string().contains("0b110"));
    }
}
