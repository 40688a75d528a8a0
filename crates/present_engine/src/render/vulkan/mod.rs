//! Vulkan presentation backend
//!
//! Low-level wrappers own one Vulkan object each and destroy it on drop. The
//! swapchain bundle, command recorder and frame synchronizer are built on top.

pub mod buffer;
pub mod command_recorder;
pub mod commands;
pub mod device;
pub mod error;
pub mod frame_sync;
pub mod framebuffer;
pub mod instance;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;
pub mod swapchain_manager;
pub mod sync;

pub use buffer::{find_memory_type, Buffer, ResourceUploader, VertexBuffer};
pub use command_recorder::CommandRecorder;
pub use commands::{ActiveRenderPass, CommandBufferRecorder, CommandPool};
pub use device::{LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices};
pub use error::{VulkanError, VulkanResult};
pub use frame_sync::{
    drive_frame, AcquireOutcome, FrameCursor, FrameOutcome, FrameSynchronizer, FrameTarget,
    PresentOutcome,
};
pub use framebuffer::Framebuffer;
pub use instance::{validation_error_count, Surface, VulkanInstance};
pub use pipeline::{GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use swapchain::Swapchain;
pub use swapchain_manager::{SurfaceContext, SwapchainBundle, SwapchainManager, SwapchainState};
pub use sync::{Fence, FrameSlot, Semaphore};
