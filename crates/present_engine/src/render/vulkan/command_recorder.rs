//! Pre-recorded command buffers, one per swapchain image
//!
//! Each buffer clears its image, binds the pipeline and vertex buffer and draws the
//! whole vertex list. The set goes stale whenever the swapchain bundle is rebuilt
//! and must be freed and recorded again.

use ash::{vk, Device};

use super::buffer::VertexBuffer;
use super::commands::{CommandBufferRecorder, CommandPool};
use super::device::LogicalDevice;
use super::error::VulkanResult;
use super::swapchain_manager::SwapchainBundle;

/// Owns the graphics command pool and the per-image command buffers
pub struct CommandRecorder {
    device: Device,
    command_buffers: Vec<vk::CommandBuffer>,
    clear_color: [f32; 4],
    pool: CommandPool,
}

impl CommandRecorder {
    /// Create the command pool on the graphics queue family
    pub fn new(device: &LogicalDevice, clear_color: [f32; 4]) -> VulkanResult<Self> {
        let pool = CommandPool::new(device.device.clone(), device.graphics_family)?;
        Ok(Self {
            device: device.device.clone(),
            command_buffers: Vec::new(),
            clear_color,
            pool,
        })
    }

    /// Pool the recorder allocates from, shared with one-shot uploads
    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    /// Allocate and record one command buffer per framebuffer in `bundle`
    ///
    /// Any previously recorded set is freed first.
    pub fn record_all(
        &mut self,
        bundle: &SwapchainBundle,
        vertex_buffer: Option<&VertexBuffer>,
    ) -> VulkanResult<()> {
        self.free_all();

        let count = bundle.framebuffers().len() as u32;
        self.command_buffers = self.pool.allocate(count)?;

        let extent = bundle.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];
        let vertex_count = vertex_buffer.map_or(0, VertexBuffer::vertex_count);

        for (&command_buffer, framebuffer) in self.command_buffers.iter().zip(bundle.framebuffers()) {
            let mut recorder = CommandBufferRecorder::begin(
                self.device.clone(),
                command_buffer,
                vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
            )?;
            {
                let mut pass = recorder.begin_render_pass(
                    bundle.render_pass(),
                    framebuffer.handle(),
                    render_area,
                    &clear_values,
                );
                pass.bind_pipeline(bundle.pipeline());
                if let Some(vertex_buffer) = vertex_buffer {
                    pass.bind_vertex_buffer(vertex_buffer.handle());
                }
                pass.draw(vertex_count);
            }
            recorder.end()?;
        }

        log::debug!(
            "Recorded {} command buffers ({} vertices each)",
            self.command_buffers.len(),
            vertex_count
        );
        Ok(())
    }

    /// Return every recorded buffer to the pool
    pub fn free_all(&mut self) {
        self.pool.free(&self.command_buffers);
        self.command_buffers.clear();
    }

    /// The buffer recorded for swapchain image `image_index`
    pub fn command_buffer(&self, image_index: u32) -> Option<vk::CommandBuffer> {
        self.command_buffers.get(image_index as usize).copied()
    }

    /// Number of recorded buffers
    pub fn len(&self) -> usize {
        self.command_buffers.len()
    }

    /// Whether no buffers are recorded
    pub fn is_empty(&self) -> bool {
        self.command_buffers.is_empty()
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        self.free_all();
    }
}
