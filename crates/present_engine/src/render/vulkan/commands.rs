//! Command pool and command buffer recording
//!
//! [`CommandBufferRecorder`] wraps one command buffer between begin and end, and
//! [`ActiveRenderPass`] ends its render pass when dropped.

use ash::{vk, Device};

use super::error::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a command pool for the given queue family
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder().queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&create_info, None) }
            .map_err(VulkanError::CommandPoolOrBufferFailed)?;

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::CommandPoolOrBufferFailed)
    }

    /// Return command buffers to the pool
    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// A command buffer in the recording state
pub struct CommandBufferRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
}

impl CommandBufferRecorder {
    /// Begin recording into `command_buffer` with the given usage flags
    pub fn begin(
        device: Device,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VulkanResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(VulkanError::CommandPoolOrBufferFailed)?;

        Ok(Self {
            device,
            command_buffer,
        })
    }

    /// Begin an inline render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_> {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }

        ActiveRenderPass { recorder: self }
    }

    /// Record a buffer-to-buffer copy
    pub fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
    }

    /// Finish recording and hand back the command buffer
    pub fn end(self) -> VulkanResult<vk::CommandBuffer> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }
            .map_err(VulkanError::CommandPoolOrBufferFailed)?;
        Ok(self.command_buffer)
    }
}

/// Render pass scope; ends the pass on drop
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandBufferRecorder,
}

impl ActiveRenderPass<'_> {
    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind one vertex buffer at binding 0, offset 0
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(
                self.recorder.command_buffer,
                0,
                &[buffer],
                &[0],
            );
        }
    }

    /// Non-indexed draw of `vertex_count` vertices, one instance
    pub fn draw(&mut self, vertex_count: u32) {
        unsafe {
            self.recorder
                .device
                .cmd_draw(self.recorder.command_buffer, vertex_count, 1, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
