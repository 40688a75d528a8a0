//! Buffers, memory type selection and the staged vertex upload
//!
//! Vertex data reaches device-local memory in two hops: the bytes are copied into a
//! host-visible staging buffer, then a one-shot transfer on the graphics queue copies
//! them into the destination. The upload waits for the queue to drain before the
//! staging buffer is released, so it suits one-time startup data only.

use ash::{vk, Device};

use super::commands::{CommandBufferRecorder, CommandPool};
use super::device::LogicalDevice;
use super::error::{VulkanError, VulkanResult};
use crate::render::vertex::Vertex;

/// First memory type allowed by `type_filter` whose flags include `required`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count as usize;
    (0u32..)
        .zip(memory_properties.memory_types.iter().take(count))
        .find(|&(index, memory_type)| {
            type_filter & (1_u32 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index)
        .ok_or(VulkanError::NoSuitableMemoryType {
            type_filter,
            required,
        })
}

/// Buffer and its dedicated memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind it to freshly allocated memory
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }
            .map_err(|e| VulkanError::BufferOrMemoryAllocationFailed(format!("Buffer: {e:?}")))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = find_memory_type(memory_properties, requirements.memory_type_bits, properties)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                unsafe { device.allocate_memory(&alloc_info, None) }.map_err(|e| {
                    VulkanError::BufferOrMemoryAllocationFailed(format!("Memory: {e:?}"))
                })
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // Constructed before binding so a bind failure frees both handles.
        let created = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe { created.device.bind_buffer_memory(buffer, memory, 0) }
            .map_err(|e| VulkanError::BufferOrMemoryAllocationFailed(format!("Bind: {e:?}")))?;

        Ok(created)
    }

    /// Copy `bytes` to the start of host-visible memory
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::BufferOrMemoryAllocationFailed(format!(
                "Write of {} bytes exceeds buffer size {}",
                bytes.len(),
                self.size
            )));
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(|e| VulkanError::BufferOrMemoryAllocationFailed(format!("Map: {e:?}")))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Device-local vertex data ready to bind
pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of vertices stored
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// Copies host data into device-local buffers through a staging buffer
pub struct ResourceUploader<'a> {
    device: &'a LogicalDevice,
    memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
    command_pool: &'a CommandPool,
}

impl<'a> ResourceUploader<'a> {
    /// Create an uploader that records into `command_pool` and submits to the graphics queue
    pub fn new(
        device: &'a LogicalDevice,
        memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
        command_pool: &'a CommandPool,
    ) -> Self {
        Self {
            device,
            memory_properties,
            command_pool,
        }
    }

    /// Upload vertices into a device-local vertex buffer
    pub fn upload_vertices(&self, vertices: &[Vertex]) -> VulkanResult<VertexBuffer> {
        let vertex_count = u32::try_from(vertices.len()).map_err(|_| {
            VulkanError::BufferOrMemoryAllocationFailed(format!(
                "{} vertices exceed the draw count limit",
                vertices.len()
            ))
        })?;

        let buffer = self.upload_bytes(
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        log::debug!("Uploaded {} vertices ({} bytes)", vertex_count, buffer.size());
        Ok(VertexBuffer {
            buffer,
            vertex_count,
        })
    }

    /// Upload raw bytes into a device-local buffer with `usage` plus transfer-destination
    pub fn upload_bytes(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        if bytes.is_empty() {
            return Err(VulkanError::BufferOrMemoryAllocationFailed(
                "Cannot upload an empty payload".to_string(),
            ));
        }
        let size = bytes.len() as vk::DeviceSize;
        let device = &self.device.device;

        let staging = Buffer::new(
            device.clone(),
            self.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;

        let destination = Buffer::new(
            device.clone(),
            self.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.copy_and_wait(&staging, &destination)?;
        Ok(destination)
    }

    fn copy_and_wait(&self, src: &Buffer, dst: &Buffer) -> VulkanResult<()> {
        let command_buffers = self.command_pool.allocate(1)?;
        let result = self.submit_copy(command_buffers[0], src, dst);
        self.command_pool.free(&command_buffers);
        result
    }

    fn submit_copy(&self, command_buffer: vk::CommandBuffer, src: &Buffer, dst: &Buffer) -> VulkanResult<()> {
        let device = &self.device.device;

        let mut recorder = CommandBufferRecorder::begin(
            device.clone(),
            command_buffer,
            vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        )?;
        recorder.copy_buffer(src.handle(), dst.handle(), src.size());
        recorder.end()?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        unsafe {
            device
                .queue_submit(self.device.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::frame("upload queue_submit"))?;
            device
                .queue_wait_idle(self.device.graphics_queue)
                .map_err(VulkanError::frame("upload queue_wait_idle"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (memory_type, &property_flags) in properties.memory_types.iter_mut().zip(flags) {
            memory_type.property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn test_memory_type_respects_filter_and_flags() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index =
            find_memory_type(&properties, 0b0110, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn test_memory_type_prefers_lowest_index() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let index =
            find_memory_type(&properties, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_memory_type_none_matches() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let result = find_memory_type(&properties, 0b0011, vk::MemoryPropertyFlags::HOST_COHERENT);
        assert!(matches!(
            result,
            Err(VulkanError::NoSuitableMemoryType {
                type_filter: 0b0011,
                ..
            })
        ));
    }

    #[test]
    fn test_memory_type_ignores_entries_past_count() {
        let mut properties = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        let result = find_memory_type(&properties, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(result.is_err());
    }
}
