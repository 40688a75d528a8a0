//! Vertex layout for the colored 2D primitive

use ash::vk;
use nalgebra::{Vector2, Vector3};
use std::mem::{offset_of, size_of};

/// A 2D position with an RGB color, laid out for binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in clip space
    pub position: [f32; 2],
    /// Linear RGB color
    pub color: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex from a position and a color
    pub fn new(position: Vector2<f32>, color: Vector3<f32>) -> Self {
        Self {
            position: [position.x, position.y],
            color: [color.x, color.y, color.z],
        }
    }

    /// Per-vertex binding at slot 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position at location 0, color at location 1
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Self, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Self, color) as u32,
            },
        ]
    }
}
