//! Rendering: vertex layout and the Vulkan presentation backend

pub mod vertex;
pub mod vulkan;

pub use vertex::Vertex;
