//! # Present Engine
//!
//! Vulkan presentation and frame synchronization for a single window: device
//! selection, swapchain lifecycle with resize-triggered recreation, per-image
//! command buffers, double-buffered frame pacing and staged vertex upload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use present_engine::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     let config = EngineConfig::new("Triangle");
//!     let vertices = [
//!         Vertex::new(Vector2::new(0.0, -0.5), Vector3::new(1.0, 0.0, 0.0)),
//!         Vertex::new(Vector2::new(0.5, 0.5), Vector3::new(0.0, 1.0, 0.0)),
//!         Vertex::new(Vector2::new(-0.5, 0.5), Vector3::new(0.0, 0.0, 1.0)),
//!     ];
//!     Application::new(&config, &vertices)?.run()
//! }
//! ```

pub mod application;
pub mod config;
pub mod logging;
pub mod render;
pub mod window;

/// Commonly used types
pub mod prelude {
    pub use crate::application::{AppError, Application};
    pub use crate::config::{Config, ConfigError, EngineConfig, RendererConfig, ShaderConfig, WindowConfig};
    pub use crate::render::vulkan::{VulkanError, VulkanResult};
    pub use crate::render::Vertex;
    pub use crate::window::{Window, WindowBackend, WindowError};
    pub use nalgebra::{Vector2, Vector3};
}
