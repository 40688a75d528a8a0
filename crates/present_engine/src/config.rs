//! # Engine Configuration
//!
//! Configuration for the window, the Vulkan renderer and logging, plus the
//! [`Config`] trait used to load and save any of them from TOML or RON files.
//!
//! ## Configuration Categories
//!
//! - **Window Config**: Title and initial framebuffer size
//! - **Renderer Config**: Application metadata, frames in flight, validation, shaders
//! - **Engine Config**: Top-level structure that applications load

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file name extension
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Shader Configuration
///
/// Locations of the two precompiled SPIR-V binaries consumed at pipeline creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Check that both shader binaries exist on disk
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("Shader not found: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("shaders/vert.spv", "shaders/frag.spv")
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl WindowConfig {
    /// Create a window configuration with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            resizable: true,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("Vulkan window", 800, 600)
    }
}

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan backend: application metadata,
/// frame pacing and debug features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (`None` follows the build type)
    pub enable_validation: Option<bool>,
    /// Color the render pass clears each image to
    pub clear_color: [f32; 4],
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            max_frames_in_flight: 2,
            enable_validation: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
        }
    }

    /// Set maximum frames in flight
    #[must_use]
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set custom shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the clear color
    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "Max frames in flight must be at least 1".to_string(),
            ));
        }

        if self.max_frames_in_flight > 8 {
            return Err(ConfigError::Invalid(
                "Max frames in flight should not exceed 8".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Application")
    }
}

/// # Complete Engine Configuration
///
/// Top-level configuration that applications load from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Window configuration
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Create a configuration with defaults and the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Set log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set window configuration
    #[must_use]
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Set renderer configuration
    #[must_use]
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.title.is_empty() {
            return Err(ConfigError::Invalid("Window title cannot be empty".to_string()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window size must be nonzero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("Application")
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.renderer.max_frames_in_flight, 2);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.renderer.shaders.vertex_shader_path, "shaders/vert.spv");
        assert_eq!(config.renderer.shaders.fragment_shader_path, "shaders/frag.spv");
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        let zero = RendererConfig::default().with_max_frames_in_flight(0);
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));

        let too_many = RendererConfig::default().with_max_frames_in_flight(9);
        assert!(matches!(too_many.validate(), Err(ConfigError::Invalid(_))));

        let three = RendererConfig::default().with_max_frames_in_flight(3);
        assert!(three.validate().is_ok());
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let config = EngineConfig::default().with_window(WindowConfig::new("w", 0, 600));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let text = r#"
            log_level = "debug"

            [renderer]
            max_frames_in_flight = 3
            enable_validation = false
        "#;

        let config = EngineConfig::from_str_with_format(text, "present.toml").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert_eq!(config.renderer.enable_validation, Some(false));
        assert!(!config.renderer.validation_enabled());
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_ron_parsing() {
        let text = r#"(window: (title: "ron window", width: 1024, height: 768))"#;
        let config = EngineConfig::from_str_with_format(text, "present.ron").unwrap();
        assert_eq!(config.window.title, "ron window");
        assert_eq!(config.window.width, 1024);
        assert!(config.window.resizable);
    }

    #[test]
    fn test_saved_toml_loads_back() {
        let config = EngineConfig::new("saved")
            .with_log_level("warn")
            .with_renderer(
                RendererConfig::new("saved")
                    .with_clear_color([0.25, 0.5, 0.75, 1.0])
                    .with_validation(false),
            );
        let path = std::env::temp_dir().join(format!("present_engine_{}.toml", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let loaded = loaded.unwrap();
        assert_eq!(loaded.log_level, "warn");
        assert_eq!(loaded.renderer.clear_color, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_rejects_unknown_extension() {
        let result = EngineConfig::default().save_to_file("present.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::from_str_with_format("", "present.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_shader_is_reported() {
        let shaders = ShaderConfig::new("does/not/exist.spv", "nor/this.spv");
        assert!(matches!(shaders.validate(), Err(ConfigError::Invalid(_))));
    }
}
