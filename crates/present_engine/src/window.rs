//! Window management using GLFW
//!
//! The engine only needs a narrow slice of the windowing system: the current
//! framebuffer size, blocking and non-blocking event polls, the close request and
//! the resize notification. That slice is the [`WindowBackend`] trait, so the
//! swapchain and frame logic can be driven by something other than a real window.

use ash::vk;
use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW found no Vulkan loader or ICD
    #[error("Vulkan is not supported on this system")]
    VulkanUnsupported,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Pending-resize flag written by event processing and read by recreation logic
///
/// There is exactly one writer (event draining) and one reader (the frame loop)
/// on the same thread, so a plain flag is enough.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSignal {
    pending: bool,
}

impl ResizeSignal {
    /// Mark the framebuffer as resized
    pub fn raise(&mut self) {
        self.pending = true;
    }

    /// Whether a resize has been raised and not yet consumed
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the flag, returning whether it was set
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// The windowing operations the presentation engine depends on
pub trait WindowBackend {
    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Process pending events without blocking
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it
    fn wait_events(&mut self);

    /// Whether a close has been requested
    fn should_close(&self) -> bool;

    /// Whether a framebuffer resize is pending
    fn resize_pending(&self) -> bool;

    /// Consume the pending resize flag, returning whether it was set
    fn take_resize(&mut self) -> bool;
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    glfw: glfw::Glfw,
    resize: ResizeSignal,
}

impl Window {
    /// Create a window sized and titled from the configuration
    pub fn from_config(config: &WindowConfig) -> WindowResult<Self> {
        Self::new(&config.title, config.width, config.height, config.resizable)
    }

    /// Create a window without an OpenGL context, ready for a Vulkan surface
    pub fn new(title: &str, width: u32, height: u32, resizable: bool) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(resizable));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::debug!("Created {}x{} window '{}'", width, height, title);

        Ok(Self {
            window,
            events,
            glfw,
            resize: ResizeSignal::default(),
        })
    }

    /// Request or cancel window closure
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Resize the window's client area
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.window.set_size(to_glfw_dimension(width), to_glfw_dimension(height));
    }

    /// Minimize the window
    pub fn iconify(&mut self) {
        self.window.iconify();
    }

    /// Restore a minimized window
    pub fn restore(&mut self) {
        self.window.restore();
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface bound to this window
    pub fn create_vulkan_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {result:?}"
            )))
        }
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                WindowEvent::FramebufferSize(width, height) => {
                    log::trace!("Framebuffer resized to {}x{}", width, height);
                    self.resize.raise();
                }
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}

impl WindowBackend for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (from_glfw_dimension(width), from_glfw_dimension(height))
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn resize_pending(&self) -> bool {
        self.resize.is_pending()
    }

    fn take_resize(&mut self) -> bool {
        self.resize.take()
    }
}

fn from_glfw_dimension(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_glfw_dimension(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_signal_consumed_once() {
        let mut signal = ResizeSignal::default();
        assert!(!signal.is_pending());
        assert!(!signal.take());

        signal.raise();
        signal.raise();
        assert!(signal.is_pending());
        assert!(signal.take());
        assert!(!signal.take());
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_negative_glfw_size_clamps_to_zero() {
        assert_eq!(from_glfw_dimension(-5), 0);
        assert_eq!(from_glfw_dimension(640), 640);
        assert_eq!(to_glfw_dimension(u32::MAX), i32::MAX);
    }
}
