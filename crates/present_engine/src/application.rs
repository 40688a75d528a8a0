//! Application orchestrator
//!
//! Builds the window and every Vulkan object in dependency order, runs the
//! poll/draw loop until the window closes, and tears everything down in reverse.

use ash::vk;
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::render::vertex::Vertex;
use crate::render::vulkan::{
    CommandRecorder, FrameOutcome, FrameSynchronizer, LogicalDevice, PhysicalDeviceInfo,
    ResourceUploader, Surface, SurfaceContext, SwapchainManager, SwapchainState, VertexBuffer,
    VulkanError, VulkanInstance,
};
use crate::window::{Window, WindowBackend, WindowError};

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Window plus the complete presentation engine
///
/// Dropping waits for the device to go idle first, including when the loop ended
/// on an error. Fields then drop top to bottom: per-frame objects first, the device
/// after every device-owned resource, the surface and instance after the device,
/// and the window last.
pub struct Application {
    frame_sync: FrameSynchronizer,
    command_recorder: CommandRecorder,
    vertex_buffer: Option<VertexBuffer>,
    swapchains: SwapchainManager,
    device: LogicalDevice,
    physical: PhysicalDeviceInfo,
    surface: Surface,
    instance: VulkanInstance,
    window: Window,
}

impl Application {
    /// Build everything needed to draw `vertices`
    ///
    /// An empty vertex list skips the upload; the recorded draws then use zero vertices.
    pub fn new(config: &EngineConfig, vertices: &[Vertex]) -> Result<Self, AppError> {
        config.validate()?;
        config.renderer.shaders.validate()?;

        let mut window = Window::from_config(&config.window)?;
        let instance = VulkanInstance::new(
            &window,
            &config.renderer.application_name,
            config.renderer.validation_enabled(),
        )?;
        let surface = Surface::new(&instance, &mut window)?;
        let physical = PhysicalDeviceInfo::select(instance.instance(), &surface)?;
        let device = LogicalDevice::new(instance.instance(), &physical)?;

        let ctx = SurfaceContext {
            device: &device,
            physical: &physical,
            surface: &surface,
        };
        let swapchains = SwapchainManager::new(ctx, &mut window, config.renderer.shaders.clone())?;
        let mut command_recorder = CommandRecorder::new(&device, config.renderer.clear_color)?;

        let vertex_buffer = if vertices.is_empty() {
            log::warn!("No vertices supplied, skipping vertex upload");
            None
        } else {
            let uploader =
                ResourceUploader::new(&device, &physical.memory_properties, command_recorder.pool());
            Some(uploader.upload_vertices(vertices)?)
        };

        command_recorder.record_all(swapchains.bundle()?, vertex_buffer.as_ref())?;
        let frame_sync = FrameSynchronizer::new(&device, config.renderer.max_frames_in_flight)?;

        log::info!(
            "Presentation engine ready on {} ({} frames in flight)",
            physical.name,
            frame_sync.frames_in_flight()
        );

        Ok(Self {
            frame_sync,
            command_recorder,
            vertex_buffer,
            swapchains,
            device,
            physical,
            surface,
            instance,
            window,
        })
    }

    /// Poll events and draw frames until the window is asked to close
    pub fn run(mut self) -> Result<(), AppError> {
        log::info!("Entering render loop");
        let mut frames: u64 = 0;

        while !self.window.should_close() {
            self.window.poll_events();
            if self.window.should_close() {
                break;
            }
            self.step()?;
            frames += 1;
        }

        self.device.wait_idle()?;
        log::info!(
            "Render loop finished after {} frames and {} swapchain rebuilds",
            frames,
            self.swapchains.recreations()
        );
        Ok(())
    }

    /// Run a single acquire/submit/present iteration
    pub fn step(&mut self) -> Result<FrameOutcome, AppError> {
        let ctx = SurfaceContext {
            device: &self.device,
            physical: &self.physical,
            surface: &self.surface,
        };
        let outcome = self.frame_sync.draw_frame(
            ctx,
            &mut self.window,
            &mut self.swapchains,
            &mut self.command_recorder,
            self.vertex_buffer.as_ref(),
        )?;
        log::trace!("Frame outcome: {:?}", outcome);
        Ok(outcome)
    }

    /// Frame slot the next iteration will use
    pub fn current_frame(&self) -> usize {
        self.frame_sync.current_frame()
    }

    /// Extent of the live swapchain
    pub fn swapchain_extent(&self) -> Result<vk::Extent2D, AppError> {
        Ok(self.swapchains.bundle()?.extent())
    }

    /// Number of images in the live swapchain
    pub fn swapchain_image_count(&self) -> Result<usize, AppError> {
        Ok(self.swapchains.bundle()?.swapchain().image_count())
    }

    /// Number of pre-recorded command buffers
    pub fn command_buffer_count(&self) -> usize {
        self.command_recorder.len()
    }

    /// Lifecycle state of the managed swapchain
    pub fn swapchain_state(&self) -> SwapchainState {
        self.swapchains.state()
    }

    /// Number of swapchain rebuilds so far
    pub fn swapchain_recreations(&self) -> u32 {
        self.swapchains.recreations()
    }

    /// The Vulkan instance
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// The selected GPU
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// The window driving the loop
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device did not go idle before teardown: {}", e);
        }
    }
}
