//! Swapchain lifecycle and resize-triggered recreation
//!
//! Everything derived from the swapchain lives in one [`SwapchainBundle`]. Its
//! fields are declared in reverse creation order, so dropping the bundle tears down
//! framebuffers, then the pipeline, then the render pass, then the image views and
//! the swapchain. Recreation always replaces the whole bundle.

use ash::{vk, Device};

use super::buffer::VertexBuffer;
use super::command_recorder::CommandRecorder;
use super::device::{LogicalDevice, PhysicalDeviceInfo};
use super::error::{VulkanError, VulkanResult};
use super::framebuffer::Framebuffer;
use super::instance::Surface;
use super::pipeline::GraphicsPipeline;
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use crate::config::ShaderConfig;
use crate::window::WindowBackend;

/// Device and surface handles the swapchain is built against
#[derive(Clone, Copy)]
pub struct SurfaceContext<'a> {
    /// Logical device and queues
    pub device: &'a LogicalDevice,
    /// Selected physical device
    pub physical: &'a PhysicalDeviceInfo,
    /// Window surface
    pub surface: &'a Surface,
}

/// Swapchain plus everything that depends on its images, extent or format
pub struct SwapchainBundle {
    framebuffers: Vec<Framebuffer>,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SwapchainBundle {
    /// Build swapchain, render pass, pipeline and framebuffers in that order
    pub fn new(
        ctx: SurfaceContext<'_>,
        framebuffer_size: (u32, u32),
        shaders: &ShaderConfig,
    ) -> VulkanResult<Self> {
        let device: &Device = &ctx.device.device;
        let swapchain = Swapchain::new(ctx.device, ctx.physical, ctx.surface, framebuffer_size)?;
        let render_pass = RenderPass::new_present_pass(device.clone(), swapchain.format().format)?;
        let pipeline = GraphicsPipeline::from_shader_files(
            device,
            render_pass.handle(),
            &shaders.vertex_shader_path,
            &shaders.fragment_shader_path,
            swapchain.extent(),
        )?;
        let framebuffers = Framebuffer::for_each_view(
            device,
            render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let bundle = Self {
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
        };
        debug_assert!(bundle.is_consistent());
        Ok(bundle)
    }

    /// The swapchain and its image views
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Graphics pipeline handle
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    /// One framebuffer per swapchain image
    pub fn framebuffers(&self) -> &[Framebuffer] {
        &self.framebuffers
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Images, image views and framebuffers all have the same count
    pub fn is_consistent(&self) -> bool {
        let images = self.swapchain.images().len();
        self.swapchain.image_views().len() == images && self.framebuffers.len() == images
    }
}

/// Lifecycle of the managed swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Nothing built yet
    Uninitialized,
    /// A live bundle exists
    Created,
    /// The old bundle is being torn down and rebuilt
    Recreating,
    /// Torn down for good
    Destroyed,
}

/// Block until the window has a drawable area, returning its framebuffer size
///
/// A minimized window reports zero width or height; waiting on events avoids
/// spinning until it is restored. Returns `None` once a close is requested, since
/// a window closed while minimized never becomes drawable again.
pub fn wait_for_nonzero_framebuffer<W: WindowBackend + ?Sized>(window: &mut W) -> Option<(u32, u32)> {
    loop {
        if window.should_close() {
            return None;
        }
        let (width, height) = window.framebuffer_size();
        if width > 0 && height > 0 {
            return Some((width, height));
        }
        log::trace!("Framebuffer is {}x{}, waiting for events", width, height);
        window.wait_events();
    }
}

/// Owns the current [`SwapchainBundle`] and rebuilds it on demand
pub struct SwapchainManager {
    bundle: Option<SwapchainBundle>,
    state: SwapchainState,
    shaders: ShaderConfig,
    recreations: u32,
}

impl SwapchainManager {
    /// Build the initial bundle for the window's current size
    pub fn new<W: WindowBackend + ?Sized>(
        ctx: SurfaceContext<'_>,
        window: &mut W,
        shaders: ShaderConfig,
    ) -> VulkanResult<Self> {
        let mut manager = Self {
            bundle: None,
            state: SwapchainState::Uninitialized,
            shaders,
            recreations: 0,
        };

        let size = wait_for_nonzero_framebuffer(window).ok_or(
            VulkanError::SwapchainUnavailable("window closed before it had a drawable area"),
        )?;
        manager.bundle = Some(SwapchainBundle::new(ctx, size, &manager.shaders)?);
        manager.state = SwapchainState::Created;
        Ok(manager)
    }

    /// The live bundle
    pub fn bundle(&self) -> VulkanResult<&SwapchainBundle> {
        self.bundle
            .as_ref()
            .ok_or(VulkanError::SwapchainUnavailable("no swapchain has been built"))
    }

    /// Current lifecycle state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// How many times the bundle has been rebuilt
    pub fn recreations(&self) -> u32 {
        self.recreations
    }

    /// Tear down and rebuild the bundle and the command buffers recorded against it
    ///
    /// Waits for a nonzero framebuffer, then for the device to go idle, so nothing
    /// still referenced by in-flight GPU work is destroyed. Consumes any pending
    /// resize notification.
    ///
    /// Returns `false` without touching the current bundle when the window is
    /// closed while waiting.
    pub fn recreate<W: WindowBackend + ?Sized>(
        &mut self,
        ctx: SurfaceContext<'_>,
        window: &mut W,
        recorder: &mut CommandRecorder,
        vertex_buffer: Option<&VertexBuffer>,
    ) -> VulkanResult<bool> {
        let Some(size) = wait_for_nonzero_framebuffer(window) else {
            log::info!("Window closed while waiting to rebuild the swapchain");
            return Ok(false);
        };

        self.state = SwapchainState::Recreating;
        ctx.device.wait_idle()?;

        recorder.free_all();
        self.bundle = None;

        let bundle = SwapchainBundle::new(ctx, size, &self.shaders)?;
        recorder.record_all(&bundle, vertex_buffer)?;
        debug_assert_eq!(recorder.len(), bundle.framebuffers().len());

        log::info!(
            "Recreated swapchain at {}x{} ({:?})",
            size.0,
            size.1,
            bundle.swapchain().present_mode()
        );

        self.bundle = Some(bundle);
        self.state = SwapchainState::Created;
        self.recreations += 1;
        window.take_resize();
        Ok(true)
    }

    /// Drop the bundle; the caller must have waited for the device to go idle
    pub fn destroy(&mut self) {
        self.bundle = None;
        self.state = SwapchainState::Destroyed;
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Window whose framebuffer size changes only when events are waited on
    struct ScriptedWindow {
        size: (u32, u32),
        upcoming: VecDeque<(u32, u32)>,
        waits: usize,
        resize: bool,
        close_after_waits: Option<usize>,
    }

    impl ScriptedWindow {
        fn new(size: (u32, u32), upcoming: &[(u32, u32)]) -> Self {
            Self {
                size,
                upcoming: upcoming.iter().copied().collect(),
                waits: 0,
                resize: false,
                close_after_waits: None,
            }
        }
    }

    impl WindowBackend for ScriptedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.size
        }

        fn poll_events(&mut self) {}

        fn wait_events(&mut self) {
            self.waits += 1;
            if let Some(next) = self.upcoming.pop_front() {
                self.size = next;
                self.resize = true;
            }
        }

        fn should_close(&self) -> bool {
            self.close_after_waits.is_some_and(|waits| self.waits >= waits)
        }

        fn resize_pending(&self) -> bool {
            self.resize
        }

        fn take_resize(&mut self) -> bool {
            std::mem::take(&mut self.resize)
        }
    }

    #[test]
    fn test_nonzero_framebuffer_returns_immediately() {
        let mut window = ScriptedWindow::new((800, 600), &[]);
        assert_eq!(wait_for_nonzero_framebuffer(&mut window), Some((800, 600)));
        assert_eq!(window.waits, 0);
    }

    #[test]
    fn test_minimized_window_blocks_until_restored() {
        let mut window = ScriptedWindow::new((0, 0), &[(0, 0), (400, 0), (400, 300)]);
        assert_eq!(wait_for_nonzero_framebuffer(&mut window), Some((400, 300)));
        assert_eq!(window.waits, 3);
        assert!(window.upcoming.is_empty());
    }

    #[test]
    fn test_wait_works_through_trait_object() {
        let mut window = ScriptedWindow::new((0, 600), &[(1, 1)]);
        let backend: &mut dyn WindowBackend = &mut window;
        assert_eq!(wait_for_nonzero_framebuffer(backend), Some((1, 1)));
    }

    #[test]
    fn test_close_while_minimized_stops_waiting() {
        let mut window = ScriptedWindow::new((0, 0), &[(0, 0), (0, 0), (0, 0)]);
        window.close_after_waits = Some(2);
        assert_eq!(wait_for_nonzero_framebuffer(&mut window), None);
        assert_eq!(window.waits, 2);
    }

    #[test]
    fn test_close_requested_skips_drawable_window() {
        let mut window = ScriptedWindow::new((800, 600), &[]);
        window.close_after_waits = Some(0);
        assert_eq!(wait_for_nonzero_framebuffer(&mut window), None);
    }

    #[test]
    fn test_missing_bundle_reports_unavailable_swapchain() {
        let manager = SwapchainManager {
            bundle: None,
            state: SwapchainState::Uninitialized,
            shaders: ShaderConfig::default(),
            recreations: 0,
        };
        assert_eq!(manager.state(), SwapchainState::Uninitialized);
        assert!(matches!(
            manager.bundle(),
            Err(VulkanError::SwapchainUnavailable(_))
        ));
    }

    #[test]
    fn test_destroy_without_bundle_marks_destroyed() {
        let mut manager = SwapchainManager {
            bundle: None,
            state: SwapchainState::Created,
            shaders: ShaderConfig::default(),
            recreations: 0,
        };
        manager.destroy();
        assert_eq!(manager.state(), SwapchainState::Destroyed);
        assert_eq!(manager.recreations(), 0);
    }
}
