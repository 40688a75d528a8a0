//! Full startup, draw and resize on a real GPU.
//!
//! Needs a Vulkan driver, a display and the SPIR-V binaries produced by the
//! `triangle_app` build script. Run with `cargo test -- --ignored`.

use present_engine::prelude::*;
use present_engine::render::vulkan::{validation_error_count, FrameOutcome, SwapchainState};

fn shader_path(name: &str) -> String {
    format!("{}/../../shaders/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn test_config(validation: bool) -> EngineConfig {
    let shaders = ShaderConfig::new(shader_path("vert.spv"), shader_path("frag.spv"));
    EngineConfig::new("end_to_end")
        .with_window(WindowConfig::new("end to end", 800, 600))
        .with_renderer(
            RendererConfig::new("end_to_end")
                .with_shaders(shaders)
                .with_clear_color([0.1, 0.1, 0.1, 1.0])
                .with_validation(validation),
        )
}

/// Step once and check the frame slot moved forward by exactly one
fn step_and_check_advance(app: &mut Application) -> FrameOutcome {
    let before = app.current_frame();
    let outcome = app.step().unwrap();
    assert_eq!(app.current_frame(), (before + 1) % 2, "after {outcome:?}");
    outcome
}

fn triangle() -> [Vertex; 3] {
    [
        Vertex::new(Vector2::new(0.0, -0.5), Vector3::new(1.0, 0.0, 0.0)),
        Vertex::new(Vector2::new(0.5, 0.5), Vector3::new(0.0, 1.0, 0.0)),
        Vertex::new(Vector2::new(-0.5, 0.5), Vector3::new(0.0, 0.0, 1.0)),
    ]
}

#[test]
#[ignore = "requires a Vulkan GPU, a display and compiled shaders"]
fn test_draw_then_resize_rebuilds_swapchain() {
    present_engine::logging::init("debug");

    let mut app = Application::new(&test_config(false), &triangle()).unwrap();
    assert!(!app.physical_device().name.is_empty());
    assert_eq!(app.current_frame(), 0);
    assert_eq!(app.swapchain_state(), SwapchainState::Created);
    assert_eq!(app.command_buffer_count(), app.swapchain_image_count().unwrap());

    let first = step_and_check_advance(&mut app);
    assert!(matches!(
        first,
        FrameOutcome::Presented | FrameOutcome::PresentedAndRecreated
    ));
    assert_eq!(app.current_frame(), 1);

    let rebuilds_before = app.swapchain_recreations();

    // Minimize, then come back at a new size before the next frame.
    app.window_mut().iconify();
    app.window_mut().poll_events();
    app.window_mut().restore();
    app.window_mut().set_size(400, 300);

    let mut frames = 0;
    while app.swapchain_recreations() == rebuilds_before && frames < 120 {
        app.window_mut().poll_events();
        let outcome = step_and_check_advance(&mut app);
        assert_ne!(outcome, FrameOutcome::CloseRequested);
        frames += 1;
    }
    assert!(app.swapchain_recreations() > rebuilds_before);
    assert_eq!(app.swapchain_state(), SwapchainState::Created);

    // The framebuffer may be scaled relative to the requested window size.
    let extent = app.swapchain_extent().unwrap();
    let framebuffer = app.window_mut().framebuffer_size();
    assert_eq!((extent.width, extent.height), framebuffer);
    assert_eq!(app.command_buffer_count(), app.swapchain_image_count().unwrap());

    step_and_check_advance(&mut app);

    app.window_mut().set_should_close(true);
    app.run().unwrap();
}

#[test]
#[ignore = "requires a Vulkan GPU, a display, the validation layer and compiled shaders"]
fn test_dropping_mid_loop_waits_for_gpu_work() {
    let mut app = Application::new(&test_config(true), &triangle()).unwrap();
    for _ in 0..4 {
        app.window_mut().poll_events();
        step_and_check_advance(&mut app);
    }

    // Frames are still in flight; teardown must not destroy anything they use.
    let errors_before = validation_error_count();
    drop(app);
    assert_eq!(validation_error_count(), errors_before);
}

#[test]
fn test_missing_shaders_fail_before_window_creation() {
    let config = EngineConfig::new("missing").with_renderer(
        RendererConfig::new("missing")
            .with_shaders(ShaderConfig::new("nope/vert.spv", "nope/frag.spv")),
    );
    let result = Application::new(&config, &triangle());
    assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));
}
