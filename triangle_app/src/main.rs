//! Draws a single colored triangle in a resizable window.
//!
//! Reads `present.toml` from the working directory when it exists, otherwise runs
//! with defaults. Exits with code 1 and a message on stderr on any fatal error.

use std::path::Path;
use std::process::ExitCode;

use present_engine::logging;
use present_engine::prelude::*;

const CONFIG_PATH: &str = "present.toml";

fn load_config() -> Result<EngineConfig, ConfigError> {
    if Path::new(CONFIG_PATH).exists() {
        EngineConfig::load_from_file(CONFIG_PATH)
    } else {
        Ok(EngineConfig::new("Triangle").with_window(WindowConfig::new("Vulkan triangle", 800, 600)))
    }
}

fn triangle() -> [Vertex; 3] {
    [
        Vertex::new(Vector2::new(0.0, -0.5), Vector3::new(1.0, 0.0, 0.0)),
        Vertex::new(Vector2::new(0.5, 0.5), Vector3::new(0.0, 1.0, 0.0)),
        Vertex::new(Vector2::new(-0.5, 0.5), Vector3::new(0.0, 0.0, 1.0)),
    ]
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    logging::init(&config.log_level);
    log::info!("Starting {}", config.renderer.application_name);

    Application::new(&config, &triangle())?.run()
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
