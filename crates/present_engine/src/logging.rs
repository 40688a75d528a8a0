//! Logging setup

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `default_filter` applies when `RUST_LOG` is not set. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
