use crate::config::LogConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber
///
/// Logs go to stderr; stdout carries the account table. `RUST_LOG` takes
/// precedence over `config.level`.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        let stderr_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_ansi(false);
        registry.with(stderr_layer).try_init()
    } else {
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(stderr_layer).try_init()
    };

    installed.map_err(|e| format!("Failed to initialize logging: {}", e))
}
