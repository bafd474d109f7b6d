//! Tracing subscriber setup

use swapdesk_config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing: {0}")]
    InitError(String),
}

/// Directive used when `RUST_LOG` is unset.
///
/// At the default `info` level the engine's own crates log at `debug`.
pub fn default_directive(config: &LoggingConfig) -> String {
    let level = config.level.to_lowercase();
    if level == "info" {
        "info,swapdesk=debug".to_string()
    } else {
        level
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// A second call fails with [`TelemetryError::InitError`].
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config)))
        .map_err(|e| TelemetryError::InitError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init()
    };

    result.map_err(|e| TelemetryError::InitError(e.to_string()))
}
