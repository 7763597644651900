//! Telemetry bootstrap: structured logging with JSON/pretty formats.
//!
//! Metric counters are emitted through the `metrics` facade at their call
//! sites; exporter wiring is the host application's responsibility.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Safe to call more
/// than once (subsequent calls are no-ops), which keeps tests independent.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}
