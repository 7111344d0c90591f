//! Tracing setup for native easel binaries.
//!
//! The library crates only emit `tracing` events; binaries call [`init`] once
//! at startup. Browser builds install `tracing-wasm` from `easel-editor-browser`
//! instead.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event (e.g., "easel-cli")
    pub service_name: String,
    /// Console log level when `RUST_LOG` is unset (INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// Build config for a service, honouring `RUST_LOG` at init time.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }

    /// Same as [`from_env`](Self::from_env) but quieter: only warnings unless
    /// `RUST_LOG` says otherwise. Used by the CLI so its stdout stays clean.
    pub fn quiet(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            console_level: Level::WARN,
        }
    }
}

/// Install the global subscriber.
///
/// Returns false if a subscriber was already installed (tests, embedding
/// hosts); that is not an error.
pub fn init(config: TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, "telemetry initialized");
    }
    installed
}
