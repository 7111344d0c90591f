//! easel-common: configuration, errors and telemetry shared by easel crates.

pub mod config;
pub mod error;
pub mod perf;
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub mod telemetry;

pub use crate::config::{EditorConfig, KdlConfigFile, Loader, Saver};
pub use crate::error::{ConfigError, EaselError, ParseError};
