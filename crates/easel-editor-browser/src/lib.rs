//! Browser layer for the easel editor coordinator.
//!
//! Provides the pieces of the coordinator that need the browser:
//!
//! - `storage`: a [`SnapshotStore`] on `window.localStorage`
//! - `paint`: waiting for the next animation frame, for `Engine::after_paint`
//! - `telemetry`: console logging through `tracing`
//!
//! Everything here assumes `wasm32-unknown-unknown`; on other targets the
//! crate only re-exports `easel-editor-core`.

// Re-export core crate
pub use easel_editor_core;
pub use easel_editor_core::*;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub mod paint;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub mod storage;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub mod telemetry;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use paint::next_animation_frame;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use storage::LocalStorageSnapshotStore;
