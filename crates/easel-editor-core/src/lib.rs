//! Persistence and recovery coordination for the easel design editor.
//!
//! The canvas engine, remote backend and font loader are external; this crate
//! sits between them and a [`SnapshotStore`], deciding what to load when a
//! session mounts, when to autosave, and how to get a document back after a
//! preview or a crash.
//!
//! Platform-specific stores and engine bindings live in `easel-editor-browser`.

pub mod autosave;
pub mod backend;
pub mod document;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod keys;
pub mod lifecycle;
pub mod loader;
pub mod preview;
pub mod session;
pub mod store;
pub mod timer;

#[cfg(test)]
mod test_support;

pub use autosave::{AutosaveHooks, AutosaveScheduler, SaveOutcome, SaveTrigger, SnapshotWriter};
pub use backend::{Backend, FetchOutcome};
pub use document::{DesignObject, Document, Frame, ObjectKind, ObjectMetadata, UNTITLED};
pub use engine::{Engine, EngineEvent, Listener, ListenerId, PreviewParams, RasterImage};
pub use error::{
    AutosaveError, BackendError, EngineError, FontError, LoadError, PreviewError,
    RemoteSaveError, RestoreFailure, StoreError,
};
pub use fonts::{FontOutcome, FontRegistry, FontRequest, FontStyle, PreloadReport, collect_font_requests, preload_fonts};
pub use keys::{DEFAULT_AUTOSAVE_KEY, PREVIEW_TEMP_KEY, SessionIdentity, SnapshotKey};
pub use lifecycle::MountGuard;
pub use loader::{DocumentLoader, LoadOutcome, LoadPlan, LoadSource};
pub use preview::{CloseOutcome, PreviewCoordinator, PreviewState, RecoveryOutcome, discover_parameters};
pub use session::{EditorSession, JsonExport, SessionContext, SessionHooks, WorkingDocument};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SharedStore, SnapshotRecord, SnapshotStore};
pub use timer::{DebounceTrigger, DebouncedLine, PeriodicLine, TimerMultiplexer};

pub use easel_common::EditorConfig;
