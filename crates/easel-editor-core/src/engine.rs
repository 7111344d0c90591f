//! Canvas engine abstraction.
//!
//! The drawing engine is an external SDK. This trait is the whole surface the
//! coordinator consumes; the browser build wraps the SDK handle, tests use an
//! in-memory fake.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::document::{DesignObject, Document};
use crate::error::EngineError;

/// Parameter name -> user supplied value, passed to raster export.
pub type PreviewParams = BTreeMap<SmolStr, String>;

/// Change notification callback registered with the engine.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Notifications the coordinator subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    /// The engine's undo history moved (any user edit).
    HistoryChanged,
}

impl EngineEvent {
    /// Event name as the SDK spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HistoryChanged => "history:changed",
        }
    }
}

/// Handle for removing a registered [`Listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Encoded image produced by [`Engine::raster_export`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub bytes: Vec<u8>,
    pub mime: SmolStr,
}

impl RasterImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: SmolStr::new_static("image/png"),
        }
    }

    /// Name offered when the preview image is downloaded.
    pub fn suggested_file_name(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" => "drawing.jpg",
            _ => "drawing.png",
        }
    }
}

/// The canvas engine as seen by the coordinator.
///
/// All methods take `&self`; the engine owns its live document and whatever
/// interior mutability that needs. Implementations must be shareable across
/// the session's timer tasks.
pub trait Engine: Send + Sync + 'static {
    /// Replace the live document.
    fn import_document(&self, document: &Document) -> Result<(), EngineError>;

    /// Fresh copy of the live document.
    fn export_document(&self) -> Result<Document, EngineError>;

    fn add_object(&self, object: DesignObject) -> Result<(), EngineError>;

    /// Render the live document with template parameters applied.
    fn raster_export(
        &self,
        params: &PreviewParams,
    ) -> impl Future<Output = Result<RasterImage, EngineError>> + Send;

    fn subscribe(&self, event: EngineEvent, listener: Listener) -> ListenerId;

    /// Removing an unknown id is a no-op.
    fn unsubscribe(&self, event: EngineEvent, id: ListenerId);

    /// Resolves after the host has painted the next frame.
    ///
    /// Used to defer imports until the engine and any closing overlay have
    /// finished their own layout.
    fn after_paint(&self) -> impl Future<Output = ()> + Send;
}
