//! Error types for coordinator operations.
//!
//! Everything except [`LoadError`] is transient: callers log it and carry on.
//! A `LoadError` means an explicitly addressed document could not be shown
//! and is reported to the hosting application.

use std::path::PathBuf;

use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::keys::SnapshotKey;

/// Failures reported by the canvas engine.
#[derive(Debug, Clone, Error, Diagnostic)]
#[non_exhaustive]
pub enum EngineError {
    #[error("engine rejected the document: {0}")]
    #[diagnostic(code(engine::import))]
    Import(SmolStr),

    #[error("engine could not export its document: {0}")]
    #[diagnostic(code(engine::export))]
    Export(SmolStr),

    #[error("engine could not add the object: {0}")]
    #[diagnostic(code(engine::add_object))]
    AddObject(SmolStr),

    #[error("raster export failed: {0}")]
    #[diagnostic(code(engine::raster))]
    Raster(SmolStr),
}

/// Snapshot persistence failures.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum StoreError {
    #[error("failed to serialize snapshot {key}")]
    #[diagnostic(code(store::serialize))]
    Serialize {
        key: SnapshotKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {key} is not a readable document")]
    #[diagnostic(
        code(store::deserialize),
        help("clear the slot with `easel remove <key>`")
    )]
    Deserialize {
        key: SnapshotKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot storage I/O failed at {}", path.display())]
    #[diagnostic(code(store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Browser storage refused the operation (quota, privacy mode).
    #[error("snapshot storage unavailable: {0}")]
    #[diagnostic(code(store::unavailable))]
    Unavailable(SmolStr),
}

/// Remote document storage failures.
#[derive(Debug, Clone, Error, Diagnostic)]
#[non_exhaustive]
pub enum BackendError {
    #[error("request failed: {0}")]
    #[diagnostic(code(backend::request))]
    Request(SmolStr),

    #[error("not authenticated")]
    #[diagnostic(code(backend::unauthenticated))]
    NotAuthenticated,

    #[error("unexpected response: {0}")]
    #[diagnostic(code(backend::response))]
    InvalidResponse(SmolStr),
}

/// A single font failed to load or register.
#[derive(Debug, Clone, Error, Diagnostic)]
#[non_exhaustive]
pub enum FontError {
    #[error("font {family} from {url} failed to load: {reason}")]
    #[diagnostic(code(fonts::load))]
    Load {
        family: SmolStr,
        url: String,
        reason: SmolStr,
    },
}

/// Autosave write failures. Never fatal; the next firing retries.
#[derive(Debug, Error, Diagnostic)]
pub enum AutosaveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Preview excursion failures.
#[derive(Debug, Error, Diagnostic)]
pub enum PreviewError {
    #[error("preview is busy")]
    #[diagnostic(code(preview::busy), help("wait for the current operation to finish"))]
    Busy,

    #[error("preview is already open")]
    #[diagnostic(code(preview::already_open))]
    AlreadyOpen,

    #[error("preview is not open")]
    #[diagnostic(code(preview::not_open))]
    NotOpen,

    #[error("unknown preview parameter {0}")]
    #[diagnostic(code(preview::unknown_param))]
    UnknownParameter(SmolStr),

    /// The pre-preview document could not be captured, so the preview was
    /// not opened.
    #[error("could not capture the document before preview")]
    #[diagnostic(code(preview::capture))]
    Capture(#[source] AutosaveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(EngineError),

    /// The preview was closed while its image was still rendering.
    #[error("preview closed before the image was ready")]
    #[diagnostic(code(preview::superseded))]
    Superseded,

    #[error("session has been torn down")]
    #[diagnostic(code(preview::unmounted))]
    Unmounted,
}

/// A snapshot could not be brought back into the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum RestoreFailure {
    #[error("could not read snapshot: {0}")]
    #[diagnostic(code(restore::read))]
    Read(StoreError),

    #[error("could not import snapshot: {0}")]
    #[diagnostic(code(restore::import))]
    Import(EngineError),
}

/// Explicitly addressed document could not be shown.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum LoadError {
    #[error("design {id} was not found")]
    #[diagnostic(code(load::not_found))]
    NotFound { id: SmolStr },

    #[error("failed to fetch design {id}")]
    #[diagnostic(code(load::fetch))]
    Fetch {
        id: SmolStr,
        #[source]
        source: BackendError,
    },

    #[error("failed to import the loaded design")]
    #[diagnostic(code(load::import))]
    Import(#[source] EngineError),

    #[error("load task stopped before completing")]
    #[diagnostic(code(load::interrupted))]
    Interrupted,
}

/// Pushing the current document to remote storage failed.
#[derive(Debug, Error, Diagnostic)]
pub enum RemoteSaveError {
    #[error("untitled sessions have no remote document to save to")]
    #[diagnostic(code(remote_save::no_document_id))]
    NoDocumentId,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(BackendError),
}
