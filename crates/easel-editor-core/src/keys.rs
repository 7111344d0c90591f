//! Snapshot slot naming.
//!
//! A session writes its autosaves to exactly one slot, derived once from its
//! identity. Preview keeps its pre-preview capture in a separate fixed slot so
//! the two never overwrite each other.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

use crate::document::Document;

/// Autosave slot for sessions that are not editing a saved design.
pub const DEFAULT_AUTOSAVE_KEY: &str = "easel_autosave";

/// Slot holding the document captured just before a preview opened.
pub const PREVIEW_TEMP_KEY: &str = "easel_preview_temp";

/// Prefix of per-design autosave slots.
pub const DOCUMENT_KEY_PREFIX: &str = "design_";

/// Name of a slot in a [`SnapshotStore`](crate::store::SnapshotStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotKey(SmolStr);

impl SnapshotKey {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    pub fn default_autosave() -> Self {
        Self(SmolStr::new_static(DEFAULT_AUTOSAVE_KEY))
    }

    pub fn preview_temp() -> Self {
        Self(SmolStr::new_static(PREVIEW_TEMP_KEY))
    }

    /// Autosave slot of a saved design.
    pub fn for_document(id: &str) -> Self {
        Self(format_smolstr!("{DOCUMENT_KEY_PREFIX}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The design id, if this is a per-design slot.
    pub fn document_id(&self) -> Option<&str> {
        self.0
            .strip_prefix(DOCUMENT_KEY_PREFIX)
            .filter(|id| !id.is_empty())
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SnapshotKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// What a session was opened on.
///
/// Fixed for the lifetime of a session; navigating to another design mounts a
/// new session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionIdentity {
    document_id: Option<SmolStr>,
    payload: Option<Document>,
}

impl SessionIdentity {
    /// A fresh, unsaved design.
    pub fn untitled() -> Self {
        Self::default()
    }

    /// A saved design. An empty id is treated as no id.
    pub fn for_document(id: impl Into<SmolStr>) -> Self {
        let id = id.into();
        Self {
            document_id: (!id.is_empty()).then_some(id),
            payload: None,
        }
    }

    /// Document handed over by the host instead of being fetched.
    pub fn with_payload(mut self, document: Document) -> Self {
        self.payload = Some(document);
        self
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn payload(&self) -> Option<&Document> {
        self.payload.as_ref()
    }

    /// Neither an id nor a payload: the only case a local snapshot is restored.
    pub fn is_untitled(&self) -> bool {
        self.document_id.is_none() && self.payload.is_none()
    }

    /// Slot this session autosaves to.
    pub fn autosave_key(&self, default: &SnapshotKey) -> SnapshotKey {
        match &self.document_id {
            Some(id) => SnapshotKey::for_document(id),
            None => default.clone(),
        }
    }
}
