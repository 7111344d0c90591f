//! LocalStorage snapshot persistence.
//!
//! Each slot is stored under its key exactly as named, as the document's JSON,
//! so snapshots stay readable from devtools. The write time lives in a
//! sibling `"{key}:written_at"` entry, which also marks the slot as ours when
//! listing keys.

use chrono::{DateTime, Utc};
use easel_editor_core::{Document, SnapshotKey, SnapshotRecord, SnapshotStore, StoreError};
use smol_str::format_smolstr;
use wasm_bindgen::JsValue;
use web_sys::{Storage, Window};

const WRITTEN_AT_SUFFIX: &str = ":written_at";

fn written_at_key(key: &SnapshotKey) -> String {
    format!("{key}{WRITTEN_AT_SUFFIX}")
}

fn unavailable(operation: &str, err: JsValue) -> StoreError {
    StoreError::Unavailable(format_smolstr!("{operation}: {err:?}"))
}

/// `window.localStorage`, or `Unavailable` when there is no window or the
/// browser refuses access (sandboxed frames, storage disabled).
fn local_storage() -> Result<Storage, StoreError> {
    storage_in(web_sys::window())
}

fn storage_in(window: Option<Window>) -> Result<Storage, StoreError> {
    let window = window.ok_or_else(|| StoreError::Unavailable("no window".into()))?;
    match window.local_storage() {
        Ok(Some(storage)) => Ok(storage),
        Ok(None) => Err(StoreError::Unavailable("localStorage disabled".into())),
        Err(e) => Err(unavailable("localStorage", e)),
    }
}

/// [`SnapshotStore`] backed by `window.localStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageSnapshotStore;

impl LocalStorageSnapshotStore {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotStore for LocalStorageSnapshotStore {
    fn put(&self, key: &SnapshotKey, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_string(document).map_err(|source| StoreError::Serialize {
            key: key.clone(),
            source,
        })?;
        let storage = local_storage()?;
        // Quota errors surface here.
        storage
            .set_item(key.as_str(), &json)
            .map_err(|e| unavailable("setItem", e))?;
        if let Err(e) = storage.set_item(&written_at_key(key), &Utc::now().to_rfc3339()) {
            tracing::debug!(key = %key, error = ?e, "could not record snapshot time");
        }
        Ok(())
    }

    fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotRecord>, StoreError> {
        let storage = local_storage()?;
        let Some(json) = storage
            .get_item(key.as_str())
            .map_err(|e| unavailable("getItem", e))?
        else {
            return Ok(None);
        };
        let document = serde_json::from_str(&json).map_err(|source| StoreError::Deserialize {
            key: key.clone(),
            source,
        })?;
        let written_at = storage
            .get_item(&written_at_key(key))
            .ok()
            .flatten()
            .and_then(|stamp| DateTime::parse_from_rfc3339(&stamp).ok())
            .map(|stamp| stamp.with_timezone(&Utc))
            .unwrap_or_default();
        Ok(Some(SnapshotRecord {
            key: key.clone(),
            document,
            written_at,
        }))
    }

    fn remove(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        let storage = local_storage()?;
        storage
            .remove_item(key.as_str())
            .map_err(|e| unavailable("removeItem", e))?;
        storage
            .remove_item(&written_at_key(key))
            .map_err(|e| unavailable("removeItem", e))
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        let storage = local_storage()?;
        let len = storage.length().map_err(|e| unavailable("length", e))?;
        let mut keys: Vec<SnapshotKey> = (0..len)
            .filter_map(|i| storage.key(i).ok().flatten())
            .filter_map(|name| name.strip_suffix(WRITTEN_AT_SUFFIX).map(SnapshotKey::new))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
