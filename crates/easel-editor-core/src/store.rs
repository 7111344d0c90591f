//! Durable keyed snapshot storage.
//!
//! Slots hold one [`Document`] each, serialized as JSON. A `put` replaces the
//! whole slot; readers never see a half-written value.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tempfile::NamedTempFile;

use crate::document::Document;
use crate::error::StoreError;
use crate::keys::SnapshotKey;

/// A stored document plus when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub key: SnapshotKey,
    pub document: Document,
    pub written_at: DateTime<Utc>,
}

/// Keyed document persistence.
///
/// Operations are synchronous and short; failures are reported to the caller
/// and never retried here.
pub trait SnapshotStore: Send + Sync {
    /// Replace the slot's contents.
    fn put(&self, key: &SnapshotKey, document: &Document) -> Result<(), StoreError>;

    /// `Ok(None)` for a slot that was never written or has been removed.
    fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotRecord>, StoreError>;

    /// Removing a missing slot is not an error.
    fn remove(&self, key: &SnapshotKey) -> Result<(), StoreError>;

    /// Occupied slots, sorted.
    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError>;
}

/// Store shared between a session's components.
pub type SharedStore = Arc<dyn SnapshotStore>;

fn encode(key: &SnapshotKey, document: &Document) -> Result<String, StoreError> {
    serde_json::to_string(document).map_err(|source| StoreError::Serialize {
        key: key.clone(),
        source,
    })
}

fn decode(key: &SnapshotKey, json: &str) -> Result<Document, StoreError> {
    serde_json::from_str(json).map_err(|source| StoreError::Deserialize {
        key: key.clone(),
        source,
    })
}

/// In-process store. Holds serialized JSON so reads hand out fresh copies,
/// the same as a durable store would.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: DashMap<SnapshotKey, (String, DateTime<Utc>)>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw JSON into a slot, bypassing serialization.
    pub fn put_raw(&self, key: &SnapshotKey, json: impl Into<String>) {
        self.slots.insert(key.clone(), (json.into(), Utc::now()));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, key: &SnapshotKey, document: &Document) -> Result<(), StoreError> {
        let json = encode(key, document)?;
        self.slots.insert(key.clone(), (json, Utc::now()));
        Ok(())
    }

    fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotRecord>, StoreError> {
        // Clone out of the shard before decoding to keep the lock short.
        let Some(entry) = self.slots.get(key).map(|slot| slot.value().clone()) else {
            return Ok(None);
        };
        let (json, written_at) = entry;
        Ok(Some(SnapshotRecord {
            key: key.clone(),
            document: decode(key, &json)?,
            written_at,
        }))
    }

    fn remove(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        self.slots.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        let mut keys: Vec<_> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

const SNAPSHOT_EXTENSION: &str = "json";

/// One JSON file per slot in a directory.
///
/// Writes go to a temporary sibling and are renamed into place. File names
/// are the key with everything outside `[A-Za-z0-9_-]` percent-escaped.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &SnapshotKey) -> PathBuf {
        self.dir
            .join(format!("{}.{SNAPSHOT_EXTENSION}", escape_key(key.as_str())))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&self, key: &SnapshotKey, document: &Document) -> Result<(), StoreError> {
        let json = encode(key, document)?;
        let path = self.path_for(key);
        // Each put stages through its own uniquely named file, so concurrent
        // writers to one key never rename each other's staging files.
        let mut staging = NamedTempFile::new_in(&self.dir).map_err(io_error(&self.dir))?;
        let written = staging
            .write_all(json.as_bytes())
            .and_then(|()| staging.as_file().sync_all());
        written.map_err(io_error(staging.path()))?;
        staging
            .into_temp_path()
            .persist(&path)
            .map_err(|e| io_error(&path)(e.error))?;
        Ok(())
    }

    fn get(&self, key: &SnapshotKey) -> Result<Option<SnapshotRecord>, StoreError> {
        let path = self.path_for(key);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let written_at = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .map_err(io_error(&path))?;
        Ok(Some(SnapshotRecord {
            key: key.clone(),
            document: decode(key, &json)?,
            written_at,
        }))
    }

    fn remove(&self, key: &SnapshotKey) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error(&self.dir))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&self.dir))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match unescape_key(stem) {
                Some(key) => keys.push(SnapshotKey::new(key)),
                None => tracing::debug!(file = %path.display(), "skipping foreign file in snapshot dir"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}
