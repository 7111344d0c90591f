//! Deciding what document a session starts with.
//!
//! Exactly one source is used, picked from the session identity:
//!
//! 1. a payload handed over by the host,
//! 2. otherwise the design named by the session's id, fetched remotely,
//! 3. otherwise the local autosave snapshot, if any.
//!
//! Paths 1 and 2 preload fonts before import. Path 3 defers the import to the
//! next paint and never reports an error. Each step that follows an await
//! checks the mount guard first and abandons the load if the session is gone.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::backend::{Backend, FetchOutcome};
use crate::document::Document;
use crate::engine::Engine;
use crate::error::LoadError;
use crate::fonts::{FontRegistry, PreloadReport, preload_fonts};
use crate::keys::{SessionIdentity, SnapshotKey};
use crate::lifecycle::MountGuard;
use crate::store::SharedStore;

/// Where a loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    Payload,
    Remote { id: SmolStr },
}

/// Source chosen for a session, before anything is fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadPlan {
    Payload(Document),
    Remote(SmolStr),
    LocalSnapshot(SnapshotKey),
}

impl LoadPlan {
    pub fn for_identity(identity: &SessionIdentity, default_key: &SnapshotKey) -> Self {
        if let Some(payload) = identity.payload() {
            return Self::Payload(payload.clone());
        }
        match identity.document_id() {
            Some(id) => Self::Remote(SmolStr::new(id)),
            None => Self::LocalSnapshot(default_key.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// An explicitly provided or fetched document is live.
    Loaded {
        source: LoadSource,
        name: Option<SmolStr>,
        fonts: PreloadReport,
    },
    /// A local snapshot was restored into an untitled session.
    Restored { key: SnapshotKey },
    /// Untitled session with nothing usable to restore.
    Fresh,
    /// The session was torn down before the load finished.
    Discarded,
}

impl LoadOutcome {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded)
    }
}

/// Runs the initial load for one session.
pub struct DocumentLoader<E, B, F> {
    engine: Arc<E>,
    backend: Arc<B>,
    fonts: Arc<F>,
    store: SharedStore,
    default_key: SnapshotKey,
    guard: MountGuard,
}

impl<E, B, F> DocumentLoader<E, B, F>
where
    E: Engine,
    B: Backend,
    F: FontRegistry,
{
    pub fn new(
        engine: Arc<E>,
        backend: Arc<B>,
        fonts: Arc<F>,
        store: SharedStore,
        default_key: SnapshotKey,
        guard: MountGuard,
    ) -> Self {
        Self {
            engine,
            backend,
            fonts,
            store,
            default_key,
            guard,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(id = ?identity.document_id()))]
    pub async fn load(&self, identity: &SessionIdentity) -> Result<LoadOutcome, LoadError> {
        match LoadPlan::for_identity(identity, &self.default_key) {
            LoadPlan::Payload(document) => self.materialize(document, LoadSource::Payload).await,
            LoadPlan::Remote(id) => {
                let fetched = self.backend.fetch_document_by_id(&id).await;
                if !self.guard.is_mounted() {
                    return Ok(LoadOutcome::Discarded);
                }
                match fetched {
                    Ok(FetchOutcome::Found(document)) => {
                        self.materialize(document, LoadSource::Remote { id }).await
                    }
                    Ok(FetchOutcome::NotFound) => Err(LoadError::NotFound { id }),
                    Err(source) => Err(LoadError::Fetch { id, source }),
                }
            }
            LoadPlan::LocalSnapshot(key) => Ok(self.restore_local(key).await),
        }
    }

    async fn materialize(
        &self,
        document: Document,
        source: LoadSource,
    ) -> Result<LoadOutcome, LoadError> {
        let fonts = preload_fonts(&document, self.fonts.as_ref()).await;
        if !self.guard.is_mounted() {
            return Ok(LoadOutcome::Discarded);
        }
        self.engine
            .import_document(&document)
            .map_err(LoadError::Import)?;
        tracing::info!(
            name = document.display_name(),
            objects = document.objects.len(),
            fonts_failed = fonts.failed.len(),
            "document loaded"
        );
        Ok(LoadOutcome::Loaded {
            source,
            name: document.name.clone(),
            fonts,
        })
    }

    async fn restore_local(&self, key: SnapshotKey) -> LoadOutcome {
        let record = match self.store.get(&key) {
            Ok(Some(record)) => record,
            Ok(None) => return LoadOutcome::Fresh,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "local snapshot unreadable, starting fresh");
                return LoadOutcome::Fresh;
            }
        };

        self.engine.after_paint().await;
        if !self.guard.is_mounted() {
            return LoadOutcome::Discarded;
        }
        match self.engine.import_document(&record.document) {
            Ok(()) => {
                tracing::info!(key = %key, written_at = %record.written_at, "restored local snapshot");
                LoadOutcome::Restored { key }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "local snapshot rejected by engine");
                LoadOutcome::Fresh
            }
        }
    }
}
