//! One mounted editor session.
//!
//! An [`EditorSession`] owns everything that runs on behalf of a single
//! opened design: the initial load, autosave timers, and the preview
//! coordinator. Dropping it (or calling [`EditorSession::unmount`]) tears all
//! of that down; late results from in-flight work are discarded.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use easel_common::EditorConfig;
use n0_future::task::{self, JoinHandle};
use smol_str::SmolStr;

use crate::autosave::{AutosaveHooks, AutosaveScheduler, SaveOutcome, SaveTrigger, SnapshotWriter};
use crate::backend::Backend;
use crate::document::{DesignObject, UNTITLED};
use crate::engine::Engine;
use crate::error::{AutosaveError, EngineError, LoadError, RemoteSaveError};
use crate::fonts::FontRegistry;
use crate::keys::{SessionIdentity, SnapshotKey};
use crate::lifecycle::MountGuard;
use crate::loader::{DocumentLoader, LoadOutcome, LoadSource};
use crate::preview::{PreviewCoordinator, RecoveryOutcome};
use crate::store::SharedStore;

#[cfg(test)]
mod tests;

/// Called when an explicitly addressed document could not be loaded.
pub type LoadErrorHook = Arc<dyn Fn(&LoadError) + Send + Sync>;

/// Host callbacks for a session.
#[derive(Clone, Default)]
pub struct SessionHooks {
    pub autosave: AutosaveHooks,
    pub on_load_error: Option<LoadErrorHook>,
}

impl fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHooks")
            .field("autosave", &self.autosave)
            .field("on_load_error", &self.on_load_error.is_some())
            .finish()
    }
}

/// Collaborators and settings shared by every session the host mounts.
pub struct SessionContext<E, B, F> {
    pub engine: Arc<E>,
    pub backend: Arc<B>,
    pub fonts: Arc<F>,
    pub store: SharedStore,
    pub config: EditorConfig,
    pub hooks: SessionHooks,
}

impl<E, B, F> SessionContext<E, B, F> {
    pub fn new(engine: Arc<E>, backend: Arc<B>, fonts: Arc<F>, store: SharedStore) -> Self {
        Self {
            engine,
            backend,
            fonts,
            store,
            config: EditorConfig::default(),
            hooks: SessionHooks::default(),
        }
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Default autosave slot, honouring a configured override.
    pub fn default_autosave_key(&self) -> SnapshotKey {
        self.config
            .autosave_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(SnapshotKey::new)
            .unwrap_or_else(SnapshotKey::default_autosave)
    }
}

impl<E, B, F> Clone for SessionContext<E, B, F> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            backend: self.backend.clone(),
            fonts: self.fonts.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

/// What the session knows about the document it loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDocument {
    pub name: Option<SmolStr>,
    pub source: LoadSource,
}

/// A JSON download of the live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonExport {
    pub file_name: String,
    pub contents: String,
}

enum LoadTask {
    Pending(JoinHandle<Result<LoadOutcome, LoadError>>),
    Done(Result<LoadOutcome, LoadError>),
}

pub struct EditorSession<E: Engine, B: Backend, F: FontRegistry> {
    context: SessionContext<E, B, F>,
    identity: SessionIdentity,
    guard: MountGuard,
    writer: Arc<SnapshotWriter<E>>,
    autosave: Option<AutosaveScheduler<E>>,
    preview: PreviewCoordinator<E>,
    working: Arc<Mutex<Option<WorkingDocument>>>,
    load: LoadTask,
}

impl<E: Engine, B: Backend, F: FontRegistry> EditorSession<E, B, F> {
    /// Mount a session: start autosave (if enabled) and kick off the load.
    ///
    /// Must be called from within the async runtime.
    pub fn mount(context: SessionContext<E, B, F>, identity: SessionIdentity) -> Self {
        let guard = MountGuard::new();
        let default_key = context.default_autosave_key();
        let autosave_key = identity.autosave_key(&default_key);

        let writer = Arc::new(SnapshotWriter::new(
            context.engine.clone(),
            context.store.clone(),
            autosave_key.clone(),
            context.hooks.autosave.clone(),
            guard.clone(),
        ));
        let autosave = context
            .config
            .enable_autosave
            .then(|| AutosaveScheduler::start(writer.clone(), &context.config, &guard));

        let preview = PreviewCoordinator::new(
            context.engine.clone(),
            context.store.clone(),
            autosave_key.clone(),
            context.config.preview_cooldown,
            guard.clone(),
        );

        let loader = DocumentLoader::new(
            context.engine.clone(),
            context.backend.clone(),
            context.fonts.clone(),
            context.store.clone(),
            default_key,
            guard.clone(),
        );
        let working = Arc::new(Mutex::new(None));
        let load = LoadTask::Pending(spawn_load(
            loader,
            identity.clone(),
            working.clone(),
            guard.clone(),
            context.hooks.on_load_error.clone(),
        ));

        tracing::info!(
            id = identity.document_id(),
            autosave_key = %autosave_key,
            autosave = autosave.is_some(),
            "session mounted"
        );
        Self {
            context,
            identity,
            guard,
            writer,
            autosave,
            preview,
            working,
            load,
        }
    }

    /// Wait for the initial load to settle. Later calls return the same result.
    pub async fn wait_loaded(&mut self) -> Result<LoadOutcome, LoadError> {
        let result = match &mut self.load {
            LoadTask::Done(result) => return result.clone(),
            LoadTask::Pending(handle) => handle.await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "load task ended abnormally");
                Err(LoadError::Interrupted)
            }),
        };
        self.load = LoadTask::Done(result.clone());
        result
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn autosave_key(&self) -> &SnapshotKey {
        self.writer.key()
    }

    pub fn autosave_enabled(&self) -> bool {
        self.autosave.as_ref().is_some_and(AutosaveScheduler::is_running)
    }

    pub fn is_mounted(&self) -> bool {
        self.guard.is_mounted()
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.context.engine
    }

    pub fn preview(&self) -> &PreviewCoordinator<E> {
        &self.preview
    }

    /// Add an object to the live document. The engine's change notification
    /// schedules the autosave.
    pub fn add_object(&self, object: DesignObject) -> Result<(), EngineError> {
        tracing::debug!(kind = %object.kind, "adding object");
        self.context.engine.add_object(object)
    }

    /// Write the autosave slot now.
    pub fn save_now(&self) -> Result<SaveOutcome, AutosaveError> {
        match &self.autosave {
            Some(scheduler) => scheduler.save_now(),
            None => self.writer.save(SaveTrigger::Manual),
        }
    }

    pub fn recover(&self) -> RecoveryOutcome {
        self.preview.recover()
    }

    pub fn current_document(&self) -> Option<WorkingDocument> {
        self.working
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Title for the editor chrome.
    pub fn display_name(&self) -> String {
        let loaded = self.current_document().and_then(|w| w.name);
        let name = loaded.or_else(|| self.identity.payload().and_then(|p| p.name.clone()));
        match name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => UNTITLED.to_string(),
        }
    }

    /// Export the live document as a pretty-printed JSON download.
    pub fn export_json(&self) -> Result<JsonExport, EngineError> {
        let document = self.context.engine.export_document()?;
        let contents = document
            .to_json_pretty()
            .map_err(|e| EngineError::Export(e.to_string().into()))?;
        Ok(JsonExport {
            file_name: format!("{}.json", self.display_name()),
            contents,
        })
    }

    /// Push the live document to the design it was opened from.
    pub async fn save_remote(&self) -> Result<(), RemoteSaveError> {
        let id = self
            .identity
            .document_id()
            .ok_or(RemoteSaveError::NoDocumentId)?;
        let mut document = self
            .context
            .engine
            .export_document()
            .map_err(RemoteSaveError::Export)?;
        if document.name.is_none() {
            document.name = self.current_document().and_then(|w| w.name);
        }
        self.context
            .backend
            .save_document(id, &document)
            .await
            .map_err(RemoteSaveError::Backend)?;
        tracing::info!(id, objects = document.objects.len(), "design saved");
        Ok(())
    }

    /// Tear this session down and mount a new one for `identity`.
    pub fn navigate(self, identity: SessionIdentity) -> Self {
        let context = self.context.clone();
        drop(self);
        Self::mount(context, identity)
    }

    pub fn unmount(self) {
        drop(self);
    }

    fn teardown(&mut self) {
        if !self.guard.is_mounted() {
            return;
        }
        if let Some(scheduler) = self.autosave.as_mut() {
            scheduler.stop();
        }
        self.guard.teardown();
        tracing::info!(id = self.identity.document_id(), "session unmounted");
    }
}

impl<E: Engine, B: Backend, F: FontRegistry> Drop for EditorSession<E, B, F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn spawn_load<E, B, F>(
    loader: DocumentLoader<E, B, F>,
    identity: SessionIdentity,
    working: Arc<Mutex<Option<WorkingDocument>>>,
    guard: MountGuard,
    on_error: Option<LoadErrorHook>,
) -> JoinHandle<Result<LoadOutcome, LoadError>>
where
    E: Engine,
    B: Backend,
    F: FontRegistry,
{
    task::spawn(async move {
        let result = loader.load(&identity).await;
        match &result {
            Ok(LoadOutcome::Loaded { source, name, .. }) => {
                *working.lock().unwrap_or_else(PoisonError::into_inner) = Some(WorkingDocument {
                    name: name.clone(),
                    source: source.clone(),
                });
            }
            Err(e) if guard.is_mounted() => {
                tracing::error!(error = %e, "document load failed");
                if let Some(hook) = &on_error {
                    hook(e);
                }
            }
            _ => {}
        }
        result
    })
}
