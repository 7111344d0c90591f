//! In-memory engine, backend and font registry for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smol_str::SmolStr;

use crate::backend::{Backend, FetchOutcome};
use crate::document::{DesignObject, Document};
use crate::engine::{Engine, EngineEvent, Listener, ListenerId, PreviewParams, RasterImage};
use crate::error::{BackendError, EngineError, FontError};
use crate::fonts::{FontRegistry, FontRequest};

pub fn document_with_objects(name: &str, count: usize) -> Document {
    let mut doc = Document::with_frame(800.0, 600.0);
    doc.name = Some(name.into());
    for i in 0..count {
        doc.objects
            .push(DesignObject::text("Lobster", "https://fonts.example/lobster.ttf").with_keys([format!("field{i}")]));
    }
    doc
}

#[derive(Default)]
pub struct FakeEngine {
    document: Mutex<Document>,
    imports: Mutex<Vec<Document>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    pub fail_export: AtomicBool,
    pub fail_import: AtomicBool,
    raster_failures: AtomicUsize,
    raster_delay: Mutex<Duration>,
    raster_calls: Mutex<Vec<PreviewParams>>,
    paints: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_document(document: Document) -> Arc<Self> {
        let engine = Self::default();
        *engine.document.lock().unwrap() = document;
        Arc::new(engine)
    }

    pub fn current(&self) -> Document {
        self.document.lock().unwrap().clone()
    }

    /// Mutate the live document the way a user edit would, then notify.
    pub fn edit(&self, f: impl FnOnce(&mut Document)) {
        f(&mut self.document.lock().unwrap());
        self.emit_history_changed();
    }

    pub fn emit_history_changed(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn imports(&self) -> Vec<Document> {
        self.imports.lock().unwrap().clone()
    }

    pub fn fail_next_rasters(&self, count: usize) {
        self.raster_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_raster_delay(&self, delay: Duration) {
        *self.raster_delay.lock().unwrap() = delay;
    }

    pub fn raster_calls(&self) -> Vec<PreviewParams> {
        self.raster_calls.lock().unwrap().clone()
    }

    pub fn paints(&self) -> usize {
        self.paints.load(Ordering::SeqCst)
    }
}

impl Engine for FakeEngine {
    fn import_document(&self, document: &Document) -> Result<(), EngineError> {
        if self.fail_import.load(Ordering::SeqCst) {
            return Err(EngineError::Import("corrupt document".into()));
        }
        self.imports.lock().unwrap().push(document.clone());
        *self.document.lock().unwrap() = document.clone();
        Ok(())
    }

    fn export_document(&self) -> Result<Document, EngineError> {
        if self.fail_export.load(Ordering::SeqCst) {
            return Err(EngineError::Export("engine not ready".into()));
        }
        Ok(self.current())
    }

    fn add_object(&self, object: DesignObject) -> Result<(), EngineError> {
        self.edit(|doc| doc.objects.push(object));
        Ok(())
    }

    async fn raster_export(&self, params: &PreviewParams) -> Result<RasterImage, EngineError> {
        self.raster_calls.lock().unwrap().push(params.clone());
        let delay = *self.raster_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .raster_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Raster("renderer crashed".into()));
        }
        Ok(RasterImage::png(format!("{params:?}").into_bytes()))
    }

    fn subscribe(&self, _event: EngineEvent, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().unwrap().push((id, listener));
        id
    }

    fn unsubscribe(&self, _event: EngineEvent, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|(existing, _)| *existing != id);
    }

    async fn after_paint(&self) {
        self.paints.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct FakeBackend {
    responses: Mutex<HashMap<String, Result<FetchOutcome, BackendError>>>,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
    saves: Mutex<Vec<(String, Document)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, id: &str, document: Document) {
        self.responses
            .lock()
            .unwrap()
            .insert(id.to_string(), Ok(FetchOutcome::Found(document)));
    }

    pub fn fail(&self, id: &str, error: BackendError) {
        self.responses.lock().unwrap().insert(id.to_string(), Err(error));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> Vec<(String, Document)> {
        self.saves.lock().unwrap().clone()
    }
}

impl Backend for FakeBackend {
    async fn fetch_document_by_id(&self, id: &str) -> Result<FetchOutcome, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let response = self.responses.lock().unwrap().get(id).cloned();
        response.unwrap_or(Ok(FetchOutcome::NotFound))
    }

    async fn save_document(&self, id: &str, document: &Document) -> Result<(), BackendError> {
        self.saves
            .lock()
            .unwrap()
            .push((id.to_string(), document.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFonts {
    failing: Mutex<HashSet<String>>,
    loads: Mutex<Vec<FontRequest>>,
    registered: Mutex<Vec<SmolStr>>,
}

impl FakeFonts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_url(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn registered(&self) -> Vec<SmolStr> {
        self.registered.lock().unwrap().clone()
    }
}

impl FontRegistry for FakeFonts {
    type Handle = SmolStr;

    async fn load(&self, request: &FontRequest) -> Result<SmolStr, FontError> {
        self.loads.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;
        if self.failing.lock().unwrap().contains(&request.url) {
            return Err(FontError::Load {
                family: request.family.clone(),
                url: request.url.clone(),
                reason: "404".into(),
            });
        }
        Ok(request.family.clone())
    }

    fn register(&self, handle: &SmolStr) {
        self.registered.lock().unwrap().push(handle.clone());
    }
}
