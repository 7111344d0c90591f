use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::sleep;

use super::*;
use crate::document::Document;
use crate::preview::{CloseOutcome, PreviewState};
use crate::store::{MemorySnapshotStore, SnapshotStore};
use crate::test_support::{FakeBackend, FakeEngine, FakeFonts, document_with_objects};

type TestSession = EditorSession<FakeEngine, FakeBackend, FakeFonts>;

struct Host {
    engine: Arc<FakeEngine>,
    backend: Arc<FakeBackend>,
    store: Arc<MemorySnapshotStore>,
    context: SessionContext<FakeEngine, FakeBackend, FakeFonts>,
}

impl Host {
    fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    fn with_config(config: EditorConfig) -> Self {
        let engine = FakeEngine::new();
        let backend = FakeBackend::new();
        let store = Arc::new(MemorySnapshotStore::new());
        let context = SessionContext::new(engine.clone(), backend.clone(), FakeFonts::new(), store.clone())
            .with_config(config);
        Self {
            engine,
            backend,
            store,
            context,
        }
    }

    fn mount(&self, identity: SessionIdentity) -> TestSession {
        EditorSession::mount(self.context.clone(), identity)
    }

    fn slot(&self, key: &SnapshotKey) -> Option<Document> {
        self.store.get(key).unwrap().map(|r| r.document)
    }
}

#[tokio::test(start_paused = true)]
async fn untitled_session_restores_then_autosaves_to_default_slot() {
    let host = Host::new();
    let draft = document_with_objects("Draft", 1);
    host.store.put(&SnapshotKey::default_autosave(), &draft).unwrap();

    let mut session = host.mount(SessionIdentity::untitled());
    assert_eq!(session.autosave_key(), &SnapshotKey::default_autosave());
    assert!(matches!(session.wait_loaded().await.unwrap(), LoadOutcome::Restored { .. }));
    assert_eq!(host.engine.current(), draft);

    session
        .add_object(DesignObject::text("Inter", "https://fonts.example/inter.ttf"))
        .unwrap();
    sleep(Duration::from_millis(350)).await;
    assert_eq!(
        host.slot(&SnapshotKey::default_autosave()).map(|d| d.objects.len()),
        Some(2)
    );
    assert_eq!(session.display_name(), UNTITLED);
}

#[tokio::test(start_paused = true)]
async fn saved_design_autosaves_to_its_own_slot_only() {
    let host = Host::new();
    host.backend.insert("42", document_with_objects("Launch", 1));

    let mut session = host.mount(SessionIdentity::for_document("42"));
    assert!(matches!(session.wait_loaded().await.unwrap(), LoadOutcome::Loaded { .. }));
    assert_eq!(session.display_name(), "Launch");
    assert_eq!(
        session.current_document().map(|w| w.source),
        Some(LoadSource::Remote { id: "42".into() })
    );

    sleep(Duration::from_secs(31)).await;
    assert_eq!(host.store.keys().unwrap(), vec![SnapshotKey::for_document("42")]);
    assert_eq!(host.slot(&SnapshotKey::default_autosave()), None);
}

#[tokio::test]
async fn missing_design_reports_through_the_hook() {
    let mut host = Host::new();
    let reported = Arc::new(AtomicUsize::new(0));
    let sink = reported.clone();
    host.context.hooks.on_load_error = Some(Arc::new(move |e: &LoadError| {
        assert!(matches!(e, LoadError::NotFound { .. }));
        sink.fetch_add(1, Ordering::SeqCst);
    }));

    let mut session = host.mount(SessionIdentity::for_document("nope"));
    let err = session.wait_loaded().await.unwrap_err();
    assert!(matches!(err, LoadError::NotFound { id } if id == "nope"));
    assert_eq!(reported.load(Ordering::SeqCst), 1);

    // Cached for later callers.
    assert!(session.wait_loaded().await.is_err());
    assert_eq!(reported.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_mid_load_discards_everything() {
    let mut host = Host::new();
    let reported = Arc::new(AtomicUsize::new(0));
    let sink = reported.clone();
    host.context.hooks.on_load_error = Some(Arc::new(move |_: &LoadError| {
        sink.fetch_add(1, Ordering::SeqCst);
    }));
    host.backend.insert("42", document_with_objects("Launch", 1));
    host.backend.set_delay(Duration::from_secs(2));

    let session = host.mount(SessionIdentity::for_document("42"));
    sleep(Duration::from_millis(100)).await;
    session.unmount();
    assert_eq!(host.engine.listener_count(), 0);

    sleep(Duration::from_secs(60)).await;
    assert!(host.engine.imports().is_empty());
    assert!(host.store.is_empty());
    assert_eq!(reported.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn navigating_replaces_timers_and_slot() {
    let host = Host::new();
    host.backend.insert("1", document_with_objects("One", 1));
    host.backend.insert("2", document_with_objects("Two", 1));

    let mut first = host.mount(SessionIdentity::for_document("1"));
    first.wait_loaded().await.unwrap();
    assert_eq!(host.engine.listener_count(), 1);

    let mut second = first.navigate(SessionIdentity::for_document("2"));
    assert_eq!(host.engine.listener_count(), 1);
    assert_eq!(second.autosave_key(), &SnapshotKey::for_document("2"));
    second.wait_loaded().await.unwrap();

    host.engine.emit_history_changed();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(host.store.keys().unwrap(), vec![SnapshotKey::for_document("2")]);
}

#[tokio::test(start_paused = true)]
async fn disabled_autosave_only_saves_on_request() {
    let config = EditorConfig {
        enable_autosave: false,
        ..EditorConfig::default()
    };
    let host = Host::with_config(config);
    let payload = document_with_objects("Given", 2);

    let mut session = host.mount(SessionIdentity::untitled().with_payload(payload.clone()));
    session.wait_loaded().await.unwrap();
    assert!(!session.autosave_enabled());
    assert_eq!(host.engine.listener_count(), 0);

    host.engine.emit_history_changed();
    sleep(Duration::from_secs(90)).await;
    assert!(host.store.is_empty());

    assert_eq!(session.save_now().unwrap(), SaveOutcome::Saved);
    assert_eq!(host.slot(&SnapshotKey::default_autosave()), Some(payload));
}

#[tokio::test]
async fn configured_default_slot_is_used_for_untitled_sessions() {
    let config = EditorConfig {
        autosave_key: Some("team_board".into()),
        ..EditorConfig::default()
    };
    let host = Host::with_config(config);
    let session = host.mount(SessionIdentity::untitled());
    assert_eq!(session.autosave_key().as_str(), "team_board");

    let saved = host.mount(SessionIdentity::for_document("3"));
    assert_eq!(saved.autosave_key().as_str(), "design_3");
}

#[tokio::test]
async fn export_json_uses_the_session_name() {
    let host = Host::new();
    let payload = document_with_objects("Menu card", 1);
    let mut session = host.mount(SessionIdentity::untitled().with_payload(payload.clone()));
    session.wait_loaded().await.unwrap();

    let export = session.export_json().unwrap();
    assert_eq!(export.file_name, "Menu card.json");
    assert_eq!(Document::from_json_str(&export.contents).unwrap(), payload);
}

#[tokio::test]
async fn remote_save_needs_a_design_id() {
    let host = Host::new();
    let mut untitled = host.mount(SessionIdentity::untitled());
    untitled.wait_loaded().await.unwrap();
    assert!(matches!(
        untitled.save_remote().await,
        Err(RemoteSaveError::NoDocumentId)
    ));
    drop(untitled);

    host.backend.insert("8", document_with_objects("Poster", 1));
    let mut session = host.mount(SessionIdentity::for_document("8"));
    session.wait_loaded().await.unwrap();
    session.save_remote().await.unwrap();

    let saves = host.backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].0, "8");
    assert_eq!(saves[0].1.display_name(), "Poster");
}

#[tokio::test]
async fn preview_round_trip_through_the_session() {
    let host = Host::new();
    let payload = document_with_objects("Template", 1);
    let mut session = host.mount(SessionIdentity::untitled().with_payload(payload.clone()));
    session.wait_loaded().await.unwrap();

    let state = session.preview().open().await.unwrap();
    assert!(matches!(state, PreviewState::CollectingParameters { .. }));
    session.preview().set_parameter("field0", "Hello").unwrap();
    session.preview().build().await.unwrap();

    host.engine.edit(|doc| doc.objects.clear());
    assert!(matches!(session.preview().close().await, CloseOutcome::Restored));
    assert_eq!(host.engine.current(), payload);

    assert!(matches!(
        session.recover(),
        RecoveryOutcome::Recovered { key } if key == SnapshotKey::preview_temp()
    ));
}
