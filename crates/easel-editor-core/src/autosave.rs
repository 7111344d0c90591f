//! Autosave scheduling.
//!
//! Two independent triggers write the live document to the session's
//! autosave slot: a periodic tick and a debounce after each edit. Every
//! firing reads a fresh export; nothing is cached between firings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use easel_common::EditorConfig;
use easel_common::perf::Stopwatch;

use crate::document::Document;
use crate::engine::{Engine, EngineEvent, ListenerId};
use crate::error::AutosaveError;
use crate::keys::SnapshotKey;
use crate::lifecycle::MountGuard;
use crate::store::SharedStore;
use crate::timer::TimerMultiplexer;

/// Callback handed the document that was just persisted.
pub type DocumentHook = Arc<dyn Fn(&Document) + Send + Sync>;

/// Host callbacks fired after successful autosave writes.
#[derive(Clone, Default)]
pub struct AutosaveHooks {
    /// After periodic and manual saves.
    pub on_save: Option<DocumentHook>,
    /// After edit-driven saves.
    pub on_change: Option<DocumentHook>,
}

impl fmt::Debug for AutosaveHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutosaveHooks")
            .field("on_save", &self.on_save.is_some())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// What caused a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Periodic,
    Debounced,
    Manual,
}

impl SaveTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Debounced => "debounced",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The live document had no objects; the slot was left alone.
    SkippedEmpty,
    /// The session was torn down before the write.
    SkippedUnmounted,
}

/// Export the live document and write it to one slot.
pub struct SnapshotWriter<E> {
    engine: Arc<E>,
    store: SharedStore,
    key: SnapshotKey,
    hooks: AutosaveHooks,
    guard: MountGuard,
}

impl<E: Engine> SnapshotWriter<E> {
    pub fn new(
        engine: Arc<E>,
        store: SharedStore,
        key: SnapshotKey,
        hooks: AutosaveHooks,
        guard: MountGuard,
    ) -> Self {
        Self {
            engine,
            store,
            key,
            hooks,
            guard,
        }
    }

    pub fn key(&self) -> &SnapshotKey {
        &self.key
    }

    pub fn save(&self, trigger: SaveTrigger) -> Result<SaveOutcome, AutosaveError> {
        if !self.guard.is_mounted() {
            return Ok(SaveOutcome::SkippedUnmounted);
        }

        let mut watch = Stopwatch::start();
        let document = self.engine.export_document().map_err(AutosaveError::Export)?;
        let export_ms = watch.lap_ms();

        if !document.has_objects() {
            tracing::trace!(key = %self.key, trigger = trigger.as_str(), "nothing to autosave");
            return Ok(SaveOutcome::SkippedEmpty);
        }

        self.store.put(&self.key, &document)?;
        let write_ms = watch.lap_ms();
        tracing::debug!(
            key = %self.key,
            trigger = trigger.as_str(),
            objects = document.objects.len(),
            export_ms,
            write_ms,
            "autosaved"
        );
        metrics::counter!("easel_autosave_writes_total", "trigger" => trigger.as_str()).increment(1);

        let hook = match trigger {
            SaveTrigger::Debounced => &self.hooks.on_change,
            SaveTrigger::Periodic | SaveTrigger::Manual => &self.hooks.on_save,
        };
        if let Some(hook) = hook {
            hook(&document);
        }
        Ok(SaveOutcome::Saved)
    }

    /// Save, counting failures. Used by the timer lines, which log errors.
    fn save_counted(&self, trigger: SaveTrigger) -> Result<SaveOutcome, AutosaveError> {
        self.save(trigger).inspect_err(|_| {
            metrics::counter!("easel_autosave_failures_total", "trigger" => trigger.as_str())
                .increment(1);
        })
    }
}

/// Keeps a session's autosave slot current while it is mounted.
pub struct AutosaveScheduler<E: Engine> {
    engine: Arc<E>,
    writer: Arc<SnapshotWriter<E>>,
    timers: TimerMultiplexer<()>,
    listener: Option<ListenerId>,
}

impl<E: Engine> AutosaveScheduler<E> {
    /// Start both timer lines and subscribe to engine edits.
    pub fn start(writer: Arc<SnapshotWriter<E>>, config: &EditorConfig, guard: &MountGuard) -> Self {
        let engine = writer.engine.clone();
        let periodic_writer = writer.clone();
        let debounced_writer = writer.clone();
        let timers = TimerMultiplexer::start(
            &guard.child_token(),
            config.autosave_interval,
            config.debounce,
            move || periodic_writer.save_counted(SaveTrigger::Periodic),
            move |()| debounced_writer.save_counted(SaveTrigger::Debounced),
        );

        let trigger = timers.trigger_handle();
        let listener = engine.subscribe(
            EngineEvent::HistoryChanged,
            Arc::new(move || {
                trigger.trigger(());
            }),
        );

        tracing::info!(
            key = %writer.key(),
            interval_ms = whole_millis(config.autosave_interval),
            debounce_ms = whole_millis(config.debounce),
            "autosave started"
        );
        Self {
            engine,
            writer,
            timers,
            listener: Some(listener),
        }
    }

    pub fn key(&self) -> &SnapshotKey {
        self.writer.key()
    }

    /// Write immediately, outside the timer schedule.
    pub fn save_now(&self) -> Result<SaveOutcome, AutosaveError> {
        self.writer.save(SaveTrigger::Manual)
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Cancel both timer lines, then drop the edit subscription. Idempotent.
    pub fn stop(&mut self) {
        self.timers.cancel_all();
        if let Some(id) = self.listener.take() {
            self.engine.unsubscribe(EngineEvent::HistoryChanged, id);
            tracing::debug!(key = %self.writer.key(), "autosave stopped");
        }
    }
}

impl<E: Engine> Drop for AutosaveScheduler<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::document::DesignObject;
    use crate::store::{MemorySnapshotStore, SnapshotStore};
    use crate::test_support::{FakeEngine, document_with_objects};
    use tokio::time::sleep;

    #[test]
    fn huge_durations_log_saturated() {
        assert_eq!(whole_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    struct Harness {
        engine: Arc<FakeEngine>,
        store: Arc<MemorySnapshotStore>,
        guard: MountGuard,
        key: SnapshotKey,
    }

    impl Harness {
        fn new(document: Document) -> Self {
            Self {
                engine: FakeEngine::with_document(document),
                store: Arc::new(MemorySnapshotStore::new()),
                guard: MountGuard::new(),
                key: SnapshotKey::for_document("7"),
            }
        }

        fn writer(&self, hooks: AutosaveHooks) -> Arc<SnapshotWriter<FakeEngine>> {
            Arc::new(SnapshotWriter::new(
                self.engine.clone(),
                self.store.clone(),
                self.key.clone(),
                hooks,
                self.guard.clone(),
            ))
        }

        fn start(&self) -> AutosaveScheduler<FakeEngine> {
            AutosaveScheduler::start(self.writer(AutosaveHooks::default()), &EditorConfig::default(), &self.guard)
        }

        fn stored(&self) -> Option<Document> {
            self.store.get(&self.key).unwrap().map(|r| r.document)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_tick_writes_the_live_document() {
        let h = Harness::new(document_with_objects("Card", 2));
        let _scheduler = h.start();

        sleep(Duration::from_secs(29)).await;
        assert_eq!(h.stored(), None);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(h.stored(), Some(h.engine.current()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_documents_are_never_written() {
        let h = Harness::new(Document::with_frame(100.0, 100.0));
        let scheduler = h.start();

        h.engine.emit_history_changed();
        sleep(Duration::from_secs(61)).await;
        assert_eq!(h.stored(), None);
        assert_eq!(scheduler.save_now().unwrap(), SaveOutcome::SkippedEmpty);
        assert!(h.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_burst_produces_one_write_with_latest_state() {
        let h = Harness::new(document_with_objects("Card", 1));
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = saves.clone();
        let hooks = AutosaveHooks {
            on_change: Some(Arc::new(move |doc: &Document| sink.lock().unwrap().push(doc.objects.len()))),
            on_save: None,
        };
        let _scheduler = AutosaveScheduler::start(h.writer(hooks), &EditorConfig::default(), &h.guard);

        for _ in 0..3 {
            h.engine.add_object(DesignObject::text("Inter", "https://fonts.example/inter.ttf")).unwrap();
            sleep(Duration::from_millis(100)).await;
        }
        assert!(saves.lock().unwrap().is_empty());

        sleep(Duration::from_millis(250)).await;
        assert_eq!(*saves.lock().unwrap(), vec![4]);
        assert_eq!(h.stored().map(|d| d.objects.len()), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn export_failure_skips_the_write_and_keeps_running() {
        let h = Harness::new(document_with_objects("Card", 1));
        let _scheduler = h.start();

        h.engine.fail_export.store(true, std::sync::atomic::Ordering::SeqCst);
        sleep(Duration::from_secs(31)).await;
        assert_eq!(h.stored(), None);

        h.engine.fail_export.store(false, std::sync::atomic::Ordering::SeqCst);
        sleep(Duration::from_secs(30)).await;
        assert!(h.stored().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_unsubscribes_and_silences_both_lines() {
        let h = Harness::new(document_with_objects("Card", 1));
        let mut scheduler = h.start();
        assert_eq!(h.engine.listener_count(), 1);

        h.engine.emit_history_changed();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(h.engine.listener_count(), 0);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(h.stored(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_stops_it() {
        let h = Harness::new(document_with_objects("Card", 1));
        drop(h.start());
        assert_eq!(h.engine.listener_count(), 0);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.stored(), None);
    }

    #[tokio::test]
    async fn manual_save_fires_on_save_and_respects_teardown() {
        let h = Harness::new(document_with_objects("Card", 1));
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        let hooks = AutosaveHooks {
            on_save: Some(Arc::new(move |_: &Document| *sink.lock().unwrap() += 1)),
            on_change: None,
        };
        let writer = h.writer(hooks);

        assert_eq!(writer.save(SaveTrigger::Manual).unwrap(), SaveOutcome::Saved);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(h.store.keys().unwrap(), vec![h.key.clone()]);

        h.guard.teardown();
        assert_eq!(writer.save(SaveTrigger::Manual).unwrap(), SaveOutcome::SkippedUnmounted);
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
