//! Preview excursions and snapshot recovery.
//!
//! Opening a preview captures the live document into the preview slot before
//! anything else happens. Closing always restores from that slot, after the
//! host has painted, so whatever the preview did to the engine is undone.
//!
//! ```text
//! Idle -> CapturingSnapshot -> CollectingParameters <-> BuildingImage -> ShowingResult
//!   ^                                                                        |
//!   +---------- RestoringSnapshot <- Closing <-------- (close from any) -----+
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use n0_future::time::Instant;
use smol_str::SmolStr;

use crate::document::Document;
use crate::engine::{Engine, PreviewParams, RasterImage};
use crate::error::{AutosaveError, PreviewError, RestoreFailure};
use crate::keys::SnapshotKey;
use crate::lifecycle::MountGuard;
use crate::store::SharedStore;


/// Where a preview excursion currently is.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    CapturingSnapshot,
    CollectingParameters {
        params: PreviewParams,
    },
    BuildingImage {
        params: PreviewParams,
    },
    ShowingResult {
        params: PreviewParams,
        image: RasterImage,
    },
    Closing,
    RestoringSnapshot,
}

impl PreviewState {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CapturingSnapshot => "capturing",
            Self::CollectingParameters { .. } => "collecting",
            Self::BuildingImage { .. } => "building",
            Self::ShowingResult { .. } => "showing",
            Self::Closing => "closing",
            Self::RestoringSnapshot => "restoring",
        }
    }

    fn params(&self) -> Option<&PreviewParams> {
        match self {
            Self::CollectingParameters { params }
            | Self::BuildingImage { params }
            | Self::ShowingResult { params, .. } => Some(params),
            _ => None,
        }
    }
}

/// Result of closing a preview.
#[derive(Debug)]
pub enum CloseOutcome {
    /// The captured document is live again.
    Restored,
    /// The preview slot was empty.
    NothingCaptured,
    RestoreFailed(RestoreFailure),
    /// The preview was not open.
    NotOpen,
    /// The session was torn down before the restore ran.
    Discarded,
}

/// Result of an explicit recovery request.
#[derive(Debug)]
pub enum RecoveryOutcome {
    Recovered { key: SnapshotKey },
    NothingToRecover,
    Failed { key: SnapshotKey, reason: RestoreFailure },
}

impl RecoveryOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Recovered { .. } => "recovered",
            Self::NothingToRecover => "nothing",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Every distinct parameter name referenced by the document's objects.
pub fn discover_parameters(document: &Document) -> PreviewParams {
    document
        .objects
        .iter()
        .flat_map(|object| object.metadata.keys.iter())
        .filter(|key| !key.trim().is_empty())
        .map(|key| (key.clone(), String::new()))
        .collect()
}

#[derive(Debug, Default)]
struct Inner {
    state: PreviewState,
    /// Bumped on every close so a build that outlives its preview is dropped.
    epoch: u64,
    busy_until: Option<Instant>,
}

/// Drives preview excursions and snapshot recovery for one session.
pub struct PreviewCoordinator<E> {
    engine: Arc<E>,
    store: SharedStore,
    temp_key: SnapshotKey,
    autosave_key: SnapshotKey,
    cooldown: Duration,
    guard: MountGuard,
    inner: Mutex<Inner>,
}

impl<E: Engine> PreviewCoordinator<E> {
    pub fn new(
        engine: Arc<E>,
        store: SharedStore,
        autosave_key: SnapshotKey,
        cooldown: Duration,
        guard: MountGuard,
    ) -> Self {
        Self {
            engine,
            store,
            temp_key: SnapshotKey::preview_temp(),
            autosave_key,
            cooldown,
            guard,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PreviewState {
        self.lock().state.clone()
    }

    /// True while an image is rendering, a close is in flight, or the
    /// post-close cooldown has not elapsed. Hosts disable preview controls
    /// while busy.
    pub fn is_busy(&self) -> bool {
        let inner = self.lock();
        let cooling = inner.busy_until.is_some_and(|until| Instant::now() < until);
        cooling
            || matches!(
                inner.state,
                PreviewState::BuildingImage { .. }
                    | PreviewState::Closing
                    | PreviewState::RestoringSnapshot
            )
    }

    /// Parameters being collected or used for the current image.
    pub fn parameters(&self) -> Option<PreviewParams> {
        self.lock().state.params().cloned()
    }

    pub fn result_image(&self) -> Option<RasterImage> {
        match &self.lock().state {
            PreviewState::ShowingResult { image, .. } => Some(image.clone()),
            _ => None,
        }
    }

    /// Open a preview.
    ///
    /// The live document is captured to the preview slot first; if that
    /// fails the preview stays closed. A document with no template parameters
    /// is rendered straight away. Returns the state reached.
    pub async fn open(&self) -> Result<PreviewState, PreviewError> {
        let params = {
            let mut inner = self.lock();
            if !self.guard.is_mounted() {
                return Err(PreviewError::Unmounted);
            }
            if inner.state.is_open() {
                return Err(PreviewError::AlreadyOpen);
            }
            if inner.busy_until.is_some_and(|until| Instant::now() < until) {
                return Err(PreviewError::Busy);
            }
            inner.state = PreviewState::CapturingSnapshot;

            let document = match self.capture() {
                Ok(document) => document,
                Err(e) => {
                    inner.state = PreviewState::Idle;
                    tracing::warn!(error = %e, "preview capture failed; preview not opened");
                    return Err(PreviewError::Capture(e));
                }
            };

            let params = discover_parameters(&document);
            tracing::debug!(params = params.len(), "preview opened");
            inner.state = PreviewState::CollectingParameters {
                params: params.clone(),
            };
            params
        };

        if params.is_empty() {
            // Nothing to ask for; render immediately. A failure leaves the
            // preview collecting so the host can retry.
            if let Err(e) = self.build().await {
                tracing::debug!(error = %e, "initial preview build did not complete");
            }
        }
        Ok(self.state())
    }

    fn capture(&self) -> Result<Document, AutosaveError> {
        let document = self.engine.export_document().map_err(AutosaveError::Export)?;
        self.store.put(&self.temp_key, &document)?;
        Ok(document)
    }

    /// Set one template parameter while collecting.
    pub fn set_parameter(&self, key: &str, value: impl Into<String>) -> Result<(), PreviewError> {
        let mut inner = self.lock();
        match &mut inner.state {
            PreviewState::CollectingParameters { params } => match params.get_mut(key) {
                Some(slot) => {
                    *slot = value.into();
                    Ok(())
                }
                None => Err(PreviewError::UnknownParameter(SmolStr::new(key))),
            },
            PreviewState::Idle => Err(PreviewError::NotOpen),
            _ => Err(PreviewError::Busy),
        }
    }

    /// Render the image with the collected parameters.
    ///
    /// A failure returns to collecting. If the preview is closed while the
    /// image renders, the result is discarded.
    pub async fn build(&self) -> Result<RasterImage, PreviewError> {
        let (params, epoch) = {
            let mut inner = self.lock();
            let params = match &inner.state {
                PreviewState::CollectingParameters { params }
                | PreviewState::ShowingResult { params, .. } => params.clone(),
                PreviewState::Idle => return Err(PreviewError::NotOpen),
                _ => return Err(PreviewError::Busy),
            };
            inner.state = PreviewState::BuildingImage {
                params: params.clone(),
            };
            (params, inner.epoch)
        };

        let result = self.engine.raster_export(&params).await;

        let mut inner = self.lock();
        let current = inner.epoch == epoch
            && self.guard.is_mounted()
            && matches!(inner.state, PreviewState::BuildingImage { .. });
        if !current {
            tracing::debug!("discarding preview image rendered after close");
            return Err(PreviewError::Superseded);
        }
        match result {
            Ok(image) => {
                inner.state = PreviewState::ShowingResult {
                    params,
                    image: image.clone(),
                };
                Ok(image)
            }
            Err(e) => {
                tracing::warn!(error = %e, "preview image failed to render");
                inner.state = PreviewState::CollectingParameters { params };
                Err(PreviewError::Build(e))
            }
        }
    }

    /// Close the preview and restore the captured document.
    ///
    /// The restore waits for the next paint. Opening again is refused until
    /// the cooldown after this call has elapsed.
    pub async fn close(&self) -> CloseOutcome {
        {
            let mut inner = self.lock();
            match inner.state {
                PreviewState::Idle => return CloseOutcome::NotOpen,
                PreviewState::Closing | PreviewState::RestoringSnapshot => {
                    return CloseOutcome::NotOpen;
                }
                _ => {}
            }
            inner.state = PreviewState::Closing;
            inner.epoch += 1;
            inner.busy_until = Some(Instant::now() + self.cooldown);
        }

        self.engine.after_paint().await;

        if !self.guard.is_mounted() {
            self.lock().state = PreviewState::Idle;
            return CloseOutcome::Discarded;
        }
        self.lock().state = PreviewState::RestoringSnapshot;

        let outcome = match self.store.get(&self.temp_key) {
            Ok(Some(record)) => match self.engine.import_document(&record.document) {
                Ok(()) => CloseOutcome::Restored,
                Err(e) => CloseOutcome::RestoreFailed(RestoreFailure::Import(e)),
            },
            Ok(None) => CloseOutcome::NothingCaptured,
            Err(e) => CloseOutcome::RestoreFailed(RestoreFailure::Read(e)),
        };
        match &outcome {
            CloseOutcome::RestoreFailed(reason) => {
                tracing::warn!(error = %reason, "restoring pre-preview document failed")
            }
            CloseOutcome::NothingCaptured => {
                tracing::warn!("preview slot empty on close; engine left as is")
            }
            _ => tracing::debug!("preview closed"),
        }

        self.lock().state = PreviewState::Idle;
        outcome
    }

    /// Re-import the most recent snapshot.
    ///
    /// The preview slot is tried first, then the session's autosave slot.
    /// A slot that cannot be read is skipped; if no slot yields a document
    /// the last read failure is reported.
    pub fn recover(&self) -> RecoveryOutcome {
        let mut last_failure = None;
        for key in [&self.temp_key, &self.autosave_key] {
            match self.store.get(key) {
                Ok(Some(record)) => {
                    let outcome = match self.engine.import_document(&record.document) {
                        Ok(()) => {
                            tracing::info!(key = %key, written_at = %record.written_at, "recovered snapshot");
                            RecoveryOutcome::Recovered { key: key.clone() }
                        }
                        Err(e) => {
                            tracing::error!(key = %key, error = %e, "snapshot import failed");
                            RecoveryOutcome::Failed {
                                key: key.clone(),
                                reason: RestoreFailure::Import(e),
                            }
                        }
                    };
                    return self.count(outcome);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "snapshot unreadable, trying next");
                    last_failure = Some((key.clone(), e));
                }
            }
        }

        let outcome = match last_failure {
            Some((key, e)) => RecoveryOutcome::Failed {
                key,
                reason: RestoreFailure::Read(e),
            },
            None => {
                tracing::info!("no snapshot to recover");
                RecoveryOutcome::NothingToRecover
            }
        };
        self.count(outcome)
    }

    fn count(&self, outcome: RecoveryOutcome) -> RecoveryOutcome {
        metrics::counter!("easel_recoveries_total", "outcome" => outcome.label()).increment(1);
        outcome
    }
}
