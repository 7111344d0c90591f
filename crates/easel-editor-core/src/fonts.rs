//! Font preloading.
//!
//! Before a document is imported, every font its text objects reference is
//! loaded in parallel and registered with the host. One font failing never
//! blocks the others or the import.

use std::collections::HashSet;
use std::future::Future;

use smol_str::SmolStr;

use crate::document::Document;
use crate::error::FontError;

/// Face descriptor passed to the host's font loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontStyle {
    pub style: SmolStr,
    pub weight: u16,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            style: SmolStr::new_static("normal"),
            weight: 400,
        }
    }
}

/// One font to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontRequest {
    pub family: SmolStr,
    pub url: String,
    pub style: FontStyle,
}

/// The host's font machinery.
pub trait FontRegistry: Send + Sync + 'static {
    /// Loaded face, opaque to the coordinator.
    type Handle: Send;

    fn load(&self, request: &FontRequest)
    -> impl Future<Output = Result<Self::Handle, FontError>> + Send;

    /// Make a loaded face available for rendering.
    fn register(&self, handle: &Self::Handle);
}

/// Settled result of one font load.
#[derive(Debug)]
pub enum FontOutcome<H> {
    Loaded(H),
    Failed(FontError),
}

impl<H> From<Result<H, FontError>> for FontOutcome<H> {
    fn from(result: Result<H, FontError>) -> Self {
        match result {
            Ok(handle) => Self::Loaded(handle),
            Err(e) => Self::Failed(e),
        }
    }
}

/// What happened to each requested font.
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    pub loaded: Vec<FontRequest>,
    pub failed: Vec<FontError>,
}

impl PreloadReport {
    pub fn requested(&self) -> usize {
        self.loaded.len() + self.failed.len()
    }

    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Font requests for every text-bearing object, in first-use order.
///
/// Deduplicated by family and url. Objects missing either are skipped.
pub fn collect_font_requests(document: &Document) -> Vec<FontRequest> {
    let mut seen = HashSet::new();
    document
        .text_objects()
        .filter_map(|object| {
            let family = object.metadata.font_family.as_ref()?;
            let url = object.metadata.font_url.as_deref()?;
            if family.trim().is_empty() || url.trim().is_empty() {
                return None;
            }
            Some(FontRequest {
                family: family.clone(),
                url: url.to_string(),
                style: FontStyle::default(),
            })
        })
        .filter(|request| seen.insert((request.family.clone(), request.url.clone())))
        .collect()
}

/// Load and register every font `document` references.
///
/// Resolves once every load has settled. Failures are logged and counted.
pub async fn preload_fonts<R: FontRegistry>(document: &Document, registry: &R) -> PreloadReport {
    let requests = collect_font_requests(document);
    if requests.is_empty() {
        return PreloadReport::default();
    }

    let settled = n0_future::join_all(requests.into_iter().map(|request| async move {
        let outcome = FontOutcome::from(registry.load(&request).await);
        (request, outcome)
    }))
    .await;

    let mut report = PreloadReport::default();
    for (request, outcome) in settled {
        match outcome {
            FontOutcome::Loaded(handle) => {
                registry.register(&handle);
                report.loaded.push(request);
            }
            FontOutcome::Failed(e) => {
                tracing::warn!(family = %request.family, url = %request.url, error = %e, "font failed to load");
                metrics::counter!("easel_font_load_failures_total").increment(1);
                report.failed.push(e);
            }
        }
    }
    tracing::debug!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "font preload settled"
    );
    report
}
