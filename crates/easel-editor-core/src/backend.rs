//! Remote document storage abstraction.

use std::future::Future;

use serde_json::Value;

use crate::document::Document;
use crate::error::BackendError;

/// Result of looking up a design by id.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Document),
    /// The backend answered, but has no such design.
    NotFound,
}

impl FetchOutcome {
    /// Interpret a raw backend response.
    ///
    /// The backend signals a missing design with `null` or with an
    /// `{"object": "error", ...}` body. Design records keep the engine
    /// document under `canvas_data`; the record's `name` is used when the
    /// document itself has none.
    pub fn from_response(response: Value) -> Result<Self, BackendError> {
        if response.is_null() || response.get("object").and_then(Value::as_str) == Some("error") {
            return Ok(Self::NotFound);
        }

        let record_name = response
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let document_value = match response.get("canvas_data") {
            Some(canvas) if canvas.is_object() => canvas.clone(),
            _ => response,
        };

        let mut document: Document = serde_json::from_value(document_value)
            .map_err(|e| BackendError::InvalidResponse(e.to_string().into()))?;
        if document.name.is_none() {
            document.name = record_name.map(Into::into);
        }
        Ok(Self::Found(document))
    }
}

/// Remote design storage.
pub trait Backend: Send + Sync + 'static {
    fn fetch_document_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<FetchOutcome, BackendError>> + Send;

    fn save_document(
        &self,
        id: &str,
        document: &Document,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
