//! Best-effort attribute extraction.
//!
//! Each field walks an ordered chain of [`AttributeSource`]s and takes the
//! first non-empty value. A source failing for one field has no effect on
//! the others, and nothing here fails the caller: a field with no
//! answer is left empty.

mod description;
mod embedded;
mod list_group;

pub use description::Description;
pub use embedded::{extract_path, EmbeddedJson};
pub use list_group::{iframe_source, ListGroup};

use chrono::Datelike;
use thiserror::Error;
use tracing::debug;

use super::http_client::Document;
use crate::models::{ExtractedRecord, Field};

/// Oldest model year accepted as plausible.
pub const MIN_MODEL_YEAR: i32 = 1940;

/// Internal per-field failure. Never escapes [`Extractor`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("embedded payload not found")]
    PayloadMissing,
    #[error("embedded payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("path {0} not present in payload")]
    PathMissing(String),
    #[error("attribute {0} not present")]
    AttributeMissing(String),
    #[error("no fallback for {0}")]
    NoFallback(&'static str),
}

/// One place a field's value can come from.
pub trait AttributeSource {
    fn name(&self) -> &'static str;

    fn attribute(&self, field: Field) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct Extractor {
    min_year: i32,
    max_year: i32,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Accept model years from 1940 through the current year.
    pub fn new() -> Self {
        Self::with_year_range(MIN_MODEL_YEAR, chrono::Local::now().year())
    }

    pub fn with_year_range(min_year: i32, max_year: i32) -> Self {
        Self { min_year, max_year }
    }

    /// Embedded JSON first, then the listing description.
    pub fn extract(&self, document: &Document, description: &str) -> ExtractedRecord {
        self.extract_embedded(document, description)
            .unwrap_or_else(|e| {
                debug!("No structured data on {}: {}", document.url, e);
                self.from_description(description)
            })
    }

    /// Like [`extract`](Self::extract), but fails when the page carries no
    /// usable payload so the caller can tell a complete record from a
    /// degraded one.
    pub fn extract_embedded(
        &self,
        document: &Document,
        description: &str,
    ) -> Result<ExtractedRecord, ExtractError> {
        let embedded = EmbeddedJson::parse(&document.body)?;
        let fallback = Description::parse(description);
        let chain: [&dyn AttributeSource; 2] = [&embedded, &fallback];
        Ok(self.extract_from(&chain))
    }

    /// Description heuristics alone, for items whose detail page
    /// could not be used.
    pub fn from_description(&self, description: &str) -> ExtractedRecord {
        let fallback = Description::parse(description);
        self.extract_from(&[&fallback as &dyn AttributeSource])
    }

    /// Resolve every field independently against `sources`, in order.
    pub fn extract_from(&self, sources: &[&dyn AttributeSource]) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();

        for field in Field::ALL {
            for source in sources {
                match source.attribute(field) {
                    Ok(value) if !value.trim().is_empty() => {
                        record.set(field, value.trim().to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("{} miss for {}: {}", source.name(), field.key(), e),
                }
            }
        }

        if !record.year.is_empty() {
            record.sanitize_year(self.min_year, self.max_year);
        }
        record
    }
}
