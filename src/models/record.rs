//! Extracted attributes and the merged output record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::work_item::{keys, IdentityKey, WorkItem};

/// Attribute extracted from a lot's detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Year,
    Make,
    Model,
    Hours,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Year, Field::Make, Field::Model, Field::Hours];

    /// Output column name.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Year => keys::YEAR,
            Self::Make => keys::MAKE,
            Self::Model => keys::MODEL,
            Self::Hours => keys::HOURS,
        }
    }
}

/// Typed extraction result. An empty string means "not found"; every
/// field is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub year: String,
    pub make: String,
    pub model: String,
    pub hours: String,
}

impl ExtractedRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Year => &self.year,
            Field::Make => &self.make,
            Field::Model => &self.model,
            Field::Hours => &self.hours,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Year => self.year = value,
            Field::Make => self.make = value,
            Field::Model => self.model = value,
            Field::Hours => self.hours = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    /// Blank a year that is not a plausible model year.
    pub fn sanitize_year(&mut self, min_year: i32, max_year: i32) {
        let plausible = self
            .year
            .parse::<i32>()
            .map(|y| (min_year..=max_year).contains(&y))
            .unwrap_or(false);
        if !plausible {
            self.year.clear();
        }
    }
}

/// How an output record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Detail page fetched and its structured data read.
    Complete,
    /// Built from the seed item's own fields.
    Degraded,
    /// Item could not be processed at all; written to the rejected log.
    Error,
}

/// A work item merged with its extracted attributes.
///
/// Equality (and therefore deduplication) is over the field map only;
/// the status is bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    fields: BTreeMap<String, String>,
    #[serde(skip)]
    status: RecordStatus,
}

impl PartialEq for OutputRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for OutputRecord {}

impl OutputRecord {
    /// Merge extracted attributes over the item's fields.
    pub fn complete(item: &WorkItem, extracted: &ExtractedRecord) -> Self {
        let mut fields = item.fields().clone();
        for field in Field::ALL {
            fields.insert(field.key().to_string(), extracted.get(field).to_string());
        }
        Self {
            fields,
            status: RecordStatus::Complete,
        }
    }

    /// Keep the item's own fields, filling only the attributes it lacks.
    pub fn degraded(item: &WorkItem, fallback: &ExtractedRecord) -> Self {
        Self {
            fields: Self::fill_missing(item, fallback),
            status: RecordStatus::Degraded,
        }
    }

    /// Record for an item that could not be processed.
    pub fn error(item: &WorkItem) -> Self {
        Self {
            fields: Self::fill_missing(item, &ExtractedRecord::default()),
            status: RecordStatus::Error,
        }
    }

    fn fill_missing(item: &WorkItem, fallback: &ExtractedRecord) -> BTreeMap<String, String> {
        let mut fields = item.fields().clone();
        for field in Field::ALL {
            let slot = fields.entry(field.key().to_string()).or_default();
            if slot.trim().is_empty() {
                *slot = fallback.get(field).to_string();
            }
        }
        fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey::from_fields(&self.fields)
    }
}
