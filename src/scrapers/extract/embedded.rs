//! Structured attributes embedded in a detail page's trailing script.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{AttributeSource, ExtractError};
use crate::models::Field;

static PAYLOAD_ANCHOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[\]\)\.concat\((.*)\)</script></body>").ok());

const DATA_ITEMS_PATH: &str = "o.w.0.2.model.modules.ABOUT_THIS_ITEM.sections.features.dataItems";
const VALUE_PATH: &str = "values.0.textSpans.0.text";

/// Extract a value from nested JSON using dot-notation path.
pub fn extract_path<'a>(data: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return data;
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).unwrap_or(&Value::Null),
            Value::Array(arr) => match key.parse::<usize>() {
                Ok(idx) => arr.get(idx).unwrap_or(&Value::Null),
                Err(_) => &Value::Null,
            },
            _ => &Value::Null,
        };
    }

    current
}

/// The "about this item" feature list of a detail page.
#[derive(Debug, Clone)]
pub struct EmbeddedJson {
    data_items: Value,
}

impl EmbeddedJson {
    pub fn parse(html: &str) -> Result<Self, ExtractError> {
        let anchor = PAYLOAD_ANCHOR
            .as_ref()
            .ok_or(ExtractError::PayloadMissing)?;
        let payload = anchor
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or(ExtractError::PayloadMissing)?;

        let json: Value = serde_json::from_str(payload.as_str())?;
        let data_items = extract_path(&json, DATA_ITEMS_PATH);
        if data_items.is_null() {
            return Err(ExtractError::PathMissing(DATA_ITEMS_PATH.to_string()));
        }

        Ok(Self {
            data_items: data_items.clone(),
        })
    }

    fn attribute_name(field: Field) -> &'static str {
        match field {
            Field::Year => "modelYear",
            Field::Make => "make",
            Field::Model => "model",
            Field::Hours => "hours",
        }
    }
}

impl AttributeSource for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded-json"
    }

    fn attribute(&self, field: Field) -> Result<String, ExtractError> {
        let attribute = Self::attribute_name(field);
        let entry = self
            .data_items
            .get(attribute)
            .ok_or_else(|| ExtractError::AttributeMissing(attribute.to_string()))?;

        extract_path(entry, VALUE_PATH)
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExtractError::AttributeMissing(attribute.to_string()))
    }
}
