//! `Key: Value` attribute lists from a lot's description iframe.

use std::collections::HashMap;

use scraper::{Html, Selector};

use super::{AttributeSource, ExtractError};
use crate::models::Field;

/// `src` of the description iframe on a detail page, if any.
pub fn iframe_source(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("iframe#desc_ifr").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
}

/// Attributes listed under `div.container ul.list-group`.
#[derive(Debug, Clone, Default)]
pub struct ListGroup {
    entries: HashMap<String, String>,
}

impl ListGroup {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut entries = HashMap::new();

        let Ok(items) = Selector::parse("div.container ul.list-group li") else {
            return Self { entries };
        };

        for item in document.select(&items) {
            let text = item.text().collect::<String>();
            let parts: Vec<&str> = text.split(':').collect();
            // Values with embedded colons are ambiguous; skip them.
            if let [key, value] = parts.as_slice() {
                let key = key.trim();
                if !key.is_empty() {
                    entries.insert(key.to_string(), value.trim().to_string());
                }
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    fn label(field: Field) -> &'static str {
        match field {
            Field::Year => "Year",
            Field::Make => "Make",
            Field::Model => "Model",
            Field::Hours => "Hours",
        }
    }
}

impl AttributeSource for ListGroup {
    fn name(&self) -> &'static str {
        "list-group"
    }

    fn attribute(&self, field: Field) -> Result<String, ExtractError> {
        let label = Self::label(field);
        self.get(label)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::AttributeMissing(label.to_string()))
    }
}
