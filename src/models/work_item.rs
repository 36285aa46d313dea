//! Work items discovered on listing pages or loaded from a seed table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical field names shared by work items and output records.
pub mod keys {
    pub const LINK: &str = "link";
    pub const PRICE: &str = "price";
    pub const DATE: &str = "date";
    pub const DESC: &str = "desc";
    pub const YEAR: &str = "year";
    pub const MAKE: &str = "make";
    pub const MODEL: &str = "model";
    pub const HOURS: &str = "hours";
}

/// A single lot to crawl.
///
/// The field map is opaque: whatever the listing page or seed table
/// provided is carried through to the output record unchanged. Work items
/// have no setters; build them up front and treat them as immutable once
/// they are queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem {
    fields: BTreeMap<String, String>,
}

/// Key used to match a seed item to the record produced for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub sale_date: String,
    pub price: String,
    pub link: String,
}

impl IdentityKey {
    /// Build the identity tuple from any field map.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Self {
            sale_date: get(keys::DATE),
            price: get(keys::PRICE),
            link: get(keys::LINK),
        }
    }
}

impl WorkItem {
    /// Create a work item from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy of this item with one more field set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    /// Field value, or the empty string when absent.
    pub fn field(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Detail page link, if present and non-blank.
    pub fn link(&self) -> Option<&str> {
        self.get(keys::LINK)
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    pub fn description(&self) -> &str {
        self.field(keys::DESC)
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey::from_fields(&self.fields)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_date_price_link() {
        let item = WorkItem::from_pairs([
            ("link", "https://example.com/lot/1"),
            ("price", "$100"),
            ("date", "2023-09-08"),
            ("desc", "2015 Cat 320"),
        ]);

        let identity = item.identity();
        assert_eq!(identity.sale_date, "2023-09-08");
        assert_eq!(identity.price, "$100");
        assert_eq!(identity.link, "https://example.com/lot/1");
    }

    #[test]
    fn test_identity_ignores_other_fields() {
        let a = WorkItem::from_pairs([("link", "L1"), ("price", "$1"), ("date", "d")]);
        let b = a.clone().with("desc", "something else");
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_blank_link_is_none() {
        let item = WorkItem::from_pairs([("link", "   ")]);
        assert!(item.link().is_none());
        assert!(WorkItem::default().link().is_none());
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let item = WorkItem::from_pairs([("link", "L1"), ("price", "$100")]);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({"link": "L1", "price": "$100"}));
    }
}
