//! Tabular snapshot output.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::{write_atomic, StorageError};
use crate::models::{keys, OutputRecord};

/// Leading columns, in order. Any other field follows, sorted.
pub const CANONICAL_COLUMNS: [&str; 7] = [
    keys::YEAR,
    keys::MAKE,
    keys::MODEL,
    keys::HOURS,
    keys::PRICE,
    keys::DATE,
    keys::LINK,
];

/// `{prefix}_{YYYY-MM-DD}.csv`
pub fn dated_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// Canonical columns followed by every other key seen in `records`.
pub fn column_order(records: &[OutputRecord]) -> Vec<String> {
    let extra: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.fields().keys())
        .map(|k| k.as_str())
        .filter(|k| !CANONICAL_COLUMNS.contains(k))
        .collect();

    CANONICAL_COLUMNS
        .iter()
        .copied()
        .chain(extra)
        .map(str::to_string)
        .collect()
}

/// Rewrites one CSV file with the full current result set.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: &Path, filename: impl AsRef<Path>) -> Self {
        Self {
            path: dir.join(filename),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Serialize `records` to CSV bytes.
    pub fn render(records: &[OutputRecord]) -> Result<Vec<u8>, StorageError> {
        let columns = column_order(records);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&columns)?;
        for record in records {
            writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
        }
        writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))
    }

    /// Replace the snapshot file with `records`.
    pub fn write(&self, records: &[OutputRecord]) -> Result<(), StorageError> {
        let bytes = Self::render(records)?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedRecord, WorkItem};
    use tempfile::tempdir;

    fn record(link: &str, extra: Option<(&str, &str)>) -> OutputRecord {
        let mut item = WorkItem::from_pairs([("link", link), ("price", "$100"), ("date", "2023-09-08")]);
        if let Some((k, v)) = extra {
            item = item.with(k, v);
        }
        let extracted = ExtractedRecord {
            year: "2015".into(),
            make: "Cat".into(),
            ..Default::default()
        };
        OutputRecord::complete(&item, &extracted)
    }

    #[test]
    fn test_dated_filename() {
        let date = NaiveDate::from_ymd_opt(2023, 9, 8).unwrap();
        assert_eq!(dated_filename("results", date), "results_2023-09-08.csv");
        assert_eq!(dated_filename("cleaned_data", date), "cleaned_data_2023-09-08.csv");
    }

    #[test]
    fn test_column_order() {
        let records = vec![
            record("L1", Some(("desc", "2015 Cat"))),
            record("L2", Some(("condition", "used"))),
        ];
        assert_eq!(
            column_order(&records),
            vec!["year", "make", "model", "hours", "price", "date", "link", "condition", "desc"]
        );
    }

    #[test]
    fn test_render_csv() {
        let bytes = SnapshotWriter::render(&[record("L1", None)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "year,make,model,hours,price,date,link\n2015,Cat,,,$100,2023-09-08,L1\n"
        );
    }

    #[test]
    fn test_empty_snapshot_has_header() {
        let text = String::from_utf8(SnapshotWriter::render(&[]).unwrap()).unwrap();
        assert_eq!(text, "year,make,model,hours,price,date,link\n");
    }

    #[test]
    fn test_write_is_repeatable() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), "results_2023-09-08.csv");
        let records = vec![record("L1", None), record("L2", None)];

        writer.write(&records).unwrap();
        let first = std::fs::read(writer.path()).unwrap();
        writer.write(&records).unwrap();
        let second = std::fs::read(writer.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(writer.file_name(), "results_2023-09-08.csv");
    }
}
