//! Seed table loading (CSV or XLSX).

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::{info, warn};

use super::StorageError;
use crate::models::{keys, WorkItem};

/// Map a spreadsheet header onto a work item key.
pub fn canonical_key(header: &str) -> String {
    let header = header.trim();
    match header.to_ascii_uppercase().as_str() {
        "LINK TO LISTING" | "LINK" => keys::LINK.to_string(),
        "BIDADOO PRICE" | "PRICE" => keys::PRICE.to_string(),
        "SALE DATE" | "DATE" => keys::DATE.to_string(),
        "YEAR" => keys::YEAR.to_string(),
        "MAKE" => keys::MAKE.to_string(),
        "MODEL" => keys::MODEL.to_string(),
        "HOURS" => keys::HOURS.to_string(),
        "DESCRIPTION" | "DESC" => keys::DESC.to_string(),
        _ => header.to_lowercase(),
    }
}

/// Render integral numbers without a trailing `.0`.
pub fn normalize_cell(value: &str) -> String {
    let value = value.trim();
    if let Some(whole) = value.strip_suffix(".0") {
        if !whole.is_empty() && whole.parse::<i64>().is_ok() {
            return whole.to_string();
        }
    }
    value.to_string()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            format!("{}", *f as i64)
        }
        other => normalize_cell(&other.to_string()),
    }
}

/// Load an ordered seed set. Rows without any non-empty cell are dropped.
pub fn load_seed(path: &Path) -> Result<Vec<WorkItem>, StorageError> {
    if !path.exists() {
        return Err(StorageError::SeedNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let items = match extension.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" => load_xlsx(path)?,
        other => return Err(StorageError::UnsupportedFormat(other.to_string())),
    };

    let without_link = items.iter().filter(|i| i.link().is_none()).count();
    if without_link > 0 {
        warn!("{} seed rows have no link", without_link);
    }
    info!("Loaded {} seed items from {}", items.len(), path.display());
    Ok(items)
}

fn row_to_item(headers: &[String], cells: impl Iterator<Item = String>) -> Option<WorkItem> {
    let fields: BTreeMap<String, String> = headers
        .iter()
        .cloned()
        .zip(cells)
        .filter(|(header, _)| !header.is_empty())
        .collect();

    if fields.values().all(|v| v.is_empty()) {
        return None;
    }
    Some(WorkItem::from_pairs(fields))
}

fn load_csv(path: &Path) -> Result<Vec<WorkItem>, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(canonical_key).collect();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(item) = row_to_item(&headers, record.iter().map(normalize_cell)) {
            items.push(item);
        }
    }
    Ok(items)
}

fn load_xlsx(path: &Path) -> Result<Vec<WorkItem>, StorageError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let (_name, range) = workbook
        .worksheets()
        .into_iter()
        .next()
        .ok_or_else(|| StorageError::EmptyWorkbook(path.to_path_buf()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| canonical_key(&c.to_string()))
        .collect();

    Ok(rows
        .filter_map(|row| row_to_item(&headers, row.iter().map(cell_to_string)))
        .collect())
}
