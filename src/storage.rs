//! Seed input, snapshot output and the rejected-item side file.

mod rejected;
mod seed;
mod snapshot;

pub use rejected::RejectedLog;
pub use seed::{canonical_key, load_seed, normalize_cell};
pub use snapshot::{column_order, dated_filename, SnapshotWriter, CANONICAL_COLUMNS};

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Background write failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Seed file not found: {}", .0.display())]
    SeedNotFound(PathBuf),
    #[error("Unsupported seed format '{0}' (expected .csv or .xlsx)")]
    UnsupportedFormat(String),
    #[error("Spreadsheet {} has no worksheets", .0.display())]
    EmptyWorkbook(PathBuf),
    #[error("Output directory {} is not writable: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Create `dir` if needed and prove it is writable.
pub fn ensure_output_dir(dir: &Path) -> Result<(), StorageError> {
    let to_output_err = |source| StorageError::OutputDir {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(to_output_err)?;
    tempfile::NamedTempFile::new_in(dir).map_err(to_output_err)?;
    Ok(())
}

/// Write `contents` to `path` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_output_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_output_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_output_dir(&file),
            Err(StorageError::OutputDir { .. })
        ));
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
