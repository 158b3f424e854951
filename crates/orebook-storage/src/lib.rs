//! Orebook Storage
//!
//! Flat-file storage for the Orebook catalog. Every collection lives in one
//! CSV file inside a data directory:
//!
//! - [`RecordStore`]: mutable entity tables, fully rewritten on every write
//! - [`AuditTrail`]: append-only audit log with backup-then-truncate clear
//! - [`SharingRegistry`]: append-only dataset share grants
//! - [`UploadedDataset`]: arbitrary tabular data uploaded by administrators
//! - [`DataDir`]: the set of stores for one directory (blocking API)
//! - [`Catalog`]: async state holder owning a `DataDir` and the current
//!   [`Snapshot`](orebook_core::Snapshot)
//!
//! # Safety
//!
//! All file I/O is blocking. Async callers go through [`Catalog`], which runs
//! every operation on the blocking pool via `tokio::task::spawn_blocking`.
//!
//! Rewrites go through a temporary file in the same directory followed by an
//! atomic rename, so a crash mid-write never leaves a truncated table.

use orebook_core::{OrebookError, Record, Result, TableSpec};
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub mod audit;
pub mod catalog;
pub mod data_dir;
pub mod dataset;
pub mod record_store;
pub mod shares;

pub use audit::{AuditClearOutcome, AuditTrail};
pub use catalog::Catalog;
pub use data_dir::{DataDir, InitReport};
pub use dataset::{DatasetTable, UploadedDataset};
pub use record_store::RecordStore;
pub use shares::SharingRegistry;

/// Replace `path` with `bytes` atomically.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        OrebookError::StorageIo(format!(
            "Failed to create temp file in {}: {}",
            dir.display(),
            e
        ))
    })?;
    temp_file.write_all(bytes)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| {
        OrebookError::StorageIo(format!("Failed to persist {}: {}", path.display(), e))
    })?;

    Ok(())
}

/// Read a table into records keyed by its header row.
///
/// A missing file is an empty table; any other failure is a `StorageIo` error.
pub(crate) fn read_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }

    Ok(records)
}

/// Serialize records with the table's columns, in column order.
pub(crate) fn encode_records(table: &TableSpec, records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.fields)?;
    for record in records {
        writer.write_record(table.fields.iter().map(|f| record.get_or_empty(f)))?;
    }
    writer
        .into_inner()
        .map_err(|e| OrebookError::StorageIo(format!("Failed to encode {}: {}", table.file_name, e)))
}

/// One fully quoted log line, newline-terminated.
pub(crate) fn encode_quoted_row(row: &[&str]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(row)?;
    writer
        .into_inner()
        .map_err(|e| OrebookError::StorageIo(format!("Failed to encode log line: {}", e)))
}

/// Append one quoted line to a log file, writing the header first if the file
/// is missing or empty.
pub(crate) fn append_quoted_row(path: &Path, table: &TableSpec, row: &[&str]) -> Result<()> {
    let mut line = Vec::new();
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if needs_header {
        line.extend_from_slice(table.header().as_bytes());
        line.push(b'\n');
    }
    line.extend(encode_quoted_row(row)?);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

/// Deserialize every row of a log file. A missing file is empty.
pub(crate) fn read_log<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    visit_log(path, |row| rows.push(row))?;
    Ok(rows)
}

/// Stream the rows of a log file into `visit` without collecting them.
/// Malformed lines are skipped and counted; I/O errors abort.
pub(crate) fn visit_log<T, F>(path: &Path, mut visit: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    if !path.exists() {
        return Ok(());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut skipped = 0usize;
    for row in reader.deserialize::<T>() {
        match row {
            Ok(row) => visit(row),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped = skipped,
            "Skipped malformed log lines"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orebook_core::entities::COUNTRIES;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let records = read_records(&dir.path().join("absent.csv")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory where a file is expected
        let path = dir.path().join("countries.csv");
        fs::create_dir(&path).unwrap();
        assert!(matches!(
            read_records(&path),
            Err(OrebookError::StorageIo(_))
        ));
    }

    #[test]
    fn test_encode_keeps_column_order_and_quotes_when_needed() {
        let record = Record::from_pairs([
            ("KeyProjects", "Kamoa, Kakula"),
            ("CountryName", "Testland"),
            ("CountryID", "1"),
        ]);
        let bytes = encode_records(&COUNTRIES.table, &[record]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "CountryID,CountryName,GDP_BillionUSD,MiningRevenue_BillionUSD,KeyProjects\n\
             1,Testland,,,\"Kamoa, Kakula\"\n"
        );
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        write_atomic(&path, b"a\n1\n").unwrap();
        write_atomic(&path, b"a\n2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n2\n");
        // No stray temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_quoted_row() {
        let line = encode_quoted_row(&["a", "b \"c\"", ""]).unwrap();
        assert_eq!(String::from_utf8(line).unwrap(), "\"a\",\"b \"\"c\"\"\",\"\"\n");
    }
}
