//! Uploaded dataset
//!
//! Arbitrary tabular data with no fixed schema. CSV uploads are stored as
//! given; Excel workbooks are converted from their first worksheet. The
//! content must parse before it replaces the stored copy.

use crate::write_atomic;
use calamine::{open_workbook_auto_from_rs, Reader};
use orebook_core::validation::{validate_upload_filename, UploadFormat};
use orebook_core::{OrebookError, Record, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const UPLOADED_DATASET_FILE: &str = "uploaded_dataset.csv";

/// Parsed dataset: columns in file order plus one record per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetTable {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl DatasetTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn parse(bytes: &[u8]) -> std::result::Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            rows.push(
                columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.clone(), v.to_string()))
                    .collect(),
            );
        }

        Ok(Self { columns, rows })
    }
}

#[derive(Debug)]
pub struct UploadedDataset {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UploadedDataset {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(UPLOADED_DATASET_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current dataset; empty when nothing has been uploaded.
    pub fn load(&self) -> Result<DatasetTable> {
        if !self.path.exists() {
            return Ok(DatasetTable::default());
        }
        let bytes = std::fs::read(&self.path)?;
        DatasetTable::parse(&bytes).map_err(OrebookError::from)
    }

    /// Replace the dataset with an uploaded file.
    pub fn replace(&self, filename: &str, bytes: &[u8]) -> Result<DatasetTable> {
        let converted;
        let csv_bytes = match validate_upload_filename(filename)? {
            UploadFormat::Csv => bytes,
            UploadFormat::Spreadsheet => {
                converted = spreadsheet_to_csv(bytes)?;
                converted.as_slice()
            }
        };

        let table = DatasetTable::parse(csv_bytes)
            .map_err(|e| OrebookError::invalid(format!("Failed to process file: {}", e)))?;
        if table.columns.iter().all(|c| c.trim().is_empty()) {
            return Err(OrebookError::invalid(
                "Failed to process file: missing header row",
            ));
        }

        let _guard = self.lock.lock();
        write_atomic(&self.path, csv_bytes)?;

        tracing::info!(
            filename = filename,
            columns = table.columns.len(),
            rows = table.rows.len(),
            "Replaced uploaded dataset"
        );
        Ok(table)
    }
}

/// Convert the first worksheet of an Excel workbook to CSV bytes.
fn spreadsheet_to_csv(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| OrebookError::invalid(format!("Failed to process file: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| OrebookError::invalid("Failed to process file: workbook has no sheets"))?
        .map_err(|e| OrebookError::invalid(format!("Failed to process file: {}", e)))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in range.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| OrebookError::StorageIo(format!("Failed to encode worksheet: {}", e)))
}
