//! CSV-backed record store
//!
//! One store per table. Reads parse the whole file; writes rewrite it in full
//! through [`write_atomic`](crate::write_atomic). Each store holds a write lock
//! across its read-modify-write cycles, so two writers in the same process
//! never lose each other's updates.

use crate::{encode_records, read_records, write_atomic};
use orebook_core::record::FieldValues;
use orebook_core::{EntityKind, OrebookError, Record, Result, TableSpec};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

pub struct RecordStore {
    table: &'static TableSpec,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("table", &self.table.file_name)
            .field("path", &self.path)
            .finish()
    }
}

/// `max(ids) + 1`, or 1 for an empty table. Unparseable ids are ignored.
fn next_id_of(records: &[Record], id_field: &str) -> i64 {
    records
        .iter()
        .filter_map(|r| r.integer(id_field))
        .max()
        .map_or(1, |max| max + 1)
}

impl RecordStore {
    /// Store for `table` inside `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, table: &'static TableSpec) -> Self {
        Self {
            table,
            path: dir.as_ref().join(table.file_name),
            write_lock: Mutex::new(()),
        }
    }

    /// Store for a registered entity inside `dir`.
    pub fn for_entity<P: AsRef<Path>>(dir: P, kind: EntityKind) -> Self {
        Self::new(dir, &kind.spec().table)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &'static TableSpec {
        self.table
    }

    fn id_field(&self) -> Result<&'static str> {
        self.table.id_field.ok_or_else(|| {
            OrebookError::Other(format!("{} has no identifier field", self.table.file_name))
        })
    }

    /// Every record in file order. A missing file is an empty collection.
    pub fn load(&self) -> Result<Vec<Record>> {
        read_records(&self.path)
    }

    /// Overwrite the table with exactly `records`.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.save_unlocked(records)
    }

    fn save_unlocked(&self, records: &[Record]) -> Result<()> {
        let bytes = encode_records(self.table, records)?;
        write_atomic(&self.path, &bytes)?;
        tracing::debug!(
            file = self.table.file_name,
            records = records.len(),
            "Saved table"
        );
        Ok(())
    }

    /// Append one record. Fails with `Conflict` if its identifier is taken.
    pub fn append(&self, record: Record) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?;

        if let Some(id_field) = self.table.id_field {
            if let Some(id) = record.integer(id_field) {
                if records.iter().any(|r| r.integer(id_field) == Some(id)) {
                    return Err(OrebookError::Conflict(format!(
                        "{} {} already exists in {}",
                        id_field, id, self.table.file_name
                    )));
                }
            }
        }

        records.push(record);
        self.save_unlocked(&records)
    }

    /// Next identifier. Best-effort outside of [`insert_with_next_id`](Self::insert_with_next_id).
    pub fn next_id(&self) -> Result<i64> {
        let id_field = self.id_field()?;
        Ok(next_id_of(&self.load()?, id_field))
    }

    /// Assign the next identifier and append the record built for it.
    ///
    /// `build` receives the new id and the current rows and may reject the
    /// record, in which case the file is left untouched. The identifier column
    /// of the built record is always set to the assigned id.
    pub fn insert_with_next_id<F>(&self, build: F) -> Result<Record>
    where
        F: FnOnce(i64, &[Record]) -> Result<Record>,
    {
        let id_field = self.id_field()?;
        let _guard = self.write_lock.lock();
        let mut records = self.load()?;

        let id = next_id_of(&records, id_field);
        let mut record = build(id, &records)?;
        record.set(id_field, id.to_string());

        records.push(record.clone());
        self.save_unlocked(&records)?;

        tracing::info!(file = self.table.file_name, id = id, "Inserted record");
        Ok(record)
    }

    /// Overwrite the non-identifier fields of record `id`.
    ///
    /// Fields absent from `changes` keep their current value. `check` sees the
    /// merged record and the current rows; an error leaves the file untouched.
    pub fn update_by_id<F>(&self, id: i64, changes: &FieldValues, check: F) -> Result<Record>
    where
        F: FnOnce(&Record, &[Record]) -> Result<()>,
    {
        let id_field = self.id_field()?;
        let _guard = self.write_lock.lock();
        let mut records = self.load()?;

        let idx = records
            .iter()
            .position(|r| r.integer(id_field) == Some(id))
            .ok_or_else(|| {
                OrebookError::NotFound(format!("{} {} not found", id_field, id))
            })?;

        let mut merged = records[idx].clone();
        for field in self.table.fields.iter().filter(|f| **f != id_field) {
            if let Some(value) = changes.get(*field) {
                merged.set(*field, value.clone());
            }
        }

        check(&merged, &records)?;

        records[idx] = merged.clone();
        self.save_unlocked(&records)?;

        tracing::info!(file = self.table.file_name, id = id, "Updated record");
        Ok(merged)
    }

    /// Remove every record with identifier `id`; returns how many were removed.
    ///
    /// Deleting an unknown id is a no-op and does not touch the file.
    pub fn delete_by_id(&self, id: i64) -> Result<usize> {
        let id_field = self.id_field()?;
        self.delete_matching(|r| r.integer(id_field) == Some(id))
    }

    /// Remove every record whose `field` parses to `value`.
    pub fn delete_where(&self, field: &str, value: i64) -> Result<usize> {
        self.delete_matching(|r| r.integer(field) == Some(value))
    }

    fn delete_matching<F>(&self, matches: F) -> Result<usize>
    where
        F: Fn(&Record) -> bool,
    {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?;

        let before = records.len();
        records.retain(|r| !matches(r));
        let removed = before - records.len();

        if removed > 0 {
            self.save_unlocked(&records)?;
            tracing::info!(file = self.table.file_name, removed = removed, "Deleted records");
        }

        Ok(removed)
    }

    /// Record with identifier `id`, if any.
    pub fn get(&self, id: i64) -> Result<Option<Record>> {
        let id_field = self.id_field()?;
        Ok(self
            .load()?
            .into_iter()
            .find(|r| r.integer(id_field) == Some(id)))
    }
}
