//! Every store of one data directory.
//!
//! Blocking API used directly by the CLI and through [`Catalog`](crate::Catalog)
//! by the server.

use crate::audit::AuditTrail;
use crate::dataset::UploadedDataset;
use crate::record_store::RecordStore;
use crate::shares::SharingRegistry;
use crate::write_atomic;
use orebook_core::audit::AUDIT_LOG;
use orebook_core::entities::ROLES;
use orebook_core::record::FieldValues;
use orebook_core::sharing::DATASET_SHARES;
use orebook_core::validation::validate_record;
use orebook_core::{EntityKind, OrebookError, Record, Result, Snapshot, TableSpec};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Roles written by `init` when `roles.csv` does not exist yet.
pub const DEFAULT_ROLES: [(&str, &str); 2] = [("1", "Administrator"), ("2", "Investor")];

/// Files written by [`DataDir::init`].
#[derive(Debug, Default)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct DataDir {
    root: PathBuf,
    stores: HashMap<EntityKind, RecordStore>,
    roles: RecordStore,
    audit: AuditTrail,
    shares: SharingRegistry,
    dataset: UploadedDataset,
}

impl DataDir {
    /// Open the stores of `root`. Files are created lazily on first write.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            OrebookError::StorageIo(format!(
                "Failed to create data directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let stores = EntityKind::ALL
            .iter()
            .map(|kind| (*kind, RecordStore::for_entity(&root, *kind)))
            .collect();

        Ok(Self {
            roles: RecordStore::new(&root, &ROLES),
            audit: AuditTrail::new(&root),
            shares: SharingRegistry::new(&root),
            dataset: UploadedDataset::new(&root),
            stores,
            root,
        })
    }

    /// Write header-only tables for every collection, seeding the default
    /// roles. Existing files are kept unless `force` is set.
    pub fn init<P: AsRef<Path>>(root: P, force: bool) -> Result<(Self, InitReport)> {
        let dir = Self::open(root)?;
        let mut report = InitReport::default();

        let tables = EntityKind::ALL
            .iter()
            .map(|kind| &kind.spec().table)
            .chain([&ROLES, &AUDIT_LOG, &DATASET_SHARES]);

        for table in tables {
            let path = dir.root.join(table.file_name);
            if path.exists() && !force {
                report.kept.push(path);
                continue;
            }
            write_atomic(&path, initial_contents(table).as_bytes())?;
            report.created.push(path);
        }

        tracing::info!(
            root = %dir.root.display(),
            created = report.created.len(),
            kept = report.kept.len(),
            "Initialized data directory"
        );
        Ok((dir, report))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self, kind: EntityKind) -> &RecordStore {
        // Every kind is inserted by `open`
        &self.stores[&kind]
    }

    pub fn roles(&self) -> &RecordStore {
        &self.roles
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn shares(&self) -> &SharingRegistry {
        &self.shares
    }

    pub fn dataset(&self) -> &UploadedDataset {
        &self.dataset
    }

    /// Read every collection into a fresh snapshot.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let mut collections = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            collections.push((kind, self.store(kind).load()?));
        }
        Ok(Snapshot::build(collections, self.roles.load()?))
    }

    /// Validate and insert a new record with the next identifier.
    ///
    /// Every registered column is taken from `values` (missing ⇒ empty).
    pub fn create(&self, kind: EntityKind, values: &FieldValues) -> Result<Record> {
        let spec = kind.spec();
        let id_field = spec.id_field();

        self.store(kind).insert_with_next_id(|id, existing| {
            let record: Record = spec
                .fields()
                .iter()
                .map(|field| {
                    let value = if *field == id_field {
                        id.to_string()
                    } else {
                        values.get(*field).cloned().unwrap_or_default()
                    };
                    (field.to_string(), value)
                })
                .collect();

            validate_record(kind, &record, existing)?;
            Ok(record)
        })
    }

    /// Validate and overwrite record `id` with the submitted values.
    pub fn update(&self, kind: EntityKind, id: i64, values: &FieldValues) -> Result<Record> {
        self.store(kind)
            .update_by_id(id, values, |merged, existing| {
                validate_record(kind, merged, existing)
            })
    }

    pub fn delete(&self, kind: EntityKind, id: i64) -> Result<usize> {
        self.store(kind).delete_by_id(id)
    }

    /// Remove every site of one country.
    pub fn delete_sites_by_country(&self, country_id: i64) -> Result<usize> {
        self.store(EntityKind::Sites)
            .delete_where("CountryID", country_id)
    }
}

fn initial_contents(table: &TableSpec) -> String {
    let mut contents = format!("{}\n", table.header());
    if table.file_name == ROLES.file_name {
        for (id, name) in DEFAULT_ROLES {
            contents.push_str(&format!("{},{}\n", id, name));
        }
    }
    contents
}
