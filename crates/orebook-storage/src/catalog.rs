//! Catalog state holder
//!
//! Owns a [`DataDir`] and the current [`Snapshot`]. Readers take the snapshot
//! with [`Catalog::snapshot`]; every write method persists, then reloads, so
//! callers never serve stale joined views after their own writes.
//!
//! All file I/O runs in `spawn_blocking`.

use crate::audit::AuditClearOutcome;
use crate::data_dir::DataDir;
use crate::dataset::DatasetTable;
use orebook_core::audit::AuditEntry;
use orebook_core::record::FieldValues;
use orebook_core::sharing::{DatasetShare, ShareScope};
use orebook_core::{EntityKind, OrebookError, Record, Result, Role, Snapshot};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Cheaply cloneable handle; clones share the same state.
#[derive(Clone, Debug)]
pub struct Catalog {
    dir: Arc<DataDir>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    // Held across load and swap so a slower reload never installs an older
    // snapshot over a newer one.
    reload_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Catalog {
    /// Open a data directory and load its first snapshot.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir = blocking(move || DataDir::open(root)).await?;
        Self::from_data_dir(dir).await
    }

    /// Wrap an already opened data directory.
    pub async fn from_data_dir(dir: DataDir) -> Result<Self> {
        let catalog = Self {
            dir: Arc::new(dir),
            snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::empty()))),
            reload_lock: Arc::new(tokio::sync::Mutex::new(())),
        };
        catalog.reload().await?;
        Ok(catalog)
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.dir
    }

    /// Current snapshot. Never blocks on I/O.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Re-read every collection and swap the snapshot.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        let reloading = self.reload_lock.lock().await;
        let dir = self.dir.clone();
        let snapshot = Arc::new(blocking(move || dir.load_snapshot()).await?);
        *self.snapshot.write() = snapshot.clone();
        drop(reloading);

        tracing::debug!(
            countries = snapshot.count(EntityKind::Countries),
            minerals = snapshot.count(EntityKind::Minerals),
            sites = snapshot.count(EntityKind::Sites),
            production = snapshot.count(EntityKind::Production),
            "Reloaded catalog snapshot"
        );
        Ok(snapshot)
    }

    /// Reload after a successful write. A failed reload keeps the previous
    /// snapshot and does not undo the write.
    async fn refresh(&self) {
        if let Err(e) = self.reload().await {
            tracing::error!(error = %e, "Failed to reload catalog after write");
        }
    }

    pub async fn create(&self, kind: EntityKind, values: FieldValues) -> Result<Record> {
        let dir = self.dir.clone();
        let record = blocking(move || dir.create(kind, &values)).await?;
        self.refresh().await;
        Ok(record)
    }

    pub async fn update(&self, kind: EntityKind, id: i64, values: FieldValues) -> Result<Record> {
        let dir = self.dir.clone();
        let record = blocking(move || dir.update(kind, id, &values)).await?;
        self.refresh().await;
        Ok(record)
    }

    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<usize> {
        let dir = self.dir.clone();
        let removed = blocking(move || dir.delete(kind, id)).await?;
        if removed > 0 {
            self.refresh().await;
        }
        Ok(removed)
    }

    pub async fn delete_sites_by_country(&self, country_id: i64) -> Result<usize> {
        let dir = self.dir.clone();
        let removed = blocking(move || dir.delete_sites_by_country(country_id)).await?;
        if removed > 0 {
            self.refresh().await;
        }
        Ok(removed)
    }

    pub async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        let dir = self.dir.clone();
        blocking(move || dir.audit().append(&entry)).await
    }

    pub async fn audit_tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        let dir = self.dir.clone();
        blocking(move || dir.audit().tail(n)).await
    }

    pub async fn clear_audit(&self, actor: String) -> Result<AuditClearOutcome> {
        let dir = self.dir.clone();
        blocking(move || dir.audit().clear_with_backup(&actor)).await
    }

    pub async fn grant_share(
        &self,
        scope: ShareScope,
        value: String,
        shared_by: String,
    ) -> Result<DatasetShare> {
        let dir = self.dir.clone();
        blocking(move || dir.shares().grant(scope, &value, &shared_by)).await
    }

    pub async fn shares(&self) -> Result<Vec<DatasetShare>> {
        let dir = self.dir.clone();
        blocking(move || dir.shares().list()).await
    }

    /// Whether the uploaded dataset is visible; false on any failure.
    pub async fn is_dataset_visible(&self, username: String, role: Role) -> bool {
        let dir = self.dir.clone();
        match tokio::task::spawn_blocking(move || dir.shares().is_visible(&username, &role)).await
        {
            Ok(visible) => visible,
            Err(e) => {
                tracing::warn!(error = %e, "Share check task failed, treating dataset as not shared");
                false
            }
        }
    }

    pub async fn dataset(&self) -> Result<DatasetTable> {
        let dir = self.dir.clone();
        blocking(move || dir.dataset().load()).await
    }

    pub async fn replace_dataset(&self, filename: String, bytes: Vec<u8>) -> Result<DatasetTable> {
        let dir = self.dir.clone();
        blocking(move || dir.dataset().replace(&filename, &bytes)).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OrebookError::Other(format!("Task join error: {}", e)))?
}
