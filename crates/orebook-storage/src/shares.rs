//! Dataset sharing registry.

use crate::{append_quoted_row, read_log};
use orebook_core::roles::Role;
use orebook_core::sharing::{is_visible_in, DatasetShare, ShareScope, DATASET_SHARES};
use orebook_core::validation::validate_share_value;
use orebook_core::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SharingRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SharingRegistry {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(DATASET_SHARES.file_name),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a grant to a role or a user.
    pub fn grant(&self, scope: ShareScope, value: &str, shared_by: &str) -> Result<DatasetShare> {
        validate_share_value(value)?;

        let share = DatasetShare::new(scope, value.trim(), shared_by);
        let _guard = self.lock.lock();
        append_quoted_row(&self.path, &DATASET_SHARES, &share.to_row())?;

        tracing::info!(
            scope = %scope,
            value = %share.shared_value,
            shared_by = shared_by,
            "Granted dataset share"
        );
        Ok(share)
    }

    /// Every grant in file order.
    pub fn list(&self) -> Result<Vec<DatasetShare>> {
        read_log(&self.path)
    }

    /// Whether the uploaded dataset is visible to this user.
    ///
    /// Fails closed: an unreadable registry hides the dataset from everyone
    /// except administrators.
    pub fn is_visible(&self, username: &str, role: &Role) -> bool {
        if role.is_admin() {
            return true;
        }

        match self.list() {
            Ok(shares) => is_visible_in(&shares, username, role),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read dataset shares, treating dataset as not shared"
                );
                false
            }
        }
    }
}
