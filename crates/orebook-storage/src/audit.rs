//! Append-only audit log
//!
//! Lines are fully quoted CSV under the header
//! `Timestamp,Username,Action,Path,Details`. The only removal is
//! [`AuditTrail::clear_with_backup`], which copies the log aside before
//! truncating it.

use crate::{append_quoted_row, encode_quoted_row, read_log, visit_log, write_atomic};
use chrono::Utc;
use orebook_core::audit::{AuditAction, AuditEntry, AUDIT_LOG};
use orebook_core::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Path recorded on the synthetic entry written by a clear.
pub const CLEAR_PATH: &str = "/admin/audit/clear";

/// Result of a successful clear.
#[derive(Debug, Clone, Serialize)]
pub struct AuditClearOutcome {
    /// Backup file name inside the data directory
    pub backup_file: String,
    #[serde(skip)]
    pub backup_path: PathBuf,
    /// Entries moved to the backup
    pub cleared_entries: usize,
    /// The synthetic entry now heading the live log
    pub entry: AuditEntry,
}

#[derive(Debug)]
pub struct AuditTrail {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditTrail {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(AUDIT_LOG.file_name),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, creating the log with its header if needed.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let _guard = self.lock.lock();
        append_quoted_row(&self.path, &AUDIT_LOG, &entry.to_row())
    }

    /// All entries in file order.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        read_log(&self.path)
    }

    /// The last `n` entries, oldest first.
    ///
    /// Rows stream from the file, so at most `n` entries are held at once.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut tail = VecDeque::with_capacity(n.min(1024));
        visit_log(&self.path, |entry: AuditEntry| {
            if tail.len() == n {
                tail.pop_front();
            }
            tail.push_back(entry);
        })?;
        Ok(tail.into())
    }

    fn backup_path(&self) -> (String, PathBuf) {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let mut name = format!("audit_log_{}.bak.csv", stamp);
        let mut suffix = 1;
        while dir.join(&name).exists() {
            name = format!("audit_log_{}_{}.bak.csv", stamp, suffix);
            suffix += 1;
        }
        let path = dir.join(&name);
        (name, path)
    }

    /// Copy the live log to a timestamped backup, then reset it to the header
    /// plus one `audit_cleared` entry naming `actor` and the backup file.
    ///
    /// Either both files reach their final state or the live log is left as it
    /// was: if rewriting the live log fails the backup is removed again.
    pub fn clear_with_backup(&self, actor: &str) -> Result<AuditClearOutcome> {
        let _guard = self.lock.lock();

        let original = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let cleared_entries = read_log::<AuditEntry>(&self.path)?.len();

        let (backup_file, backup_path) = self.backup_path();
        write_atomic(&backup_path, &original)?;

        let entry = AuditEntry::new(
            actor,
            AuditAction::AuditCleared,
            CLEAR_PATH,
            format!("Cleared recent audit log and backed up to {}", backup_file),
        );

        let mut contents = AUDIT_LOG.header().into_bytes();
        contents.push(b'\n');
        let reset = encode_quoted_row(&entry.to_row()).and_then(|row| {
            contents.extend(row);
            write_atomic(&self.path, &contents)
        });

        if let Err(e) = reset {
            if let Err(cleanup) = fs::remove_file(&backup_path) {
                tracing::error!(
                    backup = %backup_path.display(),
                    error = %cleanup,
                    "Failed to remove audit backup after failed clear"
                );
            }
            return Err(e);
        }

        tracing::info!(
            actor = actor,
            backup = %backup_file,
            cleared_entries = cleared_entries,
            "Cleared audit log"
        );

        Ok(AuditClearOutcome {
            backup_file,
            backup_path,
            cleared_entries,
            entry,
        })
    }
}
