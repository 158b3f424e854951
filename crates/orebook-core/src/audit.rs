//! Audit trail entries.

use crate::entities::TableSpec;
use serde::{Deserialize, Serialize};

/// Layout of `audit_log.csv`.
pub static AUDIT_LOG: TableSpec = TableSpec {
    file_name: "audit_log.csv",
    id_field: None,
    fields: &["Timestamp", "Username", "Action", "Path", "Details"],
};

/// Events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    Logout,
    PageView,
    DatasetUpload,
    DatasetShare,
    EntityAdd,
    EntityEdit,
    EntityDelete,
    EntityBulkDelete,
    AuditCleared,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoginSuccess => "login_success",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::PageView => "page_view",
            AuditAction::DatasetUpload => "dataset_upload",
            AuditAction::DatasetShare => "dataset_share",
            AuditAction::EntityAdd => "entity_add",
            AuditAction::EntityEdit => "entity_edit",
            AuditAction::EntityDelete => "entity_delete",
            AuditAction::EntityBulkDelete => "entity_bulk_delete",
            AuditAction::AuditCleared => "audit_cleared",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the audit log. Immutable once written.
///
/// `action` stays a string so that logs written by older deployments with
/// event names this build does not know about still read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Details", default)]
    pub details: String,
}

impl AuditEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(
        username: impl Into<String>,
        action: AuditAction,
        path: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: crate::utc_timestamp(),
            username: username.into(),
            action: action.as_str().to_string(),
            path: path.into(),
            details: details.into(),
        }
    }

    /// Cells in file column order.
    pub fn to_row(&self) -> [&str; 5] {
        [
            self.timestamp.as_str(),
            self.username.as_str(),
            self.action.as_str(),
            self.path.as_str(),
            self.details.as_str(),
        ]
    }

    pub fn is(&self, action: AuditAction) -> bool {
        self.action == action.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = AuditEntry::new("admin", AuditAction::EntityAdd, "/admin/sites", "Added sites 4");
        assert_eq!(entry.action, "entity_add");
        assert!(entry.is(AuditAction::EntityAdd));
        assert_eq!(entry.to_row()[1], "admin");
        assert_eq!(entry.to_row()[4], "Added sites 4");
    }

    #[test]
    fn test_action_names_are_snake_case() {
        let json = serde_json::to_string(&AuditAction::EntityBulkDelete).unwrap();
        assert_eq!(json, format!("\"{}\"", AuditAction::EntityBulkDelete.as_str()));
    }
}
