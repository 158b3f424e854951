//! Dataset share grants.

use crate::entities::TableSpec;
use crate::roles::Role;
use crate::{OrebookError, Result};
use serde::{Deserialize, Serialize};

/// Layout of `dataset_shares.csv`.
pub static DATASET_SHARES: TableSpec = TableSpec {
    file_name: "dataset_shares.csv",
    id_field: None,
    fields: &["SharedType", "SharedValue", "SharedBy", "Timestamp"],
};

/// What a grant is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareScope {
    Role,
    User,
}

impl ShareScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareScope::Role => "role",
            ShareScope::User => "user",
        }
    }
}

impl std::str::FromStr for ShareScope {
    type Err = OrebookError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "role" => Ok(ShareScope::Role),
            "user" => Ok(ShareScope::User),
            _ => Err(OrebookError::invalid(format!(
                "Share type must be 'role' or 'user', got '{}'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ShareScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One grant of dataset visibility. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShare {
    #[serde(rename = "SharedType")]
    pub shared_type: String,
    #[serde(rename = "SharedValue")]
    pub shared_value: String,
    #[serde(rename = "SharedBy")]
    pub shared_by: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl DatasetShare {
    pub fn new(scope: ShareScope, value: impl Into<String>, shared_by: impl Into<String>) -> Self {
        Self {
            shared_type: scope.as_str().to_string(),
            shared_value: value.into(),
            shared_by: shared_by.into(),
            timestamp: crate::utc_timestamp(),
        }
    }

    pub fn to_row(&self) -> [&str; 4] {
        [
            self.shared_type.as_str(),
            self.shared_value.as_str(),
            self.shared_by.as_str(),
            self.timestamp.as_str(),
        ]
    }

    /// Whether this grant covers the given user or role.
    pub fn grants(&self, username: &str, role: &Role) -> bool {
        match self.shared_type.as_str() {
            "role" => self.shared_value == role.as_str(),
            "user" => self.shared_value == username,
            _ => false,
        }
    }
}

/// Visibility rule over a set of grants. Administrators always see the dataset.
pub fn is_visible_in(shares: &[DatasetShare], username: &str, role: &Role) -> bool {
    role.is_admin() || shares.iter().any(|s| s.grants(username, role))
}
