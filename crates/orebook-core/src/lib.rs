//! Orebook Core
//!
//! Core types, entity registry, validation rules and read views for the
//! Orebook mineral-production catalog.

use chrono::{SecondsFormat, Utc};

pub mod analytics;
pub mod audit;
pub mod entities;
pub mod record;
pub mod roles;
pub mod sharing;
pub mod snapshot;
pub mod validation;
pub mod views;

pub use entities::{EntityKind, EntitySpec, ForeignKeySelect, TableSpec};
pub use record::{FieldValues, Record};
pub use roles::Role;
pub use snapshot::Snapshot;

/// Errors that can occur in catalog operations
#[derive(Debug, thiserror::Error)]
pub enum OrebookError {
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid field: {}", .0.join("; "))]
    InvalidField(Vec<String>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict detected: {0}")]
    Conflict(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl OrebookError {
    /// Shorthand for a validation failure carrying a single message.
    pub fn invalid(message: impl Into<String>) -> Self {
        OrebookError::InvalidField(vec![message.into()])
    }

    /// Validation messages, if this is an `InvalidField` error.
    pub fn field_errors(&self) -> Option<&[String]> {
        match self {
            OrebookError::InvalidField(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrebookError {
    fn from(err: std::io::Error) -> Self {
        OrebookError::StorageIo(err.to_string())
    }
}

impl From<csv::Error> for OrebookError {
    fn from(err: csv::Error) -> Self {
        OrebookError::StorageIo(err.to_string())
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, OrebookError>;

/// Current UTC time as an RFC 3339 string with microsecond precision.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display_joins_messages() {
        let err = OrebookError::InvalidField(vec![
            "Latitude must be between -90 and 90".to_string(),
            "Longitude must be a valid number".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid field: Latitude must be between -90 and 90; Longitude must be a valid number"
        );
        assert_eq!(err.field_errors().map(|e| e.len()), Some(2));
    }

    #[test]
    fn test_io_error_maps_to_storage_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: OrebookError = io.into();
        assert!(matches!(err, OrebookError::StorageIo(_)));
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn test_utc_timestamp_is_rfc3339() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
