//! Input validation for Orebook writes
//!
//! Field rules are evaluated together and every violation is reported, so a
//! form can be re-presented with all of its problems at once:
//! - Site coordinates within geographic bounds
//! - Non-negative production volumes (sites and production stats)
//! - Unique, non-empty usernames
//!
//! Countries and minerals carry no numeric bounds.

use crate::entities::EntityKind;
use crate::record::Record;
use crate::{OrebookError, Result};

/// Latitude bounds in degrees
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Longitude bounds in degrees
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Maximum length for usernames and share values
pub const MAX_IDENTIFIER_LEN: usize = 100;

/// Collect every rule violation for a candidate record, in rule order.
///
/// `existing` is the current collection; the candidate's own row (same id) is
/// ignored for uniqueness checks so that updates do not collide with
/// themselves.
pub fn collect_violations(kind: EntityKind, candidate: &Record, existing: &[Record]) -> Vec<String> {
    let mut errors = Vec::new();

    match kind {
        EntityKind::Sites => {
            check_range(&mut errors, candidate, "Latitude", LATITUDE_RANGE);
            check_range(&mut errors, candidate, "Longitude", LONGITUDE_RANGE);
            check_non_negative(&mut errors, candidate, "Production_tonnes");
        }
        EntityKind::Production => {
            check_non_negative(&mut errors, candidate, "Production_tonnes");
        }
        EntityKind::Users => {
            check_username(&mut errors, candidate, existing, kind.spec().id_field());
        }
        EntityKind::Countries | EntityKind::Minerals => {}
    }

    errors
}

/// Validate a candidate record, failing with every violation found.
pub fn validate_record(kind: EntityKind, candidate: &Record, existing: &[Record]) -> Result<()> {
    let errors = collect_violations(kind, candidate, existing);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(OrebookError::InvalidField(errors))
    }
}

fn check_range(errors: &mut Vec<String>, record: &Record, field: &str, (min, max): (f64, f64)) {
    match record.get_or_empty(field).trim().parse::<f64>() {
        // NaN fails both comparisons and lands in the bounds message
        Ok(value) if value >= min && value <= max => {}
        Ok(_) => errors.push(format!("{} must be between {} and {}", field, min, max)),
        Err(_) => errors.push(format!("{} must be a valid number", field)),
    }
}

fn check_non_negative(errors: &mut Vec<String>, record: &Record, field: &str) {
    let raw = record.get_or_empty(field).trim();
    let raw = if raw.is_empty() { "0" } else { raw };
    match raw.parse::<f64>() {
        Ok(value) if value >= 0.0 => {}
        Ok(_) => errors.push(format!("{} must be non-negative", field)),
        Err(_) => errors.push(format!("{} must be a number", field)),
    }
}

fn check_username(errors: &mut Vec<String>, candidate: &Record, existing: &[Record], id_field: &str) {
    let username = candidate.get_or_empty("Username");
    if username.trim().is_empty() {
        errors.push("Username is required".to_string());
        return;
    }
    if username.len() > MAX_IDENTIFIER_LEN {
        errors.push(format!(
            "Username too long: {} > {} characters",
            username.len(),
            MAX_IDENTIFIER_LEN
        ));
    }

    let own_id = candidate.integer(id_field);
    let taken = existing.iter().any(|other| {
        other.get("Username") == Some(username) && (own_id.is_none() || other.integer(id_field) != own_id)
    });
    if taken {
        errors.push("Username already exists".to_string());
    }
}

/// Validate the value of a dataset share (role name or username).
pub fn validate_share_value(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OrebookError::invalid("Share value cannot be empty"));
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(OrebookError::invalid(format!(
            "Share value too long: {} > {} characters",
            value.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if value.contains(['\n', '\r', '\0']) {
        return Err(OrebookError::invalid(
            "Share value contains control characters",
        ));
    }

    Ok(())
}

/// Format of an uploaded dataset, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    /// `.xlsx` or `.xls`; the first worksheet is converted to CSV
    Spreadsheet,
}

/// Validate the file name of an uploaded dataset and return its format.
///
/// CSV and Excel workbooks are accepted; names with traversal patterns or
/// null bytes are rejected.
pub fn validate_upload_filename(name: &str) -> Result<UploadFormat> {
    if name.is_empty() {
        return Err(OrebookError::invalid("No file uploaded."));
    }

    if name.contains("..") || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(OrebookError::invalid("File name contains a path component"));
    }

    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        Ok(UploadFormat::Csv)
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        Ok(UploadFormat::Spreadsheet)
    } else {
        Err(OrebookError::invalid(
            "Unsupported file type; upload a .csv, .xlsx or .xls file",
        ))
    }
}
