//! Flat records keyed by column name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field values submitted for a create or update, keyed by column name.
pub type FieldValues = BTreeMap<String, String>;

/// A single row of a flat collection.
///
/// Values are kept as the strings found in the backing file; typed accessors
/// parse on demand so that a malformed cell never prevents a collection from
/// loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of `field`, or the empty string when the column is absent.
    pub fn get_or_empty(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `field` as an integer.
    ///
    /// Accepts whole-number floats ("3.0") since spreadsheet tools commonly
    /// write integer columns that way.
    pub fn integer(&self, field: &str) -> Option<i64> {
        parse_integer(self.get(field)?)
    }

    /// Parse `field` as a real number.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field)?.trim().parse::<f64>().ok()
    }

    /// Parse `field` as a real number, treating missing or malformed cells as zero.
    pub fn number_or_zero(&self, field: &str) -> f64 {
        self.number(field).filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Parse an identifier cell.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_parsing() {
        let r = Record::from_pairs([("a", "3"), ("b", "4.0"), ("c", "4.5"), ("d", " 7 "), ("e", "x")]);
        assert_eq!(r.integer("a"), Some(3));
        assert_eq!(r.integer("b"), Some(4));
        assert_eq!(r.integer("c"), None);
        assert_eq!(r.integer("d"), Some(7));
        assert_eq!(r.integer("e"), None);
        assert_eq!(r.integer("missing"), None);
    }

    #[test]
    fn test_number_or_zero() {
        let r = Record::from_pairs([("x", "12.5"), ("y", ""), ("z", "NaN")]);
        assert_eq!(r.number_or_zero("x"), 12.5);
        assert_eq!(r.number_or_zero("y"), 0.0);
        assert_eq!(r.number_or_zero("z"), 0.0);
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let r = Record::from_pairs([("CountryID", "1"), ("CountryName", "Testland")]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["CountryName"], "Testland");
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
