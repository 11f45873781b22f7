//! Scan records
//!
//! A [`ScanRecord`] is one joined row: the scan itself, the student or
//! professional it belongs to, the fair and team, and any free-form attribute
//! values and demographic flags collapsed onto it. Fields are addressed by
//! their catalog name; a field that is absent from the map is null.

use super::ids::{FairId, ScanId, TeamId};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

/// Semantic type of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Timestamp,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
        };
        write!(f, "{name}")
    }
}

/// A non-null field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    /// The kind carried by this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Boolean(_) => FieldKind::Boolean,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// One scan, materialized by the fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Scan id; the row that receives the delivery link
    pub scan_id: ScanId,

    /// Destination team
    pub team_id: TeamId,

    /// Fair the scan was captured at
    pub fair_id: FairId,

    fields: HashMap<&'static str, FieldValue>,
}

impl ScanRecord {
    /// Creates a record with no fields set
    pub fn new(scan_id: ScanId, team_id: TeamId, fair_id: FairId) -> Self {
        Self {
            scan_id,
            team_id,
            fair_id,
            fields: HashMap::new(),
        }
    }

    /// Sets a field, replacing any previous value
    pub fn set(&mut self, field: &'static str, value: impl Into<FieldValue>) {
        self.fields.insert(field, value.into());
    }

    /// Sets a field when the value is present; leaves it null otherwise
    pub fn set_opt<V: Into<FieldValue>>(&mut self, field: &'static str, value: Option<V>) {
        if let Some(value) = value {
            self.set(field, value);
        }
    }

    /// Builder-style [`ScanRecord::set`]
    pub fn with(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the value of a field, `None` when null
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Whether the field holds a value
    pub fn is_set(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ScanRecord {
        ScanRecord::new(ScanId::new(1), TeamId::new(2), FairId::new(3))
    }

    #[test]
    fn test_unset_field_is_null() {
        assert!(record().get("notes").is_none());
    }

    #[test]
    fn test_set_opt_none_leaves_null() {
        let mut rec = record();
        rec.set_opt::<String>("notes", None);
        assert!(!rec.is_set("notes"));

        rec.set_opt("notes", Some("met at booth"));
        assert_eq!(rec.get("notes"), Some(&FieldValue::Text("met at booth".to_string())));
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(FieldValue::from(true).kind(), FieldKind::Boolean);
        assert_eq!(FieldValue::from(5_i64).kind(), FieldKind::Integer);
        assert_eq!(FieldKind::Timestamp.to_string(), "timestamp");
    }
}
