//! Core data structures for sensor-log ingestion.
//!
//! Defines the records flowing through the pipeline (raw, normalized and
//! metric point), discovered source files and per-run statistics.

use crate::constants::{BYTE_ORDER_MARK, TIMESTAMP_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// One data row as read from a file: header/value pairs in column order
///
/// The first header may still carry a byte-order mark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Raw value for `key`, matched exactly (BOM included)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Header name with any leading byte-order mark removed
pub fn strip_bom(key: &str) -> &str {
    key.trim_start_matches(BYTE_ORDER_MARK)
}

/// A normalized field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Measurement(f64),
    /// Canonical UTC timestamp string
    Timestamp(String),
}

/// A normalized row: measurements plus at most one canonical `Timestamp`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl CleanRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_measurement(&mut self, key: impl Into<String>, value: f64) {
        self.fields
            .insert(key.into(), FieldValue::Measurement(value));
    }

    /// Set the record timestamp, replacing any previous one
    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) {
        self.fields.insert(
            TIMESTAMP_FIELD.to_string(),
            FieldValue::Timestamp(timestamp.into()),
        );
    }

    /// Canonical timestamp, if present
    pub fn timestamp(&self) -> Option<&str> {
        match self.fields.get(TIMESTAMP_FIELD) {
            Some(FieldValue::Timestamp(ts)) => Some(ts.as_str()),
            _ => None,
        }
    }

    /// Remove and return the canonical timestamp
    pub fn take_timestamp(&mut self) -> Option<String> {
        match self.fields.remove(TIMESTAMP_FIELD) {
            Some(FieldValue::Timestamp(ts)) => Some(ts),
            Some(other) => {
                self.fields.insert(TIMESTAMP_FIELD.to_string(), other);
                None
            }
            None => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Measurement value for `key`
    pub fn measurement(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(FieldValue::Measurement(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the record, yielding every measurement
    pub fn into_measurements(self) -> impl Iterator<Item = (String, f64)> {
        self.fields.into_iter().filter_map(|(k, v)| match v {
            FieldValue::Measurement(value) => Some((k, value)),
            FieldValue::Timestamp(_) => None,
        })
    }
}

/// A tagged, timestamped set of numeric fields ready for the metric sink
///
/// Serializes to `{"measurement", "tags", "time", "fields"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    /// UTC, second precision, `YYYY-MM-DDTHH:MM:SSZ`
    pub time: String,
    pub fields: BTreeMap<String, f64>,
}

/// A candidate log file found in the watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Creation time, or modification time where the filesystem lacks it
    pub created: SystemTime,
}

/// Processing statistics for one batch run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_deleted: usize,
    pub delete_failures: usize,
    pub points_built: usize,
    pub points_sent: usize,
    pub processing_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}Timestamp"), "Timestamp");
        assert_eq!(strip_bom("Timestamp"), "Timestamp");
        assert_eq!(strip_bom("CPU \u{feff}"), "CPU \u{feff}");
    }

    #[test]
    fn test_take_timestamp_leaves_measurements() {
        let mut record = CleanRecord::new();
        record.insert_measurement("Temp", 45.2);
        record.set_timestamp("2024-01-01T12:00:00Z");

        assert_eq!(record.take_timestamp().as_deref(), Some("2024-01-01T12:00:00Z"));
        assert!(!record.contains_key("Timestamp"));
        assert_eq!(record.measurement("Temp"), Some(45.2));
        assert_eq!(record.take_timestamp(), None);
    }

    #[test]
    fn test_metric_point_json_shape() {
        let point = MetricPoint {
            measurement: "corsair_icue".to_string(),
            tags: BTreeMap::from([("host".to_string(), "NOMAD".to_string())]),
            time: "2024-01-01T12:00:00Z".to_string(),
            fields: BTreeMap::from([("Temp".to_string(), 45.2)]),
        };

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["measurement"], "corsair_icue");
        assert_eq!(json["tags"]["host"], "NOMAD");
        assert_eq!(json["time"], "2024-01-01T12:00:00Z");
        assert_eq!(json["fields"]["Temp"], 45.2);
    }
}
