//! Metric point assembly.
//!
//! Turns a normalized record into a [`MetricPoint`] carrying the configured
//! measurement name and tag set.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::models::{CleanRecord, MetricPoint};
use std::collections::BTreeMap;

/// Builds metric points for one series
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
}

impl PointBuilder {
    pub fn new(measurement: impl Into<String>, tags: BTreeMap<String, String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
        }
    }

    /// Builder using the measurement and tags from `config`
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.measurement.clone(), config.tags.clone())
    }

    /// Move the timestamp out of `record` and wrap the rest as fields
    pub fn build(&self, mut record: CleanRecord) -> Result<MetricPoint> {
        let time = record
            .take_timestamp()
            .ok_or(IngestError::MissingTimestamp)?;

        Ok(MetricPoint {
            measurement: self.measurement.clone(),
            tags: self.tags.clone(),
            time,
            fields: record.into_measurements().collect(),
        })
    }
}
