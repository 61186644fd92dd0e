//! Metric sinks.
//!
//! The orchestrator only needs one capability from a store: accept a batch
//! of points in a single call. [`MetricSink`] captures that, and
//! [`influx::InfluxSink`] implements it against the InfluxDB 1.x HTTP API.

pub mod influx;

pub use influx::InfluxSink;

use crate::error::Result;
use crate::models::MetricPoint;
use async_trait::async_trait;

/// A store accepting batched, tagged, timestamped numeric points
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Write `points` in one logical call; one attempt, no retries
    async fn write_points(&self, points: &[MetricPoint]) -> Result<()>;
}

#[async_trait]
impl<S: MetricSink + ?Sized> MetricSink for std::sync::Arc<S> {
    async fn write_points(&self, points: &[MetricPoint]) -> Result<()> {
        (**self).write_points(points).await
    }
}
