//! Sensor Log Ingestion Library
//!
//! Republishes CSV exports from a hardware-monitoring utility (temperatures,
//! fan speeds, voltages with unit suffixes) as timestamped metric points in
//! a time-series database.
//!
//! This library provides tools for:
//! - Selecting log files from a watched directory (all files or the newest)
//! - Reading CSV rows, including files whose header starts with a BOM
//! - Stripping unit suffixes and normalizing timestamps to UTC
//! - Building tagged metric points and writing them to InfluxDB
//! - Running as a one-shot batch drain or as a polling daemon

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod point_builder;
pub mod processor;
pub mod record_parser;
pub mod sink;

// Re-export commonly used types
pub use config::{IngestConfig, InfluxConfig, SourceZone};
pub use error::{IngestError, Result};
pub use models::{CleanRecord, FieldValue, MetricPoint, ProcessingStats, RawRecord, SourceFile};
pub use processor::{BatchMode, IngestProcessor};
pub use sink::{InfluxSink, MetricSink};
