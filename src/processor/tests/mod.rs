//! Integration tests for the processor module
//!
//! Tests both operating modes against temporary watch directories and an
//! in-memory sink.

pub mod daemon_mode;

use crate::config::{IngestConfig, SourceZone};
use crate::error::{IngestError, Result};
use crate::models::MetricPoint;
use crate::sink::MetricSink;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const HEADER: &str = "\u{feff}Timestamp,CPU Package,Fan #1,Load,Vcore";

/// Sink recording every write call, failing the first `fail_first` calls
#[derive(Debug, Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Vec<MetricPoint>>>,
    attempts: AtomicUsize,
    fail_first: usize,
    remove_on_write: Option<PathBuf>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    /// Sink that removes `path` while writing, so the later delete fails
    pub fn removing_on_write(path: impl Into<PathBuf>) -> Self {
        Self {
            remove_on_write: Some(path.into()),
            ..Self::default()
        }
    }

    /// Successful write calls
    pub fn writes(&self) -> Vec<Vec<MetricPoint>> {
        self.writes.lock().unwrap().clone()
    }

    /// Every call, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn write_points(&self, points: &[MetricPoint]) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(IngestError::sink_write("connection refused"));
        }
        if let Some(path) = &self.remove_on_write {
            fs::remove_file(path).unwrap();
        }
        self.writes.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

/// Configuration watching `dir` with UTC timestamps and a short poll interval
pub fn test_config(dir: &Path) -> IngestConfig {
    IngestConfig::default()
        .with_watch_dir(dir)
        .with_source_zone(SourceZone::Utc)
        .with_poll_interval(Duration::from_millis(10))
}

/// Write a sensor log with the standard header and the given timestamps
pub fn write_log(dir: &Path, name: &str, timestamps: &[&str]) -> PathBuf {
    let mut content = String::from(HEADER);
    content.push('\n');
    for (i, ts) in timestamps.iter().enumerate() {
        content.push_str(&format!(
            "{},{}.5°C,{}RPM,{}%,1.25V\n",
            ts,
            40 + i,
            1200 + i,
            10 + i
        ));
    }

    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Names of the files left in `dir`
pub fn remaining_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
