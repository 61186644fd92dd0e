//! Ingestion engine.
//!
//! Composes file discovery, record parsing, normalization and point
//! building, and delivers the result to a [`MetricSink`] in one of two
//! modes:
//!
//! - **batch**: drain every file in the watched directory, optionally
//!   sending and deleting each one;
//! - **daemon**: repeatedly send the newest row of the newest file until
//!   cancelled.
//!
//! Delivery is at-least-once. A file is deleted only after its points were
//! accepted by the sink, and a failed delete leaves it to be sent again on
//! the next run.

pub mod discovery;

#[cfg(test)]
pub mod tests;

use self::discovery::FileSelector;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::models::{CleanRecord, MetricPoint, ProcessingStats, SourceFile};
use crate::normalizer::FieldNormalizer;
use crate::point_builder::PointBuilder;
use crate::record_parser::read_records;
use crate::sink::MetricSink;

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a batch run should do with each file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchMode {
    /// Parse files and build points
    pub read: bool,
    /// Deliver points and delete delivered files (requires `read`)
    pub send: bool,
}

impl BatchMode {
    pub fn new(read: bool, send: bool) -> Self {
        Self { read, send }
    }

    /// Read and send
    pub fn drain() -> Self {
        Self::new(true, true)
    }

    /// Read only
    pub fn read_only() -> Self {
        Self::new(true, false)
    }

    pub fn is_idle(&self) -> bool {
        !self.read
    }
}

/// Main processor driving the ingestion pipeline
#[derive(Debug)]
pub struct IngestProcessor<S> {
    config: IngestConfig,
    selector: FileSelector,
    normalizer: FieldNormalizer,
    builder: PointBuilder,
    sink: S,
}

impl<S: MetricSink> IngestProcessor<S> {
    /// Create a processor from validated configuration and a sink
    pub fn new(config: IngestConfig, sink: S) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            selector: FileSelector::from_config(&config),
            normalizer: FieldNormalizer::new(config.source_zone),
            builder: PointBuilder::from_config(&config),
            config,
            sink,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process every discovered file once
    ///
    /// Errors on one file are logged and counted; the run continues with
    /// the next file. Only a failure to list the directory aborts the run.
    pub async fn run_batch(&self, mode: BatchMode) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let mut stats = ProcessingStats::default();

        if mode.is_idle() {
            info!("Nothing requested (neither --read nor --send); idle run");
            return Ok(stats);
        }

        let files = self.selector.all_files()?;
        stats.files_discovered = files.len();
        info!(
            "Found {} files in {}",
            files.len(),
            self.selector.watch_dir().display()
        );

        for file in &files {
            info!("Reading {}", file.path.display());

            let points = match self.build_points(&file.path).await {
                Ok(points) => points,
                Err(e) => {
                    error!("Failed to process {}: {}", file.path.display(), e);
                    stats.files_failed += 1;
                    continue;
                }
            };

            stats.points_built += points.len();
            debug!(
                "Payload for {}: {}",
                file.path.display(),
                serde_json::to_string(&points).unwrap_or_default()
            );

            if mode.send {
                if let Err(e) = self.deliver(file, &points).await {
                    error!("Failed to send {}: {}", file.path.display(), e);
                    stats.files_failed += 1;
                    continue;
                }
                stats.points_sent += points.len();

                match delete_file(&file.path).await {
                    Ok(()) => stats.files_deleted += 1,
                    Err(e) => {
                        warn!("{}", e);
                        stats.delete_failures += 1;
                    }
                }
            }

            stats.files_processed += 1;
            info!("Done with {}", file.path.display());
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        Ok(stats)
    }

    /// Poll the newest file until `cancel` fires
    ///
    /// A failed tick is logged and the loop carries on with the next poll.
    pub async fn run_daemon(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Watching {} every {:?} (timestamps read as {})",
            self.selector.watch_dir().display(),
            self.config.poll_interval,
            self.normalizer.zone()
        );

        while !cancel.is_cancelled() {
            match self.tick().await {
                Ok(point) => info!("Sent point at {} ({} fields)", point.time, point.fields.len()),
                Err(e) => error!("Daemon tick failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Send the most recent row of the newest file as a single point
    pub async fn tick(&self) -> Result<MetricPoint> {
        let latest = self.selector.latest_file()?;
        let records = self.load_clean_records(&latest.path).await?;

        let last = latest_record(records).ok_or_else(|| IngestError::EmptySource {
            path: latest.path.clone(),
        })?;

        let point = self.builder.build(last)?;
        debug!(
            "Latest point: {}",
            serde_json::to_string(&point).unwrap_or_default()
        );

        self.sink.write_points(std::slice::from_ref(&point)).await?;
        Ok(point)
    }

    /// Parse, normalize and build every row of `path`
    pub async fn build_points(&self, path: &Path) -> Result<Vec<MetricPoint>> {
        self.load_clean_records(path)
            .await?
            .into_iter()
            .map(|record| self.builder.build(record))
            .collect()
    }

    /// Parse and normalize every row of `path`
    pub async fn load_clean_records(&self, path: &Path) -> Result<Vec<CleanRecord>> {
        let path_for_task: PathBuf = path.to_path_buf();
        let normalizer = self.normalizer;

        task::spawn_blocking(move || {
            read_records(&path_for_task)?
                .iter()
                .map(|raw| normalizer.normalize(raw))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| task_failed(path, e))?
    }

    async fn deliver(&self, file: &SourceFile, points: &[MetricPoint]) -> Result<()> {
        if points.is_empty() {
            debug!("No rows in {}, nothing to send", file.path.display());
            return Ok(());
        }

        info!("Sending {} points...", points.len());
        self.sink.write_points(points).await?;
        info!("Done sending {}", file.path.display());
        Ok(())
    }
}

/// The record with the greatest canonical timestamp
///
/// Canonical timestamps sort lexicographically in time order. The sort is
/// stable, so among equal timestamps the last row in the file wins.
pub fn latest_record(mut records: Vec<CleanRecord>) -> Option<CleanRecord> {
    records.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()));
    records.pop()
}

/// A parser task that panicked or was cancelled
pub(crate) fn task_failed(path: &Path, error: task::JoinError) -> IngestError {
    IngestError::ProcessingFailed {
        path: path.to_path_buf(),
        reason: format!("parser task failed: {}", error),
    }
}

async fn delete_file(path: &Path) -> Result<()> {
    info!("Deleting {}", path.display());
    fs::remove_file(path)
        .await
        .map_err(|source| IngestError::FileDelete {
            path: path.to_path_buf(),
            source,
        })
}
