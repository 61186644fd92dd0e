//! File discovery for the watched directory
//!
//! Scans one directory for sensor logs on every call (nothing is cached)
//! and supports the two selection policies used by the orchestrator:
//! every matching file for batch runs, and the most recently created file
//! for the daemon.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::models::SourceFile;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// File selection over one watched directory
#[derive(Debug, Clone)]
pub struct FileSelector {
    watch_dir: PathBuf,
    pattern: String,
    target_file: Option<PathBuf>,
}

impl FileSelector {
    /// Create a selector matching `pattern` inside `watch_dir`
    pub fn new(watch_dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            pattern: pattern.into(),
            target_file: None,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            watch_dir: config.watch_dir.clone(),
            pattern: config.file_pattern.clone(),
            target_file: config.target_file.clone(),
        }
    }

    /// Restrict [`FileSelector::all_files`] to a single file
    pub fn with_target_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_file = Some(path.into());
        self
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Every matching file, sorted by path
    ///
    /// When a target file is configured only that file is returned.
    pub fn all_files(&self) -> Result<Vec<SourceFile>> {
        if let Some(target) = &self.target_file {
            let path = self.resolve_target(target);
            let metadata = fs::metadata(&path).map_err(|e| IngestError::file_access(&path, e))?;
            return Ok(vec![SourceFile {
                created: created_time(&metadata),
                path,
            }]);
        }

        self.scan()
    }

    /// The matching file with the greatest creation time
    pub fn latest_file(&self) -> Result<SourceFile> {
        let files = self.scan()?;
        let latest = latest_of(&files)
            .cloned()
            .ok_or_else(|| IngestError::NoFilesFound {
                dir: self.watch_dir.clone(),
                pattern: self.pattern.clone(),
            })?;

        debug!("Latest file: {}", latest.path.display());
        Ok(latest)
    }

    fn scan(&self) -> Result<Vec<SourceFile>> {
        if !self.watch_dir.is_dir() {
            return Err(IngestError::WatchDirNotFound {
                path: self.watch_dir.clone(),
            });
        }

        let full_pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.watch_dir.to_string_lossy()),
            self.pattern
        );

        let entries = glob::glob(&full_pattern).map_err(|e| IngestError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: e.msg.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry {}: {}", e.path().display(), e);
                    continue;
                }
            };

            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => files.push(SourceFile {
                    created: created_time(&metadata),
                    path,
                }),
                Ok(_) => {}
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            "Found {} files matching '{}' in {}",
            files.len(),
            self.pattern,
            self.watch_dir.display()
        );

        Ok(files)
    }

    fn resolve_target(&self, target: &Path) -> PathBuf {
        if target.is_relative() && !target.exists() {
            self.watch_dir.join(target)
        } else {
            target.to_path_buf()
        }
    }
}

/// The file with the greatest creation time, `None` for an empty slice
pub fn latest_of(files: &[SourceFile]) -> Option<&SourceFile> {
    files.iter().max_by_key(|f| f.created)
}

/// Creation time, falling back to modification time where unsupported
fn created_time(metadata: &fs::Metadata) -> SystemTime {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(UNIX_EPOCH)
}
