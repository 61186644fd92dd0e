//! Error handling for sensor-log ingestion.
//!
//! Provides error types with context for file access, record parsing,
//! value normalization, file selection and metric delivery failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Cannot access file: {path}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in file: {path} - {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("Field '{field}' is not numeric: '{value}'")]
    NumericParse { field: String, value: String },

    #[error("Unrecognised timestamp: '{value}'")]
    TimestampParse { value: String },

    #[error("Record has no Timestamp field")]
    MissingTimestamp,

    #[error("No files matching '{pattern}' in: {dir}")]
    NoFilesFound { dir: PathBuf, pattern: String },

    #[error("Watch directory not found: {path}")]
    WatchDirNotFound { path: PathBuf },

    #[error("File has no data rows: {path}")]
    EmptySource { path: PathBuf },

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Metric sink write failed: {message}")]
    SinkWrite { message: String },

    #[error("Failed to delete file: {path}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl IngestError {
    /// Create a file access error for `path`
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed record error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(message: impl Into<String>) -> Self {
        Self::SinkWrite {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
