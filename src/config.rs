//! Configuration management and validation.
//!
//! Provides configuration structures for the watched directory, the metric
//! series identity, timestamp interpretation, daemon polling and the
//! InfluxDB connection. Everything the pipeline needs is passed in through
//! [`IngestConfig`]; nothing is read from process-wide state.

use crate::constants::{
    DEFAULT_FILE_PATTERN, DEFAULT_HOST_TAG, DEFAULT_INFLUX_DATABASE, DEFAULT_INFLUX_HOST,
    DEFAULT_INFLUX_PASSWORD, DEFAULT_INFLUX_PORT, DEFAULT_INFLUX_USER, DEFAULT_MEASUREMENT,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_WATCH_SUBDIR, DEFAULT_WRITE_BATCH_SIZE,
};
use crate::error::{IngestError, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Zone used to interpret timestamps that carry no offset of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceZone {
    /// The host's local time zone
    #[default]
    Local,
    /// Coordinated Universal Time
    Utc,
    /// A fixed offset east of UTC, in seconds
    Offset(i32),
}

impl SourceZone {
    /// Fixed offset for this zone, `None` for [`SourceZone::Local`]
    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        match self {
            SourceZone::Local => None,
            SourceZone::Utc => FixedOffset::east_opt(0),
            SourceZone::Offset(seconds) => FixedOffset::east_opt(*seconds),
        }
    }
}

impl FromStr for SourceZone {
    type Err = IngestError;

    /// Accepts `local`, `utc` or an offset such as `+02:00`, `-0530`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(SourceZone::Local),
            "utc" | "z" => return Ok(SourceZone::Utc),
            _ => {}
        }

        let invalid = || IngestError::configuration(format!("Invalid source zone '{}'", s));

        let (sign, rest) = match trimmed.chars().next() {
            Some('+') => (1, &trimmed[1..]),
            Some('-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };

        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        Ok(SourceZone::Offset(sign * (hours * 3600 + minutes * 60)))
    }
}

impl fmt::Display for SourceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceZone::Local => write!(f, "local"),
            SourceZone::Utc => write!(f, "utc"),
            SourceZone::Offset(seconds) => {
                let sign = if *seconds < 0 { '-' } else { '+' };
                let abs = seconds.abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

/// Connection settings for the InfluxDB 1.x HTTP write API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,

    /// Maximum points per write request
    pub batch_size: usize,

    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_INFLUX_HOST.to_string(),
            port: DEFAULT_INFLUX_PORT,
            username: DEFAULT_INFLUX_USER.to_string(),
            password: DEFAULT_INFLUX_PASSWORD.to_string(),
            database: DEFAULT_INFLUX_DATABASE.to_string(),
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            timeout: None,
        }
    }
}

impl InfluxConfig {
    /// Base URL of the server, without a trailing slash
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Global configuration for an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory scanned for sensor logs
    pub watch_dir: PathBuf,

    /// Glob pattern matched against file names in `watch_dir`
    pub file_pattern: String,

    /// Restrict batch mode to this single file
    pub target_file: Option<PathBuf>,

    /// Series name attached to every point
    pub measurement: String,

    /// Constant tag set attached to every point
    pub tags: BTreeMap<String, String>,

    /// Zone for timestamps without an explicit offset
    pub source_zone: SourceZone,

    /// Delay between daemon polls
    pub poll_interval: Duration,

    /// Metric sink connection
    pub influx: InfluxConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let watch_dir = dirs::document_dir()
            .map(|dir| dir.join(DEFAULT_WATCH_SUBDIR))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut tags = BTreeMap::new();
        tags.insert(
            DEFAULT_HOST_TAG.0.to_string(),
            DEFAULT_HOST_TAG.1.to_string(),
        );

        Self {
            watch_dir,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            target_file: None,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            tags,
            source_zone: SourceZone::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            influx: InfluxConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Create configuration watching `watch_dir`
    pub fn with_watch_dir(mut self, watch_dir: impl Into<PathBuf>) -> Self {
        self.watch_dir = watch_dir.into();
        self
    }

    /// Set the file name pattern
    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    /// Restrict batch mode to a single file
    pub fn with_target_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_file = Some(path.into());
        self
    }

    /// Set the measurement name
    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    /// Replace the tag set
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the source time zone
    pub fn with_source_zone(mut self, zone: SourceZone) -> Self {
        self.source_zone = zone;
        self
    }

    /// Set the daemon poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the InfluxDB settings
    pub fn with_influx(mut self, influx: InfluxConfig) -> Self {
        self.influx = influx;
        self
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.file_pattern.trim().is_empty() {
            return Err(IngestError::configuration("File pattern must not be empty"));
        }

        if self.measurement.trim().is_empty() {
            return Err(IngestError::configuration(
                "Measurement name must not be empty",
            ));
        }

        if self.tags.keys().any(|k| k.trim().is_empty()) {
            return Err(IngestError::configuration("Tag keys must not be empty"));
        }

        if self.poll_interval.is_zero() {
            return Err(IngestError::configuration(
                "Poll interval must be greater than zero",
            ));
        }

        if self.influx.batch_size == 0 {
            return Err(IngestError::configuration(
                "Write batch size must be greater than zero",
            ));
        }

        if self.influx.database.trim().is_empty() {
            return Err(IngestError::configuration("Database name must not be empty"));
        }

        Ok(())
    }
}
