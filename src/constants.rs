//! Application constants for the ingestion pipeline
//!
//! Default values, field names and character sets shared by the parser,
//! normalizer, point builder and sink.

// =============================================================================
// Input Files
// =============================================================================

/// Pattern matched against file names in the watched directory
pub const DEFAULT_FILE_PATTERN: &str = "*.csv";

/// Sub-directory of the user's documents folder used as the default watch dir
pub const DEFAULT_WATCH_SUBDIR: &str = "corsair_logging";

/// Column holding the row timestamp
pub const TIMESTAMP_FIELD: &str = "Timestamp";

/// Byte-order mark that may prefix the first header
pub const BYTE_ORDER_MARK: char = '\u{feff}';

// =============================================================================
// Normalization
// =============================================================================

/// Characters right-trimmed from measurement values (unit suffixes)
///
/// Treated as a character class, not as tokens: `"12.0VM"` and `"12.0MV"`
/// both become `"12.0"`.
pub const UNIT_SUFFIX_CHARS: &[char] = &['°', 'C', 'R', 'P', 'M', '%', 'A', 'V'];

/// Characters right-trimmed from timestamp values (12-hour clock marker)
pub const MERIDIEM_CHARS: &[char] = &['A', 'P', 'M'];

/// Canonical UTC output format for timestamps
pub const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// =============================================================================
// Metric Series
// =============================================================================

/// Measurement (series) name for every point
pub const DEFAULT_MEASUREMENT: &str = "corsair_icue";

/// Default deployment identity tag
pub const DEFAULT_HOST_TAG: (&str, &str) = ("host", "NOMAD");

// =============================================================================
// InfluxDB Sink
// =============================================================================

pub const DEFAULT_INFLUX_HOST: &str = "localhost";
pub const DEFAULT_INFLUX_PORT: u16 = 8086;
pub const DEFAULT_INFLUX_USER: &str = "root";
pub const DEFAULT_INFLUX_PASSWORD: &str = "root";
pub const DEFAULT_INFLUX_DATABASE: &str = "db0";

/// Maximum points per HTTP write request
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 10_000;

// =============================================================================
// Daemon Mode
// =============================================================================

/// Seconds between daemon polls of the latest file
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;

// =============================================================================
// Logging
// =============================================================================

/// Log target used to build the default `EnvFilter` directive
pub const LOG_TARGET: &str = "icue_ingest";
