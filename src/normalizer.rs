//! Field normalization for sensor-log records.
//!
//! Converts a [`RawRecord`] into a [`CleanRecord`]: measurement values lose
//! their unit suffixes and become `f64`, and the `Timestamp` field is parsed
//! with a lenient date/time grammar and re-emitted as a canonical UTC
//! string.
//!
//! Suffix removal is a right-trim over a character class, so a value is
//! stripped of any trailing run of characters drawn from the set, in any
//! order. The same applies to the AM/PM marker on timestamps: the marker is
//! removed, not interpreted, so `10:05 PM` is read as `10:05`.

use crate::config::SourceZone;
use crate::constants::{CANONICAL_TIME_FORMAT, MERIDIEM_CHARS, TIMESTAMP_FIELD, UNIT_SUFFIX_CHARS};
use crate::error::{IngestError, Result};
use crate::models::{CleanRecord, RawRecord, strip_bom};
use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use tracing::{debug, trace};

/// Formats carrying their own UTC offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

/// Zone-less date and time formats, month-first before day-first
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%m/%d/%y %H:%M:%S%.f",
    "%m/%d/%y %H:%M",
    "%d/%m/%y %H:%M:%S%.f",
    "%d/%m/%y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%m-%d-%Y %H:%M:%S%.f",
    "%m-%d-%Y %H:%M",
    "%b %d %Y %H:%M:%S%.f",
    "%b %d %Y %H:%M",
    "%b %d, %Y %H:%M:%S%.f",
    "%b %d, %Y %H:%M",
    "%d %b %Y %H:%M:%S%.f",
    "%d %b %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%d %b %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Normalizes raw records into typed measurements and a canonical timestamp
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldNormalizer {
    zone: SourceZone,
}

impl FieldNormalizer {
    /// Create a normalizer interpreting zone-less timestamps in `zone`
    pub fn new(zone: SourceZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> SourceZone {
        self.zone
    }

    /// Normalize one record
    ///
    /// Any byte-order mark on a header is dropped, so the result holds
    /// exactly one `Timestamp` key when the input had a timestamp column.
    pub fn normalize(&self, raw: &RawRecord) -> Result<CleanRecord> {
        let mut clean = CleanRecord::new();

        for (key, value) in raw.iter() {
            let name = strip_bom(key);
            if name == TIMESTAMP_FIELD {
                let timestamp = self.clean_timestamp(value)?;
                trace!("{}: '{}' -> {}", name, value, timestamp);
                clean.set_timestamp(timestamp);
            } else {
                clean.insert_measurement(name, clean_numeric(name, value)?);
            }
        }

        Ok(clean)
    }

    /// Parse a raw timestamp and format it as `YYYY-MM-DDTHH:MM:SSZ`
    pub fn clean_timestamp(&self, raw: &str) -> Result<String> {
        let stripped = raw.trim().trim_end_matches(MERIDIEM_CHARS).trim();

        let utc = self
            .parse_timestamp(stripped)
            .ok_or_else(|| IngestError::TimestampParse {
                value: raw.to_string(),
            })?;

        Ok(utc.format(CANONICAL_TIME_FORMAT).to_string())
    }

    /// Parse `text` with the lenient grammar and convert it to UTC
    pub fn parse_timestamp(&self, text: &str) -> Option<DateTime<Utc>> {
        if text.is_empty() {
            return None;
        }

        if let Some(dt) = parse_with_offset(text) {
            return Some(dt);
        }

        let naive = parse_naive(text).or_else(|| {
            parse_time_only(text).map(|time| self.today().and_time(time))
        })?;

        let converted = self.localize(naive);
        if converted.is_none() {
            debug!("Local time {} does not exist in zone {}", naive, self.zone);
        }
        converted
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.zone.fixed_offset() {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            None => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Current date in the source zone, used for time-only values
    fn today(&self) -> NaiveDate {
        match self.zone.fixed_offset() {
            Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
            None => Local::now().date_naive(),
        }
    }
}

/// Strip unit suffixes from `raw` and parse the remainder as `f64`
pub fn clean_numeric(field: &str, raw: &str) -> Result<f64> {
    let stripped = raw.trim().trim_end_matches(UNIT_SUFFIX_CHARS).trim();

    stripped
        .parse::<f64>()
        .map_err(|_| IngestError::NumericParse {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

fn parse_with_offset(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    // `%Y` happily reads two-digit years as the first century; those are
    // left for the `%y` formats further down the list.
    DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .find(|dt| dt.year() >= 1000)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .find(|d| d.year() >= 1000)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time_only(text: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}
