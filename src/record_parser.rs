//! CSV record reading for sensor logs.
//!
//! Reads a delimited file into ordered header/value records using the first
//! row as the header. Column counts are strict: a row that does not match
//! the header width is reported as malformed rather than padded.
//!
//! A byte-order mark at the start of the file stays on the first header
//! key; removing it is the normalizer's job.

use crate::constants::BYTE_ORDER_MARK;
use crate::error::{IngestError, Result};
use crate::models::RawRecord;
use csv::{ErrorKind, StringRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Read every data row of `path` as a [`RawRecord`]
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path).map_err(|e| IngestError::file_access(path, e))?;
    let mut input = BufReader::new(file);
    let has_bom = input
        .fill_buf()
        .map_err(|e| IngestError::file_access(path, e))?
        .starts_with(UTF8_BOM);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(input);

    let headers = reader.headers().map_err(|e| map_csv_error(path, e))?;
    let headers = if has_bom {
        restore_bom(headers)
    } else {
        headers.clone()
    };

    let mut records: Vec<RawRecord> = Vec::new();
    let mut row = StringRecord::new();

    while reader
        .read_record(&mut row)
        .map_err(|e| map_csv_error(path, e))?
    {
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    debug!(
        "Read {} rows with {} columns from {}",
        records.len(),
        headers.len(),
        path.display()
    );

    Ok(records)
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Put the byte-order mark back on the first header; the csv reader drops it
fn restore_bom(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == 0 && !name.starts_with(BYTE_ORDER_MARK) {
                format!("{}{}", BYTE_ORDER_MARK, name)
            } else {
                name.to_string()
            }
        })
        .collect()
}

fn map_csv_error(path: &Path, error: csv::Error) -> IngestError {
    let line = error.position().map(|p| p.line());
    match error.into_kind() {
        ErrorKind::Io(source) => IngestError::file_access(path, source),
        ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => IngestError::malformed(
            path,
            format!(
                "line {}: expected {} fields, found {}",
                line.unwrap_or_default(),
                expected_len,
                len
            ),
        ),
        ErrorKind::Utf8 { err, .. } => IngestError::malformed(
            path,
            format!("line {}: invalid UTF-8 ({})", line.unwrap_or_default(), err),
        ),
        other => IngestError::malformed(path, format!("{:?}", other)),
    }
}
