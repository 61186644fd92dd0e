//! Daemon mode tests

use super::{RecordingSink, remaining_files, test_config, write_log};
use crate::error::IngestError;
use crate::models::CleanRecord;
use crate::processor::{IngestProcessor, latest_record};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Cancel `token` once `condition` holds, or after a generous deadline
async fn cancel_when(token: CancellationToken, condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    token.cancel();
}

#[tokio::test]
async fn test_tick_sends_most_recent_row_not_last_row() {
    let temp_dir = TempDir::new().unwrap();
    write_log(
        temp_dir.path(),
        "live.csv",
        &[
            "2024-01-15 10:00:00",
            "2024-01-15 10:05:00",
            "2024-01-15 09:58:00",
        ],
    );

    let processor = IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::new()).unwrap();
    let point = processor.tick().await.unwrap();

    assert_eq!(point.time, "2024-01-15T10:05:00Z");
    // Second row in the file
    assert_eq!(point.fields.get("CPU Package"), Some(&41.5));

    let writes = processor.sink().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], vec![point]);

    // Daemon mode never deletes
    assert_eq!(remaining_files(temp_dir.path()), vec!["live.csv"]);
}

#[tokio::test]
async fn test_tick_reads_newest_file() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "b_older.csv", &["2024-01-15 12:00:00"]);
    thread::sleep(Duration::from_millis(50));
    write_log(temp_dir.path(), "a_newer.csv", &["2024-01-15 08:00:00"]);

    let processor = IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::new()).unwrap();
    let point = processor.tick().await.unwrap();

    assert_eq!(point.time, "2024-01-15T08:00:00Z");
}

#[tokio::test]
async fn test_tick_errors() {
    let temp_dir = TempDir::new().unwrap();
    let processor = IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::new()).unwrap();

    assert!(matches!(
        processor.tick().await,
        Err(IngestError::NoFilesFound { .. })
    ));

    write_log(temp_dir.path(), "empty.csv", &[]);
    assert!(matches!(
        processor.tick().await,
        Err(IngestError::EmptySource { .. })
    ));
    assert_eq!(processor.sink().attempts(), 0);
}

#[tokio::test]
async fn test_daemon_survives_failed_ticks_and_stops_on_cancel() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "live.csv", &["2024-01-15 10:00:00"]);

    let processor =
        IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::failing_first(2)).unwrap();
    let token = CancellationToken::new();

    let (result, _) = tokio::join!(
        processor.run_daemon(token.clone()),
        cancel_when(token.clone(), || processor.sink().writes().len() >= 2)
    );

    assert!(result.is_ok());
    assert!(processor.sink().attempts() >= 4);
    assert!(processor.sink().writes().len() >= 2);
}

#[tokio::test]
async fn test_daemon_keeps_polling_an_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let processor = IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::new()).unwrap();
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        }
    };

    let (result, _) = tokio::join!(processor.run_daemon(token), canceller);
    assert!(result.is_ok());
    assert_eq!(processor.sink().attempts(), 0);
}

#[tokio::test]
async fn test_daemon_exits_immediately_when_already_cancelled() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "live.csv", &["2024-01-15 10:00:00"]);

    let processor = IngestProcessor::new(test_config(temp_dir.path()), RecordingSink::new()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    processor.run_daemon(token).await.unwrap();
    assert_eq!(processor.sink().attempts(), 0);
}

#[test]
fn test_latest_record_orders_by_timestamp() {
    let records: Vec<CleanRecord> = ["2024-01-15T10:00:00Z", "2024-01-15T10:05:00Z", "2024-01-15T09:58:00Z"]
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let mut record = CleanRecord::new();
            record.set_timestamp(*ts);
            record.insert_measurement("row", i as f64);
            record
        })
        .collect();

    let latest = latest_record(records).unwrap();
    assert_eq!(latest.timestamp(), Some("2024-01-15T10:05:00Z"));
    assert_eq!(latest.measurement("row"), Some(1.0));
    assert!(latest_record(Vec::new()).is_none());
}
