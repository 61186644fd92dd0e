//! Command-line interface components.

use crate::config::{IngestConfig, InfluxConfig, SourceZone};
use crate::constants::{
    DEFAULT_FILE_PATTERN, DEFAULT_INFLUX_DATABASE, DEFAULT_INFLUX_HOST, DEFAULT_INFLUX_PASSWORD,
    DEFAULT_INFLUX_PORT, DEFAULT_INFLUX_USER, DEFAULT_MEASUREMENT, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_WRITE_BATCH_SIZE, LOG_TARGET,
};
use crate::models::ProcessingStats;
use crate::processor::{BatchMode, IngestProcessor};
use crate::sink::InfluxSink;
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "icue-ingest")]
#[command(about = "Send hardware-monitor CSV sensor logs to InfluxDB")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Only process this file in batch mode (relative paths resolve against --dir)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Read and parse the log files
    #[arg(short, long)]
    pub read: bool,

    /// Send parsed points to InfluxDB and delete sent files (with --read)
    #[arg(short, long)]
    pub send: bool,

    /// Keep sending the newest row of the newest file
    #[arg(short = 'D', long)]
    pub daemon: bool,

    /// Directory holding the sensor logs (defaults to ~/Documents/corsair_logging)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File name pattern inside the directory
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pub pattern: String,

    /// InfluxDB host name or base URL
    #[arg(long, default_value = DEFAULT_INFLUX_HOST)]
    pub host: String,

    /// InfluxDB port
    #[arg(long, default_value_t = DEFAULT_INFLUX_PORT)]
    pub port: u16,

    /// InfluxDB user
    #[arg(long, default_value = DEFAULT_INFLUX_USER)]
    pub user: String,

    /// InfluxDB password
    #[arg(long, default_value = DEFAULT_INFLUX_PASSWORD)]
    pub password: String,

    /// InfluxDB database
    #[arg(long, default_value = DEFAULT_INFLUX_DATABASE)]
    pub database: String,

    /// Measurement name for every point
    #[arg(long, default_value = DEFAULT_MEASUREMENT)]
    pub measurement: String,

    /// Tag attached to every point, as KEY=VALUE (repeatable; default host=NOMAD)
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,

    /// Seconds between polls in daemon mode
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub interval: u64,

    /// Maximum points per write request
    #[arg(long, default_value_t = DEFAULT_WRITE_BATCH_SIZE)]
    pub batch_size: usize,

    /// HTTP timeout in seconds for writes (none by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Zone of timestamps without an offset: local, utc or +HH:MM
    #[arg(long, value_name = "ZONE", default_value = "local")]
    pub source_tz: SourceZone,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get log level string based on verbosity
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn batch_mode(&self) -> BatchMode {
        BatchMode::new(self.read, self.send)
    }

    /// Layer the command-line values over the default configuration
    pub fn to_config(&self) -> Result<IngestConfig> {
        let mut config = IngestConfig::default()
            .with_file_pattern(self.pattern.clone())
            .with_measurement(self.measurement.clone())
            .with_source_zone(self.source_tz)
            .with_poll_interval(Duration::from_secs(self.interval))
            .with_influx(InfluxConfig {
                host: self.host.clone(),
                port: self.port,
                username: self.user.clone(),
                password: self.password.clone(),
                database: self.database.clone(),
                batch_size: self.batch_size,
                timeout: self.timeout.map(Duration::from_secs),
            });

        if let Some(dir) = &self.dir {
            config = config.with_watch_dir(dir.clone());
        }

        if let Some(file) = &self.file {
            config = config.with_target_file(file.clone());
        }

        if !self.tags.is_empty() {
            config = config.with_tags(self.tags.iter().cloned().collect::<BTreeMap<_, _>>());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Parse a `KEY=VALUE` tag argument
fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty tag key in '{}'", s));
    }

    Ok((key.to_string(), value.trim().to_string()))
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    // Create filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", LOG_TARGET, log_level)));

    if let Some(path) = &args.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else if args.quiet {
        // Minimal logging for quiet mode
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        // Standard logging with timestamps
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Run the selected mode until it completes or `cancel` fires
pub async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let config = args.to_config()?;
    info!(
        "Watching {} for '{}'",
        config.watch_dir.display(),
        config.file_pattern
    );

    let sink = InfluxSink::new(&config.influx).context("Failed to set up InfluxDB sink")?;
    debug!("Writing to {}", sink.write_url());

    let processor = IngestProcessor::new(config, sink)?;

    if args.daemon {
        processor.run_daemon(cancel).await?;
        return Ok(());
    }

    let stats = tokio::select! {
        stats = processor.run_batch(args.batch_mode()) => stats?,
        _ = cancel.cancelled() => {
            anyhow::bail!("Processing interrupted by user");
        }
    };

    if !args.quiet {
        print_summary(&stats);
    }

    Ok(())
}

/// Print the end-of-run summary
fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Ingestion Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {} of {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white(),
        stats.files_discovered
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} built, {} sent",
        "Points:".bright_cyan(),
        stats.points_built.to_string().bright_white().bold(),
        stats.points_sent.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Files deleted:".bright_cyan(),
        stats.files_deleted.to_string().bright_white()
    );
    if stats.delete_failures > 0 {
        println!(
            "  {} {}",
            "Delete failures:".bright_yellow(),
            stats.delete_failures.to_string().bright_yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from(["icue-ingest", "-r", "-s"]).unwrap();
        assert_eq!(args.batch_mode(), BatchMode::drain());
        assert!(!args.daemon);

        let args = Args::try_parse_from(["icue-ingest", "-D"]).unwrap();
        assert!(args.daemon);
        assert!(args.batch_mode().is_idle());
    }

    #[test]
    fn test_no_flags_is_accepted() {
        let args = Args::try_parse_from(["icue-ingest"]).unwrap();
        assert!(args.batch_mode().is_idle());
        assert!(args.to_config().is_ok());
    }

    #[test]
    fn test_to_config_layers_arguments() {
        let args = Args::try_parse_from([
            "icue-ingest",
            "--dir",
            "/tmp/logs",
            "--file",
            "today.csv",
            "--host",
            "influx.local",
            "--port",
            "9999",
            "--database",
            "sensors",
            "--tag",
            "host=RIG",
            "--tag",
            "room=office",
            "--interval",
            "10",
            "--timeout",
            "5",
            "--source-tz",
            "+01:00",
        ])
        .unwrap();

        let config = args.to_config().unwrap();
        assert_eq!(config.watch_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.target_file, Some(PathBuf::from("today.csv")));
        assert_eq!(config.influx.host, "influx.local");
        assert_eq!(config.influx.port, 9999);
        assert_eq!(config.influx.database, "sensors");
        assert_eq!(config.influx.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.source_zone, SourceZone::Offset(3600));
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags.get("host").map(String::as_str), Some("RIG"));
    }

    #[test]
    fn test_default_tags_kept_without_tag_flag() {
        let config = Args::try_parse_from(["icue-ingest"])
            .unwrap()
            .to_config()
            .unwrap();
        assert_eq!(config.tags.get("host").map(String::as_str), Some("NOMAD"));
        assert_eq!(config.measurement, "corsair_icue");
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Args::try_parse_from(["icue-ingest", "--tag", "novalue"]).is_err());
        assert!(Args::try_parse_from(["icue-ingest", "--source-tz", "mars"]).is_err());

        let args = Args::try_parse_from(["icue-ingest", "--interval", "0"]).unwrap();
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_log_levels() {
        let args = Args::try_parse_from(["icue-ingest", "-vv"]).unwrap();
        assert_eq!(args.get_log_level(), "trace");
        let args = Args::try_parse_from(["icue-ingest", "-q", "-v"]).unwrap();
        assert_eq!(args.get_log_level(), "error");
    }
}
