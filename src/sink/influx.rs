//! InfluxDB 1.x sink.
//!
//! Encodes points as line protocol with second precision and posts them to
//! `/write`, splitting large payloads into requests of at most
//! `batch_size` points. Each request is attempted once.

use super::MetricSink;
use crate::config::InfluxConfig;
use crate::error::{IngestError, Result};
use crate::models::MetricPoint;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

/// HTTP client for the InfluxDB write endpoint
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: Url,
    username: String,
    password: String,
    batch_size: usize,
}

impl InfluxSink {
    /// Create a sink from connection settings
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            IngestError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            write_url: write_url(config)?,
            username: config.username.clone(),
            password: config.password.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    async fn post_lines(&self, lines: &[String]) -> Result<()> {
        let response = self
            .client
            .post(self.write_url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(lines.join("\n"))
            .send()
            .await
            .map_err(|e| IngestError::sink_write(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::sink_write(format!(
                "server returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl MetricSink for InfluxSink {
    async fn write_points(&self, points: &[MetricPoint]) -> Result<()> {
        let mut lines = Vec::with_capacity(points.len());
        for point in points {
            match encode_line(point)? {
                Some(line) => lines.push(line),
                None => warn!("Skipping point at {} with no finite fields", point.time),
            }
        }

        if lines.is_empty() {
            return Ok(());
        }

        for chunk in lines.chunks(self.batch_size) {
            debug!("Writing {} points to {}", chunk.len(), self.write_url.path());
            self.post_lines(chunk).await?;
        }

        Ok(())
    }
}

/// Build `<base>/write?db=<database>&precision=s`
pub fn write_url(config: &InfluxConfig) -> Result<Url> {
    Url::parse_with_params(
        &format!("{}/write", config.base_url()),
        &[("db", config.database.as_str()), ("precision", "s")],
    )
    .map_err(|e| IngestError::configuration(format!("Invalid InfluxDB address: {}", e)))
}

/// Encode one point as a line-protocol line
///
/// Returns `None` when no field is finite, since such a line would be
/// rejected by the server.
pub fn encode_line(point: &MetricPoint) -> Result<Option<String>> {
    let time = DateTime::parse_from_rfc3339(&point.time).map_err(|e| {
        IngestError::sink_write(format!("invalid point time '{}': {}", point.time, e))
    })?;

    let fields: Vec<String> = point
        .fields
        .iter()
        .filter(|(_, value)| value.is_finite())
        .map(|(key, value)| format!("{}={}", escape_key(key), value))
        .collect();

    if fields.is_empty() {
        return Ok(None);
    }

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        // empty tag values are invalid in line protocol
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&time.timestamp().to_string());

    Ok(Some(line))
}

fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

fn escape_key(key: &str) -> String {
    escape(key, &[',', '=', ' '])
}

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
