use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::http_client;
use crate::config::AppConfig;
use crate::processor::event_processor::AlertPipeline;

/// Diagnostic connection state of the alert stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Connected,
    Error,
}

/// Runs the SSE consumer with transparent reconnection and a circuit
/// breaker that backs off after repeated consecutive failures.
pub async fn run_sse_consumer(
    config: &AppConfig,
    pipeline: Arc<AlertPipeline>,
    conn: watch::Sender<ConnState>,
) -> Result<()> {
    let url = format!(
        "{}{}",
        config.api_base.trim_end_matches('/'),
        config.sse_path
    );
    info!("Initializing SSE consumer for {}", url);

    let mut consecutive_failures: u32 = 0;
    let max_retries = config.sse_max_retries;
    let cooldown = Duration::from_secs(config.sse_cooldown_secs);

    loop {
        // Circuit breaker check
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.sse_cooldown_secs
            );
            tokio::time::sleep(cooldown).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        conn.send_replace(ConnState::Connecting);
        match consume_stream(&url, &pipeline, &conn).await {
            Ok(()) => {
                consecutive_failures = 0;
                warn!("Alert stream ended; reconnecting");
            }
            Err(e) => {
                error!(
                    "Stream error: {:#}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                conn.send_replace(ConnState::Error);
                consecutive_failures += 1;

                // Small delay to prevent a tight loop on minor network glitches
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}

async fn consume_stream(
    url: &str,
    pipeline: &AlertPipeline,
    conn: &watch::Sender<ConnState>,
) -> Result<()> {
    let response = http_client()
        .get(url)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .context("failed to open alert stream")?
        .error_for_status()
        .context("alert stream refused")?;

    let mut stream = response.bytes_stream();
    let mut parser = SseFrameParser::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("alert stream interrupted")?;
        for frame in parser.feed(&chunk) {
            match frame.event.as_str() {
                "connected" => {
                    info!("Alert stream connected");
                    conn.send_replace(ConnState::Connected);
                }
                "pix" => pipeline.on_event(&frame.data),
                other => debug!("ignoring stream event '{}'", other),
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct SseFrame {
    event: String,
    data: String,
}

/// Incremental parser for the `text/event-stream` wire framing: `event:`
/// and `data:` lines accumulate until a blank line dispatches the frame.
#[derive(Default)]
struct SseFrameParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseFrameParser {
    /// Feeds a chunk of the stream, returning any frames it completed.
    ///
    /// Chunks are buffered as raw bytes; decoding happens per complete
    /// line, so a multi-byte character split across chunk boundaries
    /// stays intact.
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            let line = String::from_utf8_lossy(&raw).into_owned();
            self.handle_line(&line, &mut frames);
        }
        frames
    }

    fn handle_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            if self.event.is_some() || !self.data.is_empty() {
                frames.push(SseFrame {
                    event: self.event.take().unwrap_or_else(|| "message".to_string()),
                    data: std::mem::take(&mut self.data).join("\n"),
                });
            }
            return;
        }
        // Comment lines double as keep-alives.
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` are transport details the core ignores.
            _ => {}
        }
    }
}
