// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP scrape endpoint (§6): a hand-rolled HTTP/1.1 `GET` parser over a raw
//! `TcpListener`, no web framework. Mirrors the teacher's own bare-metal
//! wire-protocol handling rather than reaching for an HTTP crate here.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::command::{export_all, run_query};
use crate::error::ControlError;
use flowlog_stats::StatsRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Prometheus,
    Csv,
    Kv,
}

pub struct ScrapeOptions {
    /// Glob the request line's path must match, e.g. `/metrics*` (§6).
    pub path_pattern: String,
    pub format: ExportFormat,
    /// Minimum spacing between two accepted scrapes; a request arriving
    /// sooner gets `429 Too Many Requests` (§6).
    pub scrape_freq_limit: Duration,
    /// Reject a second concurrent scrape instead of serving it (§6
    /// single-instance mode).
    pub single_instance: bool,
}

pub struct ScrapeServer {
    registry: Arc<StatsRegistry>,
    options: ScrapeOptions,
    last_served_unix_millis: AtomicI64,
    in_flight: AtomicBool,
}

impl ScrapeServer {
    pub fn new(registry: Arc<StatsRegistry>, options: ScrapeOptions) -> Self {
        ScrapeServer { registry, options, last_served_unix_millis: AtomicI64::new(i64::MIN), in_flight: AtomicBool::new(false) }
    }

    /// Bind `addr` and serve scrape requests until `shutdown` reports true.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> Result<(), ControlError> {
        let listener = TcpListener::bind(addr).await.map_err(ControlError::Bind)?;
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
                accepted = listener.accept() => {
                    let (stream, _peer) = accepted?;
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = this.handle_connection(stream, now_unix_millis()).await {
                            tracing::warn!(%err, "scrape connection error");
                        }
                    });
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, now_millis: i64) -> Result<(), ControlError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }
        // Drain and discard headers up to the blank line; no body is read
        // since only GET is supported.
        loop {
            let mut header_line = String::new();
            if reader.read_line(&mut header_line).await? == 0 || header_line.trim().is_empty() {
                break;
            }
        }

        let response = self.respond(&request_line, now_millis);
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    fn respond(&self, request_line: &str, now_millis: i64) -> String {
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("");
        let target = parts.next().unwrap_or("");
        if method != "GET" {
            return http_response(400, "text/plain", "only GET is supported\n");
        }
        if !flowlog_stats::query::glob_match(&self.options.path_pattern, target.split('?').next().unwrap_or(target)) {
            return http_response(400, "text/plain", "path does not match the configured scrape pattern\n");
        }

        if self.options.single_instance && self.in_flight.swap(true, Ordering::AcqRel) {
            return http_response(429, "text/plain", "a scrape is already in progress\n");
        }
        let guard = SingleInstanceGuard::new(self.options.single_instance, &self.in_flight);

        let limit_millis = self.options.scrape_freq_limit.as_millis() as i64;
        let last = self.last_served_unix_millis.load(Ordering::Acquire);
        if limit_millis > 0 && last != i64::MIN && now_millis - last < limit_millis {
            return http_response(429, "text/plain", "scrape frequency limit exceeded\n");
        }
        self.last_served_unix_millis.store(now_millis, Ordering::Release);
        drop(guard);

        let now_unix = now_millis / 1_000;
        let query_string = target.split_once('?').map(|(_, q)| q).unwrap_or("");
        if let Some(query) = parse_query_param(query_string, "query") {
            let body = run_query(&query, &self.registry);
            return http_response(200, "text/plain", &body);
        }
        let content_type = match self.options.format {
            ExportFormat::Prometheus => "text/plain; version=0.0.4",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Kv => "text/plain",
        };
        let body = export_all(&self.registry, self.options.format, now_unix);
        http_response(200, content_type, &body)
    }
}

struct SingleInstanceGuard<'a> {
    armed: bool,
    in_flight: &'a AtomicBool,
}

impl<'a> SingleInstanceGuard<'a> {
    fn new(armed: bool, in_flight: &'a AtomicBool) -> Self {
        SingleInstanceGuard { armed, in_flight }
    }
}

impl Drop for SingleInstanceGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.in_flight.store(false, Ordering::Release);
        }
    }
}

fn parse_query_param(query_string: &str, name: &str) -> Option<String> {
    query_string.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == name {
            Some(url_decode(v))
        } else {
            None
        }
    })
}

fn url_decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut bytes = raw.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(' '),
            b'%' => {
                let hi = bytes.next();
                let lo = bytes.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let Ok(byte) = u8::from_str_radix(&format!("{}{}", hi as char, lo as char), 16) {
                        out.push(byte as char);
                        continue;
                    }
                }
            }
            _ => out.push(b as char),
        }
    }
    out
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        429 => "Too Many Requests",
        _ => "Error",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn now_unix_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_stats::{ClusterKey, CounterType};

    fn server() -> ScrapeServer {
        let registry = Arc::new(StatsRegistry::new(3, 0));
        registry.register_counter(0, ClusterKey::new("src"), CounterType::PROCESSED).add(3);
        ScrapeServer::new(
            registry,
            ScrapeOptions {
                path_pattern: "/metrics*".to_string(),
                format: ExportFormat::Prometheus,
                scrape_freq_limit: Duration::from_secs(0),
                single_instance: false,
            },
        )
    }

    #[test]
    fn matching_path_returns_200_with_metrics_body() {
        let s = server();
        let resp = s.respond("GET /metrics HTTP/1.1\r\n", 0);
        assert!(resp.starts_with("HTTP/1.1 200 OK"));
        assert!(resp.contains("src_processed 3"));
    }

    #[test]
    fn mismatched_path_returns_400() {
        let s = server();
        let resp = s.respond("GET /nope HTTP/1.1\r\n", 0);
        assert!(resp.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn non_get_method_returns_400() {
        let s = server();
        let resp = s.respond("POST /metrics HTTP/1.1\r\n", 0);
        assert!(resp.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn scrape_frequency_limit_returns_429_on_rapid_repeat() {
        let registry = Arc::new(StatsRegistry::new(3, 0));
        let s = ScrapeServer::new(
            registry,
            ScrapeOptions {
                path_pattern: "/metrics*".to_string(),
                format: ExportFormat::Prometheus,
                scrape_freq_limit: Duration::from_secs(10),
                single_instance: false,
            },
        );
        let first = s.respond("GET /metrics HTTP/1.1\r\n", 1_000);
        assert!(first.starts_with("HTTP/1.1 200"));
        let second = s.respond("GET /metrics HTTP/1.1\r\n", 1_500);
        assert!(second.starts_with("HTTP/1.1 429"));
    }

    #[test]
    fn query_param_runs_a_query_instead_of_a_full_export() {
        let s = server();
        let resp = s.respond("GET /metrics?query=GET_SUM%20src.* HTTP/1.1\r\n", 0);
        assert!(resp.starts_with("HTTP/1.1 200"));
        assert!(resp.contains("3"));
    }
}
