// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (§0 ambient stack): a small TOML file covering the
//! options §6 names (`stats(...)`, `disk-buffer(...)`, listener/destination
//! settings). The syslog-ng configuration grammar itself is explicitly out
//! of scope (§1) -- this is just enough structure to drive the library
//! crates from a binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DaemonError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub level: u8,
    pub max_dynamic: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig { level: 1, max_dynamic: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub socket_path: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig { socket_path: PathBuf::from("/tmp/flowlogd.ctl") }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeFormat {
    Prometheus,
    Csv,
    Kv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub bind_addr: String,
    pub path_pattern: String,
    pub format: ScrapeFormat,
    pub freq_limit_ms: u64,
    pub single_instance: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            bind_addr: "127.0.0.1:9577".to_string(),
            path_pattern: "/metrics*".to_string(),
            format: ScrapeFormat::Prometheus,
            freq_limit_ms: 1_000,
            single_instance: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Unix stream socket path the AF_SOCKET source listens on.
    pub listen_path: PathBuf,
    pub max_connections: u64,
    pub keep_alive: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig { listen_path: PathBuf::from("/tmp/flowlogd.sock"), max_connections: 100, keep_alive: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub sink_path: PathBuf,
    pub num_workers: usize,
    pub batch_lines: usize,
    pub batch_timeout_ms: u64,
    pub time_reopen_ms: u64,
    pub retries_on_error_max: u32,
    pub retries_max: u32,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        DestinationConfig {
            sink_path: PathBuf::from("/tmp/flowlogd.out"),
            num_workers: 1,
            batch_lines: 100,
            batch_timeout_ms: 1_000,
            time_reopen_ms: 10_000,
            retries_on_error_max: 3,
            retries_max: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stats: StatsConfig,
    pub control: ControlConfig,
    pub scrape: ScrapeConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    /// File to log to; `None` (the default) logs to stdout.
    pub log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stats: StatsConfig::default(),
            control: ControlConfig::default(),
            scrape: ScrapeConfig::default(),
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            log_path: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, DaemonError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

impl DestinationConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn time_reopen(&self) -> Duration {
        Duration::from_millis(self.time_reopen_ms)
    }
}

impl ScrapeConfig {
    pub fn freq_limit(&self) -> Duration {
        Duration::from_millis(self.freq_limit_ms)
    }
}
