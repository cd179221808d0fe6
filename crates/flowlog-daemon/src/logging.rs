// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup (§0 ambient stack), grounded on the teacher daemon's
//! `setup_logging`: `tracing-subscriber` with an env filter, optionally
//! writing to a rotation-free file appender instead of stdout.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::DaemonError;

/// Either side of the non-blocking writer: the caller must hold the guard
/// for the process lifetime or buffered lines are lost on exit.
pub enum LogGuard {
    File(tracing_appender::non_blocking::WorkerGuard),
    Stdout,
}

pub fn setup_logging(log_path: Option<&Path>) -> Result<LogGuard, DaemonError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let appender = tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("flowlogd.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
            Ok(LogGuard::File(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            Ok(LogGuard::Stdout)
        }
    }
}
