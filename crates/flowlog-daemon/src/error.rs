// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("control interface error: {0}")]
    Control(#[from] flowlog_control::ControlError),
    #[error("source driver error: {0}")]
    Source(#[from] flowlog_source::SourceError),
}
