// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control socket bind failed: {0}")]
    Bind(#[source] io::Error),
    #[error("control connection io error: {0}")]
    Io(#[from] io::Error),
}
