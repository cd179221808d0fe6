// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter init/compile errors (§4.2, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterInitError {
    #[error("referenced filter not found: {0}")]
    FilterNotFound(String),

    #[error("cycle in filter rule: {0}")]
    CycleDetected(String),

    #[error("regex compile failed: {0}")]
    RegexCompileFailed(String),

    #[error("invalid netmask: {0}")]
    InvalidNetmask(String),
}
