// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source driver errors (§4.5, §7 "Fatal I/O error on a source listen fd").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer denied by hosts_access")]
    HostsAccessDenied,

    #[error("driver already bound")]
    AlreadyBound,

    #[error("no listener to reclaim from persistent state under key {0:?}")]
    NothingToReclaim(String),
}
