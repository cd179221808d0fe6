// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk queue errors (§4.3, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskQueueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue is at capacity")]
    Full,

    #[error("queue file is corrupt at offset {offset}: {message}")]
    Corrupt { offset: u64, message: String },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("queue opened read-only and file is corrupt")]
    ReadOnlyCorrupt,
}
