// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination worker errors (§4.6, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue is at capacity")]
    QueueFull,

    #[error("disk queue error: {0}")]
    DiskQueue(#[from] flowlog_diskqueue::DiskQueueError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("partition key template produced no worker index")]
    NoPartitionKey,
}
