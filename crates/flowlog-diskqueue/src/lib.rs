// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowlog-diskqueue: the disk-backed write-ahead queue backing a
//! destination driver's output buffer (§4.3), plus the per-directory
//! free-space timer that feeds the process-wide disk metrics.

pub mod codec;
pub mod dirstats;
pub mod error;
pub mod file;
pub mod queue;

pub use codec::{MessageCodec, RawBytesCodec};
pub use dirstats::{DirStatsGuard, DirStatsRegistry};
pub use error::DiskQueueError;
pub use queue::{DiskQueue, DiskQueueOptions};
