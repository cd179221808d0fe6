// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowlog-dest: the threaded destination driver (§4.6) -- a pool of
//! cooperative worker loops, each backed by a [`queue::Queue`] (memory or
//! disk) and driving a caller-supplied [`worker::DestinationWorker`]
//! implementation for the wire protocol.

pub mod codec;
pub mod diskqueue_adapter;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod metrics;
pub mod partition;
pub mod queue;
pub mod seqnum;
pub mod worker;

pub use codec::LogMessageCodec;
pub use diskqueue_adapter::DiskBackedQueue;
pub use driver::{seqnum_persist_key, ThreadedDestinationDriver};
pub use error::WorkerError;
pub use event_loop::{WorkerLoop, WorkerLoopConfig, WorkerOptions};
pub use metrics::{ByteCounter, DriverMetrics, WorkerMetrics};
pub use partition::Partitioner;
pub use queue::{CheckItemsResult, MemoryQueue, Queue, QueueItem};
pub use seqnum::SeqNumSource;
pub use worker::{DestinationWorker, FlushMode, InsertResult};
