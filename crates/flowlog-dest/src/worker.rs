// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The protocol-agnostic [`DestinationWorker`] trait (§4.6, §9 "Worker /
//! driver coupling"): callers implement `connect`/`insert`/`flush`/
//! `disconnect` for their wire protocol; [`crate::event_loop::WorkerLoop`]
//! drives the cooperative scheduler around it.

use async_trait::async_trait;
use flowlog_core::LogMessage;

/// Outcome of one `insert()` call (§4.6 "Insert loop" result table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Success,
    Drop,
    Error,
    NotConnected,
    Queued,
    /// The implementation will call ack/rewind on the queue itself; the
    /// driver's event loop takes no further backlog action.
    ExplicitAckMgmt,
    Retry,
}

/// Flush mode (§4.6 "Flush"): `Expedite` is used during shutdown when the
/// caller knows a persistent queue will retain whatever is not flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    Normal,
    Expedite,
}

/// One destination's wire protocol, injected into the threaded worker loop
/// (§9 "define a Worker trait from the start").
#[async_trait]
pub trait DestinationWorker: Send + Sync {
    /// Establish (or re-establish) the underlying transport. `false`
    /// triggers suspend + reconnect-timer scheduling in the event loop.
    async fn connect(&self) -> bool;

    /// Idempotent teardown of the transport. Always paired with a suspend
    /// in the event loop (§4.6 "Connect/disconnect").
    async fn disconnect(&self);

    /// Hand one message to the protocol implementation.
    async fn insert(&self, msg: &LogMessage) -> InsertResult;

    /// Flush any buffered-but-unsent state. Also returns an [`InsertResult`]
    /// since the same result table applies (§4.6 "Flush").
    async fn flush(&self, mode: FlushMode) -> InsertResult;
}
