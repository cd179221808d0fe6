// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapts [`flowlog_diskqueue::DiskQueue`] to the [`crate::queue::Queue`]
//! trait so a destination worker can be handed either a memory or disk
//! queue interchangeably (§3 "Queue ... two concrete kinds").

use flowlog_core::{LogMessage, PathOptions};
use flowlog_diskqueue::{DiskQueue, DiskQueueOptions};
use flowlog_stats::StatsRegistry;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::codec::LogMessageCodec;
use crate::error::WorkerError;
use crate::queue::{CheckItemsResult, Queue, QueueItem};

/// A disk-backed [`Queue`] (§4.3). Since the underlying file has no native
/// push notification, the wakeup callback armed by [`Queue::check_items`]
/// fires synchronously from `push_tail`, same as [`crate::queue::MemoryQueue`].
pub struct DiskBackedQueue {
    inner: DiskQueue<QueueItem, LogMessageCodec>,
    wakeup: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl DiskBackedQueue {
    pub fn start(
        path: &Path,
        options: DiskQueueOptions,
        registry: &StatsRegistry,
        cluster_name: &str,
    ) -> Result<Self, WorkerError> {
        let inner = DiskQueue::start(path, options, LogMessageCodec, registry, cluster_name)?;
        Ok(DiskBackedQueue { inner, wakeup: Mutex::new(None) })
    }
}

impl Queue for DiskBackedQueue {
    fn push_tail(&self, msg: LogMessage, path_options: PathOptions) -> Result<(), WorkerError> {
        self.inner.push_tail(&(msg, path_options))?;
        if let Some(cb) = self.wakeup.lock().take() {
            cb();
        }
        Ok(())
    }

    fn peek_head(&self) -> Option<QueueItem> {
        self.inner.peek_head().ok().flatten()
    }

    fn pop_head(&self) -> Option<QueueItem> {
        self.inner.pop_head().ok().flatten()
    }

    fn ack_backlog(&self, n: usize) {
        if let Err(err) = self.inner.ack_backlog(n) {
            tracing::warn!(%err, "failed to ack disk queue backlog");
        }
    }

    fn rewind_backlog(&self, n: usize) {
        self.inner.rewind_backlog(n);
    }

    fn rewind_backlog_all(&self) {
        self.inner.rewind_backlog_all();
    }

    fn length(&self) -> usize {
        self.inner.length()
    }

    fn check_items(&self, wakeup: Arc<dyn Fn() + Send + Sync>) -> CheckItemsResult {
        if self.inner.length() > 0 {
            return CheckItemsResult::Available;
        }
        *self.wakeup.lock() = Some(wakeup);
        CheckItemsResult::Empty { retry_after_msec: None }
    }
}
