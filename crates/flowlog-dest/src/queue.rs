// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract destination queue (§3 "Queue", §4.6): a FIFO of
//! `(message, path_options)` pairs with a popped-but-unacked backlog that
//! can be acked (freed) or rewound (replayed). Two concrete kinds realize
//! it: [`MemoryQueue`] here, and [`crate::diskqueue_adapter::DiskBackedQueue`]
//! over `flowlog-diskqueue`.

use flowlog_core::{LogMessage, PathOptions};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::WorkerError;

pub type QueueItem = (LogMessage, PathOptions);

/// Outcome of polling a queue for work (§4.6 `do_work`'s `check_items`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckItemsResult {
    /// At least one item is immediately available to pop.
    Available,
    /// Nothing to pop right now. `retry_after_msec`, if set, asks the
    /// caller to poll again after that delay even without a wakeup (used
    /// by queues that want to be revisited on a timer rather than purely
    /// event-driven); `None` means rely entirely on the wakeup callback.
    Empty { retry_after_msec: Option<u64> },
}

/// A FIFO queue backing one destination worker (§3, §4.6).
pub trait Queue: Send + Sync {
    fn push_tail(&self, msg: LogMessage, path_options: PathOptions) -> Result<(), WorkerError>;
    fn peek_head(&self) -> Option<QueueItem>;
    fn pop_head(&self) -> Option<QueueItem>;
    /// Release the oldest `n` popped-but-unacked items, freeing their
    /// space for reuse.
    fn ack_backlog(&self, n: usize);
    /// Replay the oldest `n` popped-but-unacked items again.
    fn rewind_backlog(&self, n: usize);
    fn rewind_backlog_all(&self);
    /// Count of items pushed but not yet popped (§8 invariant 2).
    fn length(&self) -> usize;
    /// Poll for work, arming `wakeup` to fire exactly once the next time an
    /// item is pushed if none is available right now.
    fn check_items(&self, wakeup: Arc<dyn Fn() + Send + Sync>) -> CheckItemsResult;
}

struct Inner {
    pending: VecDeque<QueueItem>,
    backlog: VecDeque<QueueItem>,
    wakeup: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// An in-memory queue, optionally bounded (§3 "Queue ... memory (optionally
/// bounded)").
pub struct MemoryQueue {
    inner: parking_lot::Mutex<Inner>,
    max_items: Option<usize>,
}

impl MemoryQueue {
    pub fn new(max_items: Option<usize>) -> Self {
        MemoryQueue {
            inner: parking_lot::Mutex::new(Inner {
                pending: VecDeque::new(),
                backlog: VecDeque::new(),
                wakeup: None,
            }),
            max_items,
        }
    }

    pub fn backlog_len(&self) -> usize {
        self.inner.lock().backlog.len()
    }
}

impl Queue for MemoryQueue {
    fn push_tail(&self, msg: LogMessage, path_options: PathOptions) -> Result<(), WorkerError> {
        let wakeup = {
            let mut inner = self.inner.lock();
            if let Some(max) = self.max_items {
                if inner.pending.len() + inner.backlog.len() >= max {
                    return Err(WorkerError::QueueFull);
                }
            }
            inner.pending.push_back((msg, path_options));
            inner.wakeup.take()
        };
        if let Some(cb) = wakeup {
            cb();
        }
        Ok(())
    }

    fn peek_head(&self) -> Option<QueueItem> {
        self.inner.lock().pending.front().cloned()
    }

    fn pop_head(&self) -> Option<QueueItem> {
        let mut inner = self.inner.lock();
        let item = inner.pending.pop_front()?;
        inner.backlog.push_back(item.clone());
        Some(item)
    }

    fn ack_backlog(&self, n: usize) {
        let mut inner = self.inner.lock();
        for _ in 0..n {
            if inner.backlog.pop_front().is_none() {
                break;
            }
        }
    }

    fn rewind_backlog(&self, n: usize) {
        let mut inner = self.inner.lock();
        let n = n.min(inner.backlog.len());
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(item) = inner.backlog.pop_back() {
                items.push(item);
            }
        }
        // `items` holds the most-recently-popped entries first; pushing
        // each to the front of `pending` in that order restores original
        // FIFO order (oldest-of-the-rewound-batch ends up at the front).
        for item in items {
            inner.pending.push_front(item);
        }
    }

    fn rewind_backlog_all(&self) {
        let n = self.inner.lock().backlog.len();
        self.rewind_backlog(n);
    }

    fn length(&self) -> usize {
        self.inner.lock().pending.len()
    }

    fn check_items(&self, wakeup: Arc<dyn Fn() + Send + Sync>) -> CheckItemsResult {
        let mut inner = self.inner.lock();
        if !inner.pending.is_empty() {
            return CheckItemsResult::Available;
        }
        inner.wakeup = Some(wakeup);
        CheckItemsResult::Empty { retry_after_msec: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_core::priority::{Facility, Severity};
    use flowlog_core::{LogMessageData, Priority, SourceAddr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn msg() -> LogMessage {
        LogMessage::new(LogMessageData::new(Priority::new(Facility::USER, Severity::DEBUG), SourceAddr::Unspecified))
    }

    #[test]
    fn length_tracks_pushed_minus_popped() {
        let q = MemoryQueue::new(None);
        q.push_tail(msg(), PathOptions::new()).unwrap();
        q.push_tail(msg(), PathOptions::new()).unwrap();
        assert_eq!(q.length(), 2);
        q.pop_head();
        assert_eq!(q.length(), 1);
    }

    #[test]
    fn ack_shrinks_backlog_by_exactly_n() {
        let q = MemoryQueue::new(None);
        for _ in 0..3 {
            q.push_tail(msg(), PathOptions::new()).unwrap();
        }
        q.pop_head();
        q.pop_head();
        assert_eq!(q.backlog_len(), 2);
        q.ack_backlog(1);
        assert_eq!(q.backlog_len(), 1);
    }

    #[test]
    fn rewind_replays_in_original_order() {
        let q = MemoryQueue::new(None);
        let a = msg();
        let b = msg();
        q.push_tail(a.clone(), PathOptions::new()).unwrap();
        q.push_tail(b.clone(), PathOptions::new()).unwrap();
        let popped_a = q.pop_head().unwrap().0;
        let popped_b = q.pop_head().unwrap().0;
        assert!(popped_a.ref_count() >= 1 && popped_b.ref_count() >= 1);
        q.rewind_backlog_all();
        assert_eq!(q.length(), 2);
        let replay_a = q.pop_head().unwrap().0;
        let replay_b = q.pop_head().unwrap().0;
        assert_eq!(replay_a.priority(), a.priority());
        assert_eq!(replay_b.priority(), b.priority());
    }

    #[test]
    fn bounded_queue_rejects_push_past_capacity() {
        let q = MemoryQueue::new(Some(1));
        q.push_tail(msg(), PathOptions::new()).unwrap();
        assert!(matches!(q.push_tail(msg(), PathOptions::new()), Err(WorkerError::QueueFull)));
    }

    #[test]
    fn check_items_arms_wakeup_when_empty_and_fires_on_next_push() {
        let q = MemoryQueue::new(None);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let result = q.check_items(Arc::new(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(result, CheckItemsResult::Empty { retry_after_msec: None });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        q.push_tail(msg(), PathOptions::new()).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn check_items_returns_available_without_consuming() {
        let q = MemoryQueue::new(None);
        q.push_tail(msg(), PathOptions::new()).unwrap();
        assert_eq!(q.check_items(Arc::new(|| {})), CheckItemsResult::Available);
        assert_eq!(q.length(), 1, "check_items does not pop");
    }
}
