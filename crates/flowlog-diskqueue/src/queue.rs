// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public disk queue (§4.3): wraps a [`DiskQueueFile`] with a
//! [`MessageCodec`], corruption handling, and the stats counters a
//! destination driver's queue depth is observed through.

use crate::codec::MessageCodec;
use crate::error::DiskQueueError;
use crate::file::DiskQueueFile;
use flowlog_stats::{ClusterKey, Counter, CounterType, StatsRegistry};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const COUNTER_CAPACITY: CounterType = CounterType("capacity");
const COUNTER_DISK_USAGE_BYTES: CounterType = CounterType("disk_usage_bytes");
const COUNTER_DISK_ALLOCATED_BYTES: CounterType = CounterType("disk_allocated_bytes");

/// Options controlling how a [`DiskQueue`] is opened (§4.3).
#[derive(Debug, Clone)]
pub struct DiskQueueOptions {
    /// Ring capacity in bytes, used only when creating a fresh file.
    pub capacity: u64,
    /// Open for reads only; a corrupt file is a hard error rather than
    /// being rewritten (§4.3 "read-only open refuses to repair").
    pub read_only: bool,
    /// Stats registration level (§4.1); `0` is always on.
    pub stats_level: u8,
}

impl Default for DiskQueueOptions {
    fn default() -> Self {
        DiskQueueOptions { capacity: 10 * 1024 * 1024, read_only: false, stats_level: 0 }
    }
}

struct Counters {
    queued: Counter,
    capacity: Counter,
    disk_usage_bytes: Counter,
    disk_allocated_bytes: Counter,
}

/// A disk-backed FIFO queue of encoded messages of type `T` (§3, §4.3).
///
/// `push_tail`/`pop_head`/`peek_head` operate on decoded `T` values;
/// `ack_backlog`/`rewind_backlog` work in terms of message counts, letting
/// a destination worker batch a flush and only release backlog entries
/// once the batch is durably delivered.
pub struct DiskQueue<T, C: MessageCodec<T>> {
    file: Mutex<DiskQueueFile>,
    codec: C,
    counters: Counters,
    _marker: std::marker::PhantomData<T>,
}

fn restart_corrupted(path: &Path) -> Result<(), DiskQueueError> {
    for suffix in 0..=9999u32 {
        let candidate = if suffix == 0 {
            let mut p = path.to_path_buf();
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            p.set_file_name(format!("{name}.corrupted"));
            p
        } else {
            let mut p = path.to_path_buf();
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            p.set_file_name(format!("{name}.corrupted-{suffix}"));
            p
        };
        if !candidate.exists() {
            std::fs::rename(path, &candidate)?;
            tracing::warn!(from = %path.display(), to = %candidate.display(), "disk queue corrupt, moved aside");
            return Ok(());
        }
    }
    Err(DiskQueueError::Corrupt { offset: 0, message: "exhausted corrupted-file rename suffixes".to_string() })
}

impl<T, C: MessageCodec<T>> DiskQueue<T, C> {
    /// Open `path`, creating a fresh queue file if it does not exist. A
    /// corrupt existing file is moved aside as `<path>.corrupted[-N]` and
    /// replaced with an empty queue, unless `read_only` is set, in which
    /// case corruption is a hard error (§4.3).
    pub fn start(
        path: &Path,
        options: DiskQueueOptions,
        codec: C,
        registry: &StatsRegistry,
        cluster_name: &str,
    ) -> Result<Self, DiskQueueError> {
        let file = if path.exists() {
            match DiskQueueFile::open_existing(path) {
                Ok(f) => f,
                Err(DiskQueueError::Corrupt { .. }) if options.read_only => {
                    return Err(DiskQueueError::ReadOnlyCorrupt);
                }
                Err(DiskQueueError::Corrupt { offset, message }) => {
                    tracing::error!(path = %path.display(), offset, %message, "disk queue file corrupt");
                    restart_corrupted(path)?;
                    DiskQueueFile::create(path, options.capacity)?
                }
                Err(e) => return Err(e),
            }
        } else {
            DiskQueueFile::create(path, options.capacity)?
        };

        let key = ClusterKey::new(cluster_name.to_string());
        let queued = registry.register_counter(options.stats_level, key.clone(), CounterType::QUEUED);
        let capacity = registry.register_counter(options.stats_level, key.clone(), COUNTER_CAPACITY);
        let disk_usage_bytes = registry.register_counter(options.stats_level, key.clone(), COUNTER_DISK_USAGE_BYTES);
        let disk_allocated_bytes =
            registry.register_counter(options.stats_level, key, COUNTER_DISK_ALLOCATED_BYTES);

        let queue = DiskQueue {
            counters: Counters { queued, capacity, disk_usage_bytes, disk_allocated_bytes },
            file: Mutex::new(file),
            codec,
            _marker: std::marker::PhantomData,
        };
        queue.refresh_gauges();
        Ok(queue)
    }

    fn refresh_gauges(&self) {
        let file = self.file.lock();
        self.counters.queued.set(file.length() as i64);
        self.counters.capacity.set(file.max_useful_space() as i64);
        self.counters.disk_usage_bytes.set(file.used_useful_space() as i64);
        self.counters.disk_allocated_bytes.set(file.file_size() as i64);
    }

    pub fn path(&self) -> PathBuf {
        self.file.lock().path().to_path_buf()
    }

    pub fn push_tail(&self, item: &T) -> Result<(), DiskQueueError> {
        let bytes = self.codec.encode(item)?;
        self.file.lock().push_tail(&bytes)?;
        self.refresh_gauges();
        Ok(())
    }

    pub fn peek_head(&self) -> Result<Option<T>, DiskQueueError> {
        let bytes = self.file.lock().peek_head()?;
        bytes.map(|b| self.codec.decode(&b)).transpose()
    }

    pub fn pop_head(&self) -> Result<Option<T>, DiskQueueError> {
        let bytes = self.file.lock().pop_head()?;
        self.refresh_gauges();
        bytes.map(|b| self.codec.decode(&b)).transpose()
    }

    /// Release the oldest `n` popped-but-unacked messages, freeing their
    /// ring space for reuse.
    pub fn ack_backlog(&self, n: usize) -> Result<(), DiskQueueError> {
        self.file.lock().ack_backlog(n)?;
        self.refresh_gauges();
        Ok(())
    }

    /// Replay the oldest `n` popped-but-unacked messages again, e.g. after
    /// a destination connection drops mid-batch.
    pub fn rewind_backlog(&self, n: usize) {
        self.file.lock().rewind_backlog(n);
        self.refresh_gauges();
    }

    pub fn rewind_backlog_all(&self) {
        self.file.lock().rewind_backlog_all();
        self.refresh_gauges();
    }

    pub fn length(&self) -> usize {
        self.file.lock().length()
    }

    pub fn used_useful_space(&self) -> u64 {
        self.file.lock().used_useful_space()
    }

    pub fn max_useful_space(&self) -> u64 {
        self.file.lock().max_useful_space()
    }

    pub fn file_size(&self) -> u64 {
        self.file.lock().file_size()
    }

    pub fn get_next_head_position(&self) -> u64 {
        self.file.lock().get_next_head_position()
    }

    pub fn sync(&self) -> Result<(), DiskQueueError> {
        self.file.lock().sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawBytesCodec;
    use tempfile::tempdir;

    #[test]
    fn push_pop_through_codec() {
        let dir = tempdir().unwrap();
        let registry = StatsRegistry::new(3, 0);
        let q = DiskQueue::start(
            &dir.path().join("q.dq"),
            DiskQueueOptions::default(),
            RawBytesCodec,
            &registry,
            "test.queue",
        )
        .unwrap();
        q.push_tail(&b"hello".to_vec()).unwrap();
        assert_eq!(q.length(), 1);
        assert_eq!(q.pop_head().unwrap().unwrap(), b"hello".to_vec());
    }

    #[test]
    fn stats_counters_track_queue_depth() {
        let dir = tempdir().unwrap();
        let registry = StatsRegistry::new(3, 0);
        let q = DiskQueue::start(
            &dir.path().join("q.dq"),
            DiskQueueOptions::default(),
            RawBytesCodec,
            &registry,
            "test.queue2",
        )
        .unwrap();
        assert_eq!(q.counters.queued.get(), 0);
        q.push_tail(&b"a".to_vec()).unwrap();
        assert_eq!(q.counters.queued.get(), 1);
        q.pop_head().unwrap();
        assert_eq!(q.counters.queued.get(), 0);
    }

    #[test]
    fn reopening_a_corrupt_file_moves_it_aside_and_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let registry = StatsRegistry::new(3, 0);
        let q = DiskQueue::start(&path, DiskQueueOptions::default(), RawBytesCodec, &registry, "test.queue3")
            .unwrap();
        assert_eq!(q.length(), 0);
        assert!(dir.path().join("q.dq.corrupted").exists());
    }

    #[test]
    fn read_only_open_of_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dq");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let registry = StatsRegistry::new(3, 0);
        let options = DiskQueueOptions { read_only: true, ..Default::default() };
        let err = DiskQueue::start(&path, options, RawBytesCodec, &registry, "test.queue4").unwrap_err();
        assert!(matches!(err, DiskQueueError::ReadOnlyCorrupt));
    }
}
