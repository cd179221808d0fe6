// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-directory free-space timer (§4.3 supplement): one `tokio::time::interval`
//! task per unique parent directory a disk queue file lives in, started
//! lazily on first use and cancelled once the last queue in that directory
//! is dropped. Publishes `disk_queue_dir_available_bytes{dir="..."}`.

use flowlog_stats::{ClusterKey, CounterType, StatsRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const COUNTER_AVAILABLE_BYTES: CounterType = CounterType("available_bytes");

struct Entry {
    refcount: usize,
    handle: JoinHandle<()>,
}

/// Tracks one background polling task per canonicalized directory. Held by
/// whatever owns the set of running [`crate::queue::DiskQueue`]s (typically
/// the daemon's destination-worker supervisor).
#[derive(Default)]
pub struct DirStatsRegistry {
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl DirStatsRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(DirStatsRegistry::default())
    }

    /// Register interest in `dir`, starting its polling task if this is the
    /// first caller for that directory. Returns a guard that, when dropped,
    /// releases this interest and stops the task once no caller remains.
    pub fn acquire(
        self: &Arc<Self>,
        dir: &Path,
        registry: Arc<StatsRegistry>,
        stats_level: u8,
        poll_interval: Duration,
    ) -> DirStatsGuard {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&canonical) {
            entry.refcount += 1;
        } else {
            let dir_label = canonical.to_string_lossy().to_string();
            let key = ClusterKey::new("disk_queue_dir".to_string())
                .with_labels(vec![("dir".to_string(), dir_label)]);
            let gauge = registry.register_counter(stats_level, key, COUNTER_AVAILABLE_BYTES);
            let poll_dir = canonical.clone();
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(poll_interval);
                loop {
                    interval.tick().await;
                    match available_bytes(&poll_dir) {
                        Ok(bytes) => gauge.set(bytes),
                        Err(err) => {
                            tracing::warn!(dir = %poll_dir.display(), %err, "failed to poll disk queue directory free space");
                        }
                    }
                }
            });
            entries.insert(canonical.clone(), Entry { refcount: 1, handle });
        }
        DirStatsGuard { registry: Arc::clone(self), dir: canonical }
    }

    fn release(&self, dir: &Path) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(dir) {
            entry.refcount -= 1;
            if entry.refcount == 0 {
                if let Some(entry) = entries.remove(dir) {
                    entry.handle.abort();
                }
            }
        }
    }
}

/// RAII handle releasing this caller's interest in a directory's polling
/// task when dropped.
pub struct DirStatsGuard {
    registry: Arc<DirStatsRegistry>,
    dir: PathBuf,
}

impl Drop for DirStatsGuard {
    fn drop(&mut self) {
        self.registry.release(&self.dir);
    }
}

#[cfg(unix)]
fn available_bytes(dir: &Path) -> std::io::Result<i64> {
    let stat = nix::sys::statvfs::statvfs(dir).map_err(std::io::Error::from)?;
    Ok((stat.blocks_available() as u64).saturating_mul(stat.fragment_size()) as i64)
}

#[cfg(not(unix))]
fn available_bytes(_dir: &Path) -> std::io::Result<i64> {
    Ok(0)
}
