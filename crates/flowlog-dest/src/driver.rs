// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The threaded destination driver (§4.6 "Model"): `num_workers` independent
//! [`WorkerLoop`] tasks, each with its own queue, fed by routing incoming
//! messages through a [`Partitioner`].

use flowlog_core::{LogMessage, PathOptions};
use flowlog_stats::StatsRegistry;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::event_loop::{WorkerLoop, WorkerLoopConfig, WorkerOptions};
use crate::metrics::DriverMetrics;
use crate::partition::Partitioner;
use crate::queue::Queue;
use crate::seqnum::SeqNumSource;
use crate::worker::DestinationWorker;

/// Persist-store key a driver's shared sequence-number counter is stashed
/// under across a reload (§6 `<driver>.seqnum`).
pub fn seqnum_persist_key(driver_name: &str) -> String {
    format!("{driver_name}.seqnum")
}

/// One destination's worker pool, plus its routing and driver-wide metrics.
pub struct ThreadedDestinationDriver {
    name: String,
    worker_queues: Vec<Arc<dyn Queue>>,
    partitioner: Arc<Partitioner>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    seqnum_shared_handle: Option<Arc<AtomicU64>>,
}

impl ThreadedDestinationDriver {
    /// Builds and spawns `num_workers` worker loops. `queue_factory` builds
    /// the queue for worker `i` (a fresh `MemoryQueue` or a `DiskBackedQueue`
    /// rooted at a per-worker path); `worker_factory` builds the protocol
    /// implementation for worker `i`.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        name: &str,
        num_workers: usize,
        partitioner: Partitioner,
        options: WorkerOptions,
        seqnum_shared: bool,
        persist_store: &dyn flowlog_core::persist::PersistStore,
        registry: &Arc<StatsRegistry>,
        stats_level: u8,
        mut queue_factory: impl FnMut(usize) -> Arc<dyn Queue>,
        mut worker_factory: impl FnMut(usize) -> Arc<dyn DestinationWorker>,
    ) -> Self {
        assert!(num_workers >= 1, "a driver always has at least one worker (§9)");

        let driver_metrics = Arc::new(DriverMetrics::register(registry, stats_level, name));
        let partitioner = Arc::new(partitioner);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let seqnum_shared_handle = if seqnum_shared {
            let key = seqnum_persist_key(name);
            let counter = persist_store
                .take(&key)
                .and_then(|boxed| boxed.downcast::<Arc<AtomicU64>>().ok())
                .map(|boxed| *boxed)
                .unwrap_or_else(|| Arc::new(AtomicU64::new(0)));
            Some(counter)
        } else {
            None
        };

        let mut worker_queues = Vec::with_capacity(num_workers);
        let mut handles = Vec::with_capacity(num_workers);

        for i in 0..num_workers {
            let queue = queue_factory(i);
            worker_queues.push(Arc::clone(&queue));
            let worker_impl = worker_factory(i);
            let seqnum = match &seqnum_shared_handle {
                Some(shared) => SeqNumSource::shared(Arc::clone(shared)),
                None => SeqNumSource::local(0),
            };
            let config = WorkerLoopConfig {
                driver_name: name.to_string(),
                worker_index: i,
                queue,
                worker_impl,
                options: options.clone(),
                seqnum,
                partitioner: Some(Arc::clone(&partitioner)),
                driver_metrics: Arc::clone(&driver_metrics),
                stats_registry: Arc::clone(registry),
                stats_level,
                shutdown_rx: shutdown_rx.clone(),
            };
            let worker_loop = WorkerLoop::new(config);
            handles.push(tokio::spawn(worker_loop.run()));
        }

        ThreadedDestinationDriver {
            name: name.to_string(),
            worker_queues,
            partitioner,
            shutdown_tx,
            handles,
            seqnum_shared_handle,
        }
    }

    /// Route `msg` to its worker's queue (§4.6 "Model": hash-partitioned or
    /// round-robin).
    pub fn submit(&self, msg: LogMessage, path_options: PathOptions) -> Result<(), WorkerError> {
        let idx = self.partitioner.route(&msg, self.worker_queues.len());
        self.worker_queues[idx].push_tail(msg, path_options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_workers(&self) -> usize {
        self.worker_queues.len()
    }

    /// Signal every worker to run its shutdown sequence (flush + rewind +
    /// disconnect), stash the shared sequence counter for the next
    /// configuration generation, and wait for all worker tasks to exit.
    pub async fn stop(self, persist_store: &dyn flowlog_core::persist::PersistStore) {
        if let Some(shared) = &self.seqnum_shared_handle {
            persist_store.put(&seqnum_persist_key(&self.name), Box::new(Arc::clone(shared)));
        }
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
