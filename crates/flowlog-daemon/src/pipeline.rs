// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the library crates into one running pipeline (§6): an AF_SOCKET
//! stream source feeds an mpsc channel, which a threaded destination driver
//! drains into a file sink. Filter expressions and the configuration
//! grammar that would normally sit between source and destination are out
//! of scope (§1); this is the plumbing those crates' APIs already support.

use std::sync::Arc;

use flowlog_core::{InMemoryPersistStore, PathOptions, PersistStore};
use flowlog_dest::{MemoryQueue, Partitioner, Queue, ThreadedDestinationDriver, WorkerOptions};
use flowlog_source::{AllowAll, SourceDriverOptions, StreamListener, StreamSourceDriver};
use flowlog_stats::StatsRegistry;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::DaemonError;
use crate::file_sink::FileSinkWorker;
use crate::line_reader::LineSourceReader;
use crate::Config;

/// The running source-to-destination plumbing, plus the handles needed to
/// wait for it to wind down after a shutdown is signaled.
pub struct Pipeline {
    source_driver: Arc<StreamSourceDriver<LineSourceReader>>,
    accept_handle: JoinHandle<()>,
    forward_handle: JoinHandle<()>,
}

impl Pipeline {
    pub async fn start(
        config: &Config,
        registry: Arc<StatsRegistry>,
        persist: Arc<dyn PersistStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Pipeline, DaemonError> {
        let _ = std::fs::remove_file(&config.source.listen_path);
        let listener = UnixListener::bind(&config.source.listen_path)?;

        let (tx, mut rx) = mpsc::channel(1024);
        let reader = Arc::new(LineSourceReader::new(tx));
        let source_options = SourceDriverOptions {
            max_connections: config.source.max_connections,
            listen_backlog: 255,
            keep_alive: config.source.keep_alive,
            persist_name: "flowlogd.source".to_string(),
            stats_level: config.stats.level,
        };
        let source_driver = Arc::new(StreamSourceDriver::reclaim_or(
            persist.as_ref(),
            source_options,
            StreamListener::Unix(listener),
            reader,
            None,
            Arc::new(AllowAll),
            &registry,
        ));

        let accept_driver = Arc::clone(&source_driver);
        let mut accept_shutdown = shutdown_rx.clone();
        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = accept_shutdown.changed() => {
                        if changed.is_err() || *accept_shutdown.borrow() {
                            return;
                        }
                    }
                    _ = accept_driver.accept_wakeup() => {}
                }
            }
        });

        let worker_options = WorkerOptions {
            batch_lines: config.destination.batch_lines,
            batch_timeout: config.destination.batch_timeout(),
            time_reopen: config.destination.time_reopen(),
            retries_on_error_max: config.destination.retries_on_error_max,
            retries_max: config.destination.retries_max,
            flush_on_key_change: false,
        };
        let sink_path = config.destination.sink_path.clone();
        let destination = ThreadedDestinationDriver::start(
            "flowlogd.sink",
            config.destination.num_workers,
            Partitioner::round_robin(),
            worker_options,
            false,
            persist.as_ref(),
            &registry,
            config.stats.level,
            |_i| Arc::new(MemoryQueue::new(None)) as Arc<dyn Queue>,
            move |_i| Arc::new(FileSinkWorker::new(sink_path.clone())) as Arc<dyn flowlog_dest::DestinationWorker>,
        );

        let mut forward_shutdown = shutdown_rx;
        let forward_persist = persist;
        let forward_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = forward_shutdown.changed() => {
                        if changed.is_err() || *forward_shutdown.borrow() {
                            break;
                        }
                    }
                    maybe_msg = rx.recv() => {
                        match maybe_msg {
                            Some(msg) => {
                                if let Err(err) = destination.submit(msg, PathOptions::new()) {
                                    tracing::warn!(%err, "failed to submit message to destination");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            destination.stop(forward_persist.as_ref()).await;
        });

        Ok(Pipeline { source_driver, accept_handle, forward_handle })
    }

    /// Waits for the accept loop and the forwarding loop to notice the
    /// shutdown watch and wind down. Callers flip the shared shutdown watch
    /// before calling this.
    pub async fn join(self) {
        let _ = self.accept_handle.await;
        let _ = self.forward_handle.await;
    }

    pub fn active_connections(&self) -> u64 {
        self.source_driver.active_connections()
    }
}

/// Convenience for callers (tests, `main`) that don't need reload handoff.
pub fn fresh_persist_store() -> Arc<dyn PersistStore> {
    InMemoryPersistStore::shared()
}
