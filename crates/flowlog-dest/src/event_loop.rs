// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-worker cooperative event loop (§4.6 "Per-worker event loop"):
//! `wake_up`, `shutdown`, `reconnect_timer`, `throttle_timer`, `flush_timer`
//! and `do_work_task` realized as a single `tokio::select!` over an mpsc
//! wakeup channel, a shutdown watch, and three optional deadlines.

use flowlog_core::LogMessage;
use flowlog_stats::StatsRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant as TokioInstant;

use crate::metrics::{DriverMetrics, WorkerMetrics};
use crate::partition::Partitioner;
use crate::queue::{CheckItemsResult, Queue};
use crate::seqnum::SeqNumSource;
use crate::worker::{DestinationWorker, FlushMode, InsertResult};

/// Batching and retry tuning for one worker (§4.6 "Model").
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// `<= 1` disables batching: every successful insert flushes immediately.
    pub batch_lines: usize,
    /// Zero disables time-based batching.
    pub batch_timeout: Duration,
    pub time_reopen: Duration,
    pub retries_on_error_max: u32,
    pub retries_max: u32,
    /// Flush before inserting a message whose partition key differs from
    /// the previous one in this worker's stream.
    pub flush_on_key_change: bool,
}

pub struct WorkerLoopConfig {
    pub driver_name: String,
    pub worker_index: usize,
    pub queue: Arc<dyn Queue>,
    pub worker_impl: Arc<dyn DestinationWorker>,
    pub options: WorkerOptions,
    pub seqnum: SeqNumSource,
    pub partitioner: Option<Arc<Partitioner>>,
    pub driver_metrics: Arc<DriverMetrics>,
    pub stats_registry: Arc<StatsRegistry>,
    pub stats_level: u8,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Drives one [`DestinationWorker`] against its [`Queue`] (§4.6). Each
/// worker is its own `tokio` task; nothing here is shared mutable state
/// across workers except the queue, the driver-level metrics and the
/// sequence-number source, all of which are already internally synchronized.
pub struct WorkerLoop {
    queue: Arc<dyn Queue>,
    worker: Arc<dyn DestinationWorker>,
    options: WorkerOptions,
    seqnum: SeqNumSource,
    partitioner: Option<Arc<Partitioner>>,
    metrics: WorkerMetrics,
    driver_metrics: Arc<DriverMetrics>,
    shutdown_rx: watch::Receiver<bool>,

    wake_tx: mpsc::Sender<()>,
    wake_rx: mpsc::Receiver<()>,

    connected: bool,
    enable_batching: bool,
    batch_size: usize,
    rewound_batch_size: usize,
    retries_on_error: u32,
    retries: u32,
    last_key: Option<Vec<u8>>,
    last_flush_time: Instant,
    last_delay_sample: Option<Instant>,

    reconnect_deadline: Option<TokioInstant>,
    throttle_deadline: Option<TokioInstant>,
    flush_deadline: Option<TokioInstant>,
}

impl WorkerLoop {
    pub fn new(config: WorkerLoopConfig) -> Self {
        let metrics = WorkerMetrics::register(
            &config.stats_registry,
            config.stats_level,
            &config.driver_name,
            config.worker_index,
        );
        let (wake_tx, wake_rx) = mpsc::channel(1);
        WorkerLoop {
            queue: config.queue,
            worker: config.worker_impl,
            options: config.options,
            seqnum: config.seqnum,
            partitioner: config.partitioner,
            metrics,
            driver_metrics: config.driver_metrics,
            shutdown_rx: config.shutdown_rx,
            wake_tx,
            wake_rx,
            connected: false,
            enable_batching: false,
            batch_size: 0,
            rewound_batch_size: 0,
            retries_on_error: 0,
            retries: 0,
            last_key: None,
            last_flush_time: Instant::now(),
            last_delay_sample: None,
            reconnect_deadline: None,
            throttle_deadline: None,
            flush_deadline: None,
        }
    }

    /// Runs until the shutdown watch flips to `true`. Consumes `self` since
    /// a worker loop never restarts; the driver spawns a fresh one on
    /// reload.
    pub async fn run(mut self) {
        self.do_work().await;
        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.on_shutdown().await;
                        return;
                    }
                }
                _ = self.wake_rx.recv() => {
                    self.do_work().await;
                }
                _ = sleep_until_opt(self.reconnect_deadline) => {
                    self.reconnect_deadline = None;
                    self.do_work().await;
                }
                _ = sleep_until_opt(self.throttle_deadline) => {
                    self.throttle_deadline = None;
                    self.do_work().await;
                }
                _ = sleep_until_opt(self.flush_deadline) => {
                    self.flush_deadline = None;
                    self.do_flush(FlushMode::Normal).await;
                }
            }
        }
    }

    async fn do_work(&mut self) {
        if !self.connected {
            if self.worker.connect().await {
                self.connected = true;
                self.metrics.output_unreachable.set(0);
            } else {
                self.suspend();
                return;
            }
        }

        let wake_tx = self.wake_tx.clone();
        let wakeup: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let _ = wake_tx.try_send(());
        });
        match self.queue.check_items(wakeup) {
            CheckItemsResult::Available => {
                self.insert_loop().await;
                self.flush_or_reschedule().await;
            }
            CheckItemsResult::Empty { retry_after_msec } => {
                if self.batch_size > 0 {
                    self.flush_or_reschedule().await;
                }
                if let Some(ms) = retry_after_msec {
                    self.throttle_deadline = Some(TokioInstant::now() + Duration::from_millis(ms));
                }
            }
        }
    }

    async fn flush_or_reschedule(&mut self) {
        if self.should_flush_now() {
            self.do_flush(FlushMode::Normal).await;
        } else {
            let remaining = self.options.batch_timeout.saturating_sub(self.last_flush_time.elapsed());
            self.flush_deadline = Some(TokioInstant::now() + remaining);
        }
    }

    fn should_flush_now(&self) -> bool {
        self.options.batch_lines <= 1
            || self.options.batch_timeout.is_zero()
            || !self.enable_batching
            || self.last_flush_time.elapsed() >= self.options.batch_timeout
    }

    /// Pops and inserts messages until the queue is drained, a batch
    /// boundary is hit, or a result forces the worker to yield (§4.6
    /// "Insert loop"). A `Retry` that has not exhausted its budget rewinds
    /// and loops back onto the same message rather than breaking, which is
    /// what bounds repeated replay of one message to `retries_max` attempts
    /// instead of looping forever.
    async fn insert_loop(&mut self) {
        loop {
            if self.options.flush_on_key_change {
                if let Some(partitioner) = self.partitioner.clone() {
                    if let Some((peek_msg, _)) = self.queue.peek_head() {
                        let key = partitioner.key_for(&peek_msg);
                        if self.last_key.is_some() && key != self.last_key {
                            self.do_flush(FlushMode::Normal).await;
                        }
                        self.last_key = key;
                    }
                }
            }

            let Some((msg, _path_options)) = self.queue.pop_head() else { break };
            self.sample_delay(&msg);
            let _seqnum = self.seqnum.next();

            match self.worker.insert(&msg).await {
                InsertResult::Success => {
                    self.metrics.written.inc();
                    self.driver_metrics.events_delivered.inc();
                    self.queue.ack_backlog(1);
                    self.retries_on_error = 0;
                    self.batch_size = 0;
                }
                InsertResult::Queued => {
                    self.enable_batching = true;
                    self.batch_size += 1;
                    self.metrics.queued.set(self.batch_size as i64);
                    self.driver_metrics.events_queued.inc();
                }
                InsertResult::ExplicitAckMgmt => {
                    self.batch_size += 1;
                }
                InsertResult::Drop => {
                    self.metrics.dropped.inc();
                    self.driver_metrics.events_dropped.inc();
                    self.queue.ack_backlog(1);
                    self.batch_size = 0;
                    self.disconnect_and_suspend().await;
                    self.driver_metrics.processed.inc();
                    break;
                }
                InsertResult::Error => {
                    self.retries_on_error += 1;
                    self.driver_metrics.output_event_retries_total.inc();
                    let rewind_n = self.batch_size.max(1);
                    if self.retries_on_error >= self.options.retries_on_error_max {
                        self.queue.ack_backlog(rewind_n);
                        self.metrics.dropped.add(rewind_n as i64);
                        self.driver_metrics.events_dropped.add(rewind_n as i64);
                    } else {
                        self.queue.rewind_backlog(rewind_n);
                        self.rewound_batch_size = rewind_n;
                    }
                    self.batch_size = 0;
                    self.disconnect_and_suspend().await;
                    self.driver_metrics.processed.inc();
                    break;
                }
                InsertResult::NotConnected => {
                    self.retries = 0;
                    let rewind_n = self.batch_size.max(1);
                    self.queue.rewind_backlog(rewind_n);
                    self.rewound_batch_size = rewind_n;
                    self.batch_size = 0;
                    self.disconnect_and_suspend().await;
                    self.driver_metrics.processed.inc();
                    break;
                }
                InsertResult::Retry => {
                    self.retries += 1;
                    self.driver_metrics.output_event_retries_total.inc();
                    let rewind_n = self.batch_size.max(1);
                    self.queue.rewind_backlog(rewind_n);
                    self.rewound_batch_size = rewind_n;
                    self.batch_size = 0;
                    if self.retries >= self.options.retries_max {
                        self.retries = 0;
                        self.disconnect_and_suspend().await;
                        self.driver_metrics.processed.inc();
                        break;
                    }
                    self.driver_metrics.processed.inc();
                    continue;
                }
            }
            self.driver_metrics.processed.inc();
            if self.options.batch_lines > 1 && self.batch_size >= self.options.batch_lines {
                break;
            }
        }
    }

    async fn do_flush(&mut self, mode: FlushMode) {
        match self.worker.flush(mode).await {
            InsertResult::Success | InsertResult::ExplicitAckMgmt => {
                if self.batch_size > 0 {
                    self.queue.ack_backlog(self.batch_size);
                }
            }
            InsertResult::Queued => {}
            InsertResult::Drop => {
                if self.batch_size > 0 {
                    self.queue.ack_backlog(self.batch_size);
                    self.metrics.dropped.add(self.batch_size as i64);
                    self.driver_metrics.events_dropped.add(self.batch_size as i64);
                }
                self.disconnect_and_suspend().await;
            }
            InsertResult::Error | InsertResult::NotConnected | InsertResult::Retry => {
                if self.batch_size > 0 {
                    self.queue.rewind_backlog(self.batch_size);
                    self.rewound_batch_size = self.batch_size;
                }
                self.disconnect_and_suspend().await;
            }
        }
        self.batch_size = 0;
        self.enable_batching = false;
        self.last_flush_time = Instant::now();
        self.flush_deadline = None;
    }

    fn suspend(&mut self) {
        self.metrics.output_unreachable.set(1);
        self.reconnect_deadline = Some(TokioInstant::now() + self.options.time_reopen);
    }

    async fn disconnect_and_suspend(&mut self) {
        self.worker.disconnect().await;
        self.connected = false;
        self.suspend();
    }

    /// Bounded to once per wall-clock second (§4.6 "Per-worker metrics").
    fn sample_delay(&mut self, msg: &LogMessage) {
        let now = Instant::now();
        if let Some(last) = self.last_delay_sample {
            if now.duration_since(last) < Duration::from_secs(1) {
                return;
            }
        }
        self.last_delay_sample = Some(now);

        let wall_now = SystemTime::now();
        let delay_ms = wall_now
            .duration_since(msg.data().timestamp_recv)
            .unwrap_or_default()
            .as_millis() as i64;
        self.metrics.output_event_delay_sample_seconds.set(delay_ms);

        let age_epoch_secs = wall_now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        self.metrics.output_event_delay_sample_age_seconds.set(age_epoch_secs);
    }

    async fn on_shutdown(&mut self) {
        self.do_flush(FlushMode::Expedite).await;
        self.queue.rewind_backlog_all();
        self.worker.disconnect().await;
    }
}

async fn sleep_until_opt(deadline: Option<TokioInstant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
