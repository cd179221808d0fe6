// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker and per-driver stats clusters (§4.6 "Per-worker metrics").

use flowlog_stats::cluster::{CounterFormatting, FrameOfReference, Unit};
use flowlog_stats::{ClusterKey, Counter, CounterType, StatsRegistry};
use std::sync::atomic::{AtomicU32, Ordering};

const COUNTER_OUTPUT_UNREACHABLE: CounterType = CounterType("output_unreachable");
const COUNTER_DELAY_SAMPLE: CounterType = CounterType("output_event_delay_sample_seconds");
const COUNTER_DELAY_SAMPLE_AGE: CounterType = CounterType("output_event_delay_sample_age_seconds");
const COUNTER_BYTES_TOTAL: CounterType = CounterType("output_event_bytes_total");
const COUNTER_EVENTS_TOTAL: CounterType = CounterType("output_events_total");
const COUNTER_RETRIES_TOTAL: CounterType = CounterType("output_event_retries_total");

/// Mirrors syslog-ng's `StatsByteCounter`: the hot path adds into a narrow
/// atomic and rolls completed mebibytes up into the registry's ordinary
/// (64-bit) [`Counter`] so the running total never depends on a single wide
/// atomic add. Only ever called from the worker loop that owns it (§5:
/// worker-internal state is single-threaded), so the roll-up below needs no
/// compare-and-swap.
pub struct ByteCounter {
    remainder: AtomicU32,
    mib_total: Counter,
}

const MIB: u32 = 1 << 20;

impl ByteCounter {
    pub fn new(mib_total: Counter) -> Self {
        ByteCounter { remainder: AtomicU32::new(0), mib_total }
    }

    pub fn add(&self, n: u32) {
        let prev = self.remainder.load(Ordering::Relaxed);
        let total = prev as u64 + n as u64;
        if total >= MIB as u64 {
            let rolled = total / MIB as u64;
            self.remainder.store((total - rolled * MIB as u64) as u32, Ordering::Relaxed);
            self.mib_total.add(rolled as i64);
        } else {
            self.remainder.store(total as u32, Ordering::Relaxed);
        }
    }

    pub fn total_bytes(&self) -> i64 {
        self.mib_total.get() * MIB as i64 + self.remainder.load(Ordering::Relaxed) as i64
    }
}

/// Per-worker counters (§4.6).
pub struct WorkerMetrics {
    pub written: Counter,
    pub dropped: Counter,
    pub queued: Counter,
    pub output_unreachable: Counter,
    pub output_event_delay_sample_seconds: Counter,
    pub output_event_delay_sample_age_seconds: Counter,
    pub output_event_bytes_total: ByteCounter,
}

impl WorkerMetrics {
    pub fn register(registry: &StatsRegistry, stats_level: u8, driver_name: &str, worker_index: usize) -> Self {
        let key = ClusterKey::new(driver_name.to_string())
            .with_labels(vec![("worker".to_string(), worker_index.to_string())]);
        let written = registry.register_counter(stats_level, key.clone(), CounterType::WRITTEN);
        let dropped = registry.register_counter(stats_level, key.clone(), CounterType::DROPPED);
        let queued = registry.register_counter(stats_level, key.clone(), CounterType::QUEUED);
        let output_unreachable = registry.register_counter(stats_level, key.clone(), COUNTER_OUTPUT_UNREACHABLE);
        let output_event_delay_sample_seconds =
            registry.register_counter(stats_level, key.clone(), COUNTER_DELAY_SAMPLE);
        registry.set_formatting(
            &key,
            COUNTER_DELAY_SAMPLE,
            CounterFormatting { unit: Unit::Milliseconds, frame_of_reference: FrameOfReference::None },
        );
        let output_event_delay_sample_age_seconds =
            registry.register_counter(stats_level, key.clone(), COUNTER_DELAY_SAMPLE_AGE);
        registry.set_formatting(
            &key,
            COUNTER_DELAY_SAMPLE_AGE,
            CounterFormatting { unit: Unit::None, frame_of_reference: FrameOfReference::RelativeToTimeOfQuery },
        );
        let bytes_mib_total = registry.register_counter(stats_level, key, COUNTER_BYTES_TOTAL);

        WorkerMetrics {
            written,
            dropped,
            queued,
            output_unreachable,
            output_event_delay_sample_seconds,
            output_event_delay_sample_age_seconds,
            output_event_bytes_total: ByteCounter::new(bytes_mib_total),
        }
    }
}

/// Per-driver aggregated counters (§4.6), summed across all of its workers.
pub struct DriverMetrics {
    pub events_delivered: Counter,
    pub events_dropped: Counter,
    pub events_queued: Counter,
    pub output_event_retries_total: Counter,
    pub processed: Counter,
}

impl DriverMetrics {
    pub fn register(registry: &StatsRegistry, stats_level: u8, driver_name: &str) -> Self {
        let base = ClusterKey::new(driver_name.to_string());
        let delivered_key =
            base.clone().with_labels(vec![("result".to_string(), "delivered".to_string())]);
        let dropped_key = base.clone().with_labels(vec![("result".to_string(), "dropped".to_string())]);
        let queued_key = base.clone().with_labels(vec![("result".to_string(), "queued".to_string())]);

        DriverMetrics {
            events_delivered: registry.register_counter(stats_level, delivered_key, COUNTER_EVENTS_TOTAL),
            events_dropped: registry.register_counter(stats_level, dropped_key, COUNTER_EVENTS_TOTAL),
            events_queued: registry.register_counter(stats_level, queued_key, COUNTER_EVENTS_TOTAL),
            output_event_retries_total: registry.register_counter(stats_level, base.clone(), COUNTER_RETRIES_TOTAL),
            processed: registry.register_counter(stats_level, base, CounterType::PROCESSED),
        }
    }
}
