// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived counters computed from samples of another counter over time
//! (§4.1 "Aggregated counters"): `Maximum`, `Average`, and `ChangePerSecond`.
//!
//! `ChangePerSecond` additionally tracks three rolling windows (last hour,
//! last 24h, since start) and self-unregisters once its source stops
//! advancing across all three, mirroring the legacy `csv`/`stats-query`
//! rate aggregator's housekeeping.

use crate::counter::Counter;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Tracks the largest sample seen so far.
pub struct MaximumAggregator {
    max: Arc<AtomicI64>,
}

impl MaximumAggregator {
    pub fn new() -> Self {
        MaximumAggregator { max: Arc::new(AtomicI64::new(i64::MIN)) }
    }

    pub fn sample(&self, value: i64) {
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        match self.max.load(Ordering::Relaxed) {
            i64::MIN => 0,
            v => v,
        }
    }

    pub fn storage_handle(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.max)
    }
}

impl Default for MaximumAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Running arithmetic mean of every sample seen.
pub struct AverageAggregator {
    sum: i64,
    count: i64,
}

impl AverageAggregator {
    pub fn new() -> Self {
        AverageAggregator { sum: 0, count: 0 }
    }

    pub fn sample(&mut self, value: i64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn value(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count
        }
    }
}

impl Default for AverageAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// One fixed-length rolling window of per-minute samples, used to compute
/// a rate over the last N minutes.
struct Window {
    capacity_minutes: u32,
    samples: Vec<i64>,
    cursor: usize,
    filled: usize,
}

impl Window {
    fn new(capacity_minutes: u32) -> Self {
        Window { capacity_minutes, samples: vec![0; capacity_minutes as usize], cursor: 0, filled: 0 }
    }

    fn push(&mut self, value: i64) {
        self.samples[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.capacity_minutes as usize;
        self.filled = (self.filled + 1).min(self.capacity_minutes as usize);
    }

    /// Rate per second across the oldest-to-newest span currently held.
    fn rate_per_second(&self) -> i64 {
        if self.filled < 2 {
            return 0;
        }
        let newest_idx = (self.cursor + self.capacity_minutes as usize - 1) % self.capacity_minutes as usize;
        let oldest_idx = (self.cursor + self.capacity_minutes as usize - self.filled) % self.capacity_minutes as usize;
        let delta = self.samples[newest_idx] - self.samples[oldest_idx];
        let elapsed_seconds = ((self.filled - 1) as i64) * 60;
        if elapsed_seconds == 0 {
            0
        } else {
            delta / elapsed_seconds
        }
    }
}

/// Samples its source counter once a minute across three windows (last
/// hour, last 24h, since start) and exposes a change-per-second rate for
/// each.
pub struct ChangePerSecondAggregator {
    source: Counter,
    last_value: i64,
    stalled_ticks: u32,
    hour: Window,
    day: Window,
    since_start: Window,
}

/// After this many consecutive no-op minute ticks the aggregator reports
/// itself eligible for reaping (§4.1: self-unregistering when the source
/// stops moving).
const STALL_THRESHOLD_MINUTES: u32 = 24 * 60;

impl ChangePerSecondAggregator {
    pub fn new(source: Counter) -> Self {
        let start = source.get();
        ChangePerSecondAggregator {
            source,
            last_value: start,
            stalled_ticks: 0,
            hour: Window::new(60),
            day: Window::new(24 * 60),
            since_start: Window::new(24 * 60),
        }
    }

    /// Call once a minute.
    pub fn tick(&mut self) {
        let current = self.source.get();
        self.hour.push(current);
        self.day.push(current);
        self.since_start.push(current);
        if current == self.last_value {
            self.stalled_ticks += 1;
        } else {
            self.stalled_ticks = 0;
        }
        self.last_value = current;
    }

    pub fn rate_last_hour(&self) -> i64 {
        self.hour.rate_per_second()
    }

    pub fn rate_last_day(&self) -> i64 {
        self.day.rate_per_second()
    }

    pub fn rate_since_start(&self) -> i64 {
        self.since_start.rate_per_second()
    }

    /// True once the source has not advanced for a full day of ticks.
    pub fn is_stalled(&self) -> bool {
        self.stalled_ticks >= STALL_THRESHOLD_MINUTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_tracks_peak() {
        let agg = MaximumAggregator::new();
        agg.sample(3);
        agg.sample(9);
        agg.sample(4);
        assert_eq!(agg.value(), 9);
    }

    #[test]
    fn maximum_with_no_samples_is_zero() {
        assert_eq!(MaximumAggregator::new().value(), 0);
    }

    #[test]
    fn average_computes_mean() {
        let mut agg = AverageAggregator::new();
        agg.sample(2);
        agg.sample(4);
        agg.sample(6);
        assert_eq!(agg.value(), 4);
    }

    #[test]
    fn change_per_second_computes_rate_over_window() {
        let source = Counter::owned();
        let mut agg = ChangePerSecondAggregator::new(source.clone());
        for i in 0..10 {
            source.set(i * 60);
            agg.tick();
        }
        assert_eq!(agg.rate_last_hour(), 1);
    }

    #[test]
    fn stalled_source_is_detected() {
        let source = Counter::owned();
        let mut agg = ChangePerSecondAggregator::new(source);
        for _ in 0..STALL_THRESHOLD_MINUTES {
            agg.tick();
        }
        assert!(agg.is_stalled());
    }

    #[test]
    fn moving_source_is_not_stalled() {
        let source = Counter::owned();
        let mut agg = ChangePerSecondAggregator::new(source.clone());
        for i in 0..5 {
            source.set(i);
            agg.tick();
        }
        assert!(!agg.is_stalled());
    }
}
