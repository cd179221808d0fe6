// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stats clusters: the unit of registration, holding one or more related
//! counters under a single key (§3, §4.1).

use crate::counter::Counter;
use crate::key::ClusterKey;
use std::collections::HashMap;

/// Identifies one counter within a cluster (e.g. `dropped`, `processed`,
/// `value` for single-value clusters). A small open set of `&'static str`
/// rather than a closed enum, since destination/source drivers each expose
/// their own counter names (§4.6's `output_event_bytes_total` etc.) on top
/// of the logpipe set named in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterType(pub &'static str);

impl CounterType {
    pub const VALUE: CounterType = CounterType("value");
    pub const DROPPED: CounterType = CounterType("dropped");
    pub const PROCESSED: CounterType = CounterType("processed");
    pub const QUEUED: CounterType = CounterType("queued");
    pub const SUPPRESSED: CounterType = CounterType("suppressed");
    pub const STAMP: CounterType = CounterType("stamp");
    pub const MEMORY_USAGE: CounterType = CounterType("memory_usage");
    pub const DISCARDED: CounterType = CounterType("discarded");
    pub const MATCHED: CounterType = CounterType("matched");
    pub const NOT_MATCHED: CounterType = CounterType("not_matched");
    pub const WRITTEN: CounterType = CounterType("written");

    /// `get_sum` excludes `stamp` counters (§4.1 query layer).
    pub fn is_timestamp(self) -> bool {
        self.0 == "stamp"
    }
}

/// Unit a counter's stored integer is denominated in, for export-time
/// conversion (§4.1 Prometheus export).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    None,
    Seconds,
    Minutes,
    Hours,
    Milliseconds,
    Nanoseconds,
    Bytes,
    Kib,
    Mib,
    Gib,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOfReference {
    #[default]
    None,
    Absolute,
    RelativeToTimeOfQuery,
}

#[derive(Debug, Clone, Default)]
pub struct CounterFormatting {
    pub unit: Unit,
    pub frame_of_reference: FrameOfReference,
}

struct CounterEntry {
    counter: Counter,
    formatting: CounterFormatting,
}

/// A single, named collection of counters registered under one [`ClusterKey`].
pub struct Cluster {
    pub key: ClusterKey,
    pub dynamic: bool,
    use_count: u32,
    counters: HashMap<CounterType, CounterEntry>,
}

impl Cluster {
    pub fn new(key: ClusterKey, dynamic: bool) -> Self {
        Cluster { key, dynamic, use_count: 0, counters: HashMap::new() }
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn is_orphaned(&self) -> bool {
        self.use_count == 0
    }

    pub fn incref(&mut self) {
        self.use_count += 1;
    }

    /// Returns true if the cluster became orphaned (use_count reached 0).
    pub fn decref(&mut self) -> bool {
        self.use_count = self.use_count.saturating_sub(1);
        self.use_count == 0
    }

    pub fn counter(&self, ty: CounterType) -> Option<&Counter> {
        self.counters.get(&ty).map(|e| &e.counter)
    }

    pub fn formatting(&self, ty: CounterType) -> CounterFormatting {
        self.counters.get(&ty).map(|e| e.formatting.clone()).unwrap_or_default()
    }

    pub fn set_formatting(&mut self, ty: CounterType, formatting: CounterFormatting) {
        if let Some(entry) = self.counters.get_mut(&ty) {
            entry.formatting = formatting;
        }
    }

    pub fn get_or_create(&mut self, ty: CounterType, make: impl FnOnce() -> Counter) -> Counter {
        self.counters
            .entry(ty)
            .or_insert_with(|| CounterEntry { counter: make(), formatting: CounterFormatting::default() })
            .counter
            .clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CounterType, &Counter)> {
        self.counters.iter().map(|(ty, e)| (*ty, &e.counter))
    }
}
