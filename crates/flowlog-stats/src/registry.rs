// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The metrics registry (§4.1): a process-scoped set of counter clusters
//! behind a single lock, with level-gating and a dynamic-cluster cap.

use crate::cluster::{Cluster, CounterType};
use crate::counter::Counter;
use crate::key::ClusterKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

struct Inner {
    level: u8,
    /// 0 means unlimited (§7, §9 Open Question: max_dynamic=0 is fixed to
    /// mean unlimited).
    max_dynamic: usize,
    static_clusters: HashMap<ClusterKey, Cluster>,
    dynamic_clusters: HashMap<ClusterKey, Cluster>,
}

/// Process-wide metrics registry. One instance is shared (via `Arc`) across
/// every subsystem that registers counters.
pub struct StatsRegistry {
    inner: Mutex<Inner>,
}

impl StatsRegistry {
    pub fn new(level: u8, max_dynamic: usize) -> Self {
        StatsRegistry {
            inner: Mutex::new(Inner {
                level,
                max_dynamic,
                static_clusters: HashMap::new(),
                dynamic_clusters: HashMap::new(),
            }),
        }
    }

    pub fn level(&self) -> u8 {
        self.inner.lock().level
    }

    /// Register (or attach to an existing) static counter. Returns a null,
    /// always-zero, write-absorbing counter if `level` is gated out.
    pub fn register_counter(&self, level: u8, key: ClusterKey, ty: CounterType) -> Counter {
        let mut inner = self.inner.lock();
        if level > inner.level {
            return Counter::null();
        }
        let cluster = inner.static_clusters.entry(key.clone()).or_insert_with(|| Cluster::new(key, false));
        cluster.incref();
        cluster.get_or_create(ty, Counter::owned)
    }

    /// Register a dynamic counter, refused (null counter) once
    /// `max_dynamic` distinct dynamic clusters already exist.
    pub fn register_dynamic_counter(&self, level: u8, key: ClusterKey, ty: CounterType) -> Counter {
        let mut inner = self.inner.lock();
        if level > inner.level {
            return Counter::null();
        }
        let at_cap = inner.max_dynamic != 0
            && inner.dynamic_clusters.len() >= inner.max_dynamic
            && !inner.dynamic_clusters.contains_key(&key);
        if at_cap {
            tracing::warn!(cluster = %key.query_key(), "dynamic cluster cap reached, refusing registration");
            return Counter::null();
        }
        let cluster = inner.dynamic_clusters.entry(key.clone()).or_insert_with(|| Cluster::new(key, true));
        cluster.incref();
        cluster.get_or_create(ty, Counter::owned)
    }

    /// Register a counter whose storage is supplied by the caller. Writes
    /// through the returned handle panic (§9).
    pub fn register_external_counter(
        &self,
        level: u8,
        key: ClusterKey,
        ty: CounterType,
        external: Arc<AtomicI64>,
    ) -> Counter {
        let mut inner = self.inner.lock();
        if level > inner.level {
            return Counter::null();
        }
        let cluster = inner.static_clusters.entry(key.clone()).or_insert_with(|| Cluster::new(key, false));
        if let Some(existing) = cluster.counter(ty) {
            assert!(
                existing.is_external(),
                "programming error: cannot register an external counter at a key already holding an internal one"
            );
        }
        cluster.incref();
        cluster.get_or_create(ty, || Counter::external(external))
    }

    /// Shorthand for external registration pointing at another already
    /// registered counter's storage.
    pub fn register_alias_counter(
        &self,
        level: u8,
        key: ClusterKey,
        ty: CounterType,
        aliased: &Counter,
    ) -> Counter {
        self.register_external_counter(level, key, ty, aliased.storage_handle())
    }

    /// Decrement the cluster's use-count. Zero use-count makes the cluster
    /// orphaned but it is not removed until `remove_cluster` or a dynamic
    /// reap sweep runs.
    pub fn unregister_counter(&self, key: &ClusterKey) {
        let mut inner = self.inner.lock();
        if let Some(c) = inner.static_clusters.get_mut(key) {
            c.decref();
            return;
        }
        if let Some(c) = inner.dynamic_clusters.get_mut(key) {
            c.decref();
        }
    }

    /// Remove a cluster, but only if it is orphaned.
    pub fn remove_cluster(&self, key: &ClusterKey) -> bool {
        let mut inner = self.inner.lock();
        if let Some(c) = inner.static_clusters.get(key) {
            if c.is_orphaned() {
                inner.static_clusters.remove(key);
                return true;
            }
            return false;
        }
        if let Some(c) = inner.dynamic_clusters.get(key) {
            if c.is_orphaned() {
                inner.dynamic_clusters.remove(key);
                return true;
            }
        }
        false
    }

    /// Sweep orphaned dynamic clusters (the registry never does this
    /// implicitly -- it is driven by a reaper on the configured `lifetime`).
    pub fn reap_orphaned_dynamic(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.dynamic_clusters.len();
        inner.dynamic_clusters.retain(|_, c| !c.is_orphaned());
        before - inner.dynamic_clusters.len()
    }

    pub fn dynamic_cluster_count(&self) -> usize {
        self.inner.lock().dynamic_clusters.len()
    }

    /// Attach export-time unit/frame-of-reference formatting to an already
    /// registered counter.
    pub fn set_formatting(&self, key: &ClusterKey, ty: CounterType, formatting: crate::cluster::CounterFormatting) {
        let mut inner = self.inner.lock();
        if let Some(c) = inner.static_clusters.get_mut(key) {
            c.set_formatting(ty, formatting);
            return;
        }
        if let Some(c) = inner.dynamic_clusters.get_mut(key) {
            c.set_formatting(ty, formatting);
        }
    }

    /// Iterate every cluster (static then dynamic) under the global lock.
    /// `cancellable` allows a long-running consumer (an export) to bail out
    /// between clusters.
    pub fn foreach_cluster(&self, cancellable: &AtomicBool, mut f: impl FnMut(&Cluster)) {
        let inner = self.inner.lock();
        for c in inner.static_clusters.values().chain(inner.dynamic_clusters.values()) {
            if cancellable.load(Ordering::Relaxed) {
                return;
            }
            f(c);
        }
    }

    pub fn foreach_counter(&self, cancellable: &AtomicBool, mut f: impl FnMut(&Cluster, CounterType, &Counter)) {
        self.foreach_cluster(cancellable, |c| {
            for (ty, counter) in c.iter() {
                f(c, ty, counter);
            }
        });
    }

    /// `RESET_STATS` (§6): zero every counter except `stamp` (a point in
    /// time, not an accumulator) and external/alias counters, whose storage
    /// this registry does not own.
    pub fn reset_non_stamp_counters(&self) {
        let cancel = AtomicBool::new(false);
        self.foreach_counter(&cancel, |_cluster, ty, counter| {
            if !ty.is_timestamp() && !counter.is_external() {
                counter.set(0);
            }
        });
    }
}
