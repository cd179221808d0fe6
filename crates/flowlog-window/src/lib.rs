// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowlog-window: the dynamic-window (credit-based) flow-control pool
//! shared across a source driver's kept-alive connections (§4.4).
//!
//! Each connection owns a fixed *static* window handed out at attach time
//! and may additionally draw *dynamic* credits from a shared pool, up to a
//! per-connection cap (`balanced_window`) that is periodically recomputed
//! as connections come and go. The pool itself only accounts for dynamic
//! credits; the static window is the caller's own bookkeeping.

use flowlog_stats::{ClusterKey, Counter, CounterType, StatsRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const COUNTER_POOL_REMAINING: CounterType = CounterType("pool_remaining");
const COUNTER_BALANCED_WINDOW: CounterType = CounterType("balanced_window");
const COUNTER_ACTIVE_CONNECTIONS: CounterType = CounterType("active_connections");

/// Identifies one connection attached to a [`DynamicWindowPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct Inner {
    pool_size: u64,
    /// Dynamic credits not currently allocated to any connection.
    pool_remaining: u64,
    /// Per-connection cap on dynamic credits, recomputed every `realloc_ticks`.
    balanced_window: u64,
    /// Dynamic credits currently allocated per connection.
    allocations: HashMap<ConnectionId, u64>,
    ticks_since_realloc: u32,
    warned_zero_balanced_window: bool,
}

/// Gauges mirroring the pool's state for the owning source driver's stats
/// cluster (§6: `afsocket_sd.(stream,<addr>).dynamic_window`).
struct Gauges {
    pool_remaining: Counter,
    balanced_window: Counter,
    active_connections: Counter,
}

/// The shared credit pool for one source driver (§4.4). One instance per
/// driver, attached to by each accepted connection.
pub struct DynamicWindowPool {
    inner: Mutex<Inner>,
    static_window: u64,
    realloc_ticks: u32,
    next_connection_id: AtomicU64,
    gauges: Option<Gauges>,
}

/// Parameters fixed at driver init (§4.4 "warning contract").
pub struct DynamicWindowPoolOptions {
    pub pool_size: u64,
    pub max_connections: u64,
    pub static_window: u64,
    pub realloc_ticks: u32,
}

impl DynamicWindowPool {
    /// Construct the pool, applying the init-time warning contract: round
    /// `pool_size` up to a multiple of `max_connections` if it is not
    /// already one, and warn if the resulting per-connection share would
    /// be less than 10x the static window.
    pub fn new(options: DynamicWindowPoolOptions, registry: Option<(&StatsRegistry, u8, ClusterKey)>) -> Self {
        let DynamicWindowPoolOptions { mut pool_size, max_connections, static_window, realloc_ticks } = options;

        if max_connections > 0 && pool_size % max_connections != 0 {
            let rounded = pool_size.div_ceil(max_connections) * max_connections;
            tracing::warn!(
                pool_size,
                max_connections,
                rounded,
                "dynamic window pool_size is not a multiple of max_connections, rounding up"
            );
            pool_size = rounded;
        }
        if max_connections > 0 {
            let share = pool_size / max_connections;
            if share < static_window.saturating_mul(10) {
                tracing::warn!(
                    pool_size,
                    max_connections,
                    share,
                    static_window,
                    "dynamic window per-connection share is less than 10x the static window"
                );
            }
        }

        let gauges = registry.map(|(registry, level, key)| Gauges {
            pool_remaining: registry.register_counter(level, key.clone(), COUNTER_POOL_REMAINING),
            balanced_window: registry.register_counter(level, key.clone(), COUNTER_BALANCED_WINDOW),
            active_connections: registry.register_counter(level, key, COUNTER_ACTIVE_CONNECTIONS),
        });

        let pool = DynamicWindowPool {
            inner: Mutex::new(Inner {
                pool_size,
                pool_remaining: pool_size,
                balanced_window: 0,
                allocations: HashMap::new(),
                ticks_since_realloc: 0,
                warned_zero_balanced_window: false,
            }),
            static_window,
            realloc_ticks,
            next_connection_id: AtomicU64::new(1),
            gauges,
        };
        pool.refresh_gauges();
        pool
    }

    fn refresh_gauges(&self) {
        let Some(gauges) = &self.gauges else { return };
        let inner = self.inner.lock();
        gauges.pool_remaining.set(inner.pool_remaining as i64);
        gauges.balanced_window.set(inner.balanced_window as i64);
        gauges.active_connections.set(inner.allocations.len() as i64);
    }

    /// Attach a new connection, registering it for a share of the pool.
    /// `balanced_window` is not recomputed here; it only updates on stats
    /// ticks per §4.4's algorithm.
    pub fn attach(&self) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut inner = self.inner.lock();
            inner.allocations.insert(id, 0);
        }
        self.refresh_gauges();
        id
    }

    /// Detach a connection, returning any dynamic credit it still held to
    /// the pool.
    pub fn detach(&self, id: ConnectionId) {
        {
            let mut inner = self.inner.lock();
            if let Some(held) = inner.allocations.remove(&id) {
                inner.pool_remaining += held;
            }
        }
        self.refresh_gauges();
    }

    /// Call once per stats tick (default every 1s, §4.4). Every
    /// `realloc_ticks` ticks, recomputes `balanced_window = pool_size /
    /// active_connections`.
    pub fn on_stats_tick(&self) {
        let recomputed = {
            let mut inner = self.inner.lock();
            inner.ticks_since_realloc += 1;
            if inner.ticks_since_realloc < self.realloc_ticks {
                return;
            }
            inner.ticks_since_realloc = 0;
            let active = inner.allocations.len() as u64;
            inner.balanced_window = if active == 0 { 0 } else { inner.pool_size / active };
            if inner.balanced_window == 0 && !inner.warned_zero_balanced_window {
                inner.warned_zero_balanced_window = true;
                tracing::warn!(
                    pool_size = inner.pool_size,
                    active_connections = active,
                    "dynamic window pool has too many connections, only the static window is available"
                );
            } else if inner.balanced_window > 0 {
                inner.warned_zero_balanced_window = false;
            }
            true
        };
        if recomputed {
            self.refresh_gauges();
        }
    }

    /// Static window handed to every connection at attach time,
    /// independent of the shared pool.
    pub fn static_window(&self) -> u64 {
        self.static_window
    }

    pub fn pool_size(&self) -> u64 {
        self.inner.lock().pool_size
    }

    pub fn pool_remaining(&self) -> u64 {
        self.inner.lock().pool_remaining
    }

    pub fn balanced_window(&self) -> u64 {
        self.inner.lock().balanced_window
    }

    pub fn active_connections(&self) -> u64 {
        self.inner.lock().allocations.len() as u64
    }

    /// Request additional dynamic credit for `id`. Grants
    /// `min(remaining_balanced_window, pool_remaining)`, which may be 0.
    pub fn request_growth(&self, id: ConnectionId, requested: u64) -> u64 {
        let granted = {
            let mut inner = self.inner.lock();
            let Some(current) = inner.allocations.get_mut(&id) else { return 0 };
            let remaining_balanced = inner.balanced_window.saturating_sub(*current);
            let grant = requested.min(remaining_balanced).min(inner.pool_remaining);
            if grant > 0 {
                inner.pool_remaining -= grant;
                *current += grant;
            }
            grant
        };
        if granted > 0 {
            self.refresh_gauges();
        }
        granted
    }

    /// Return `amount` dynamic credit held by `id` back to the pool.
    pub fn release(&self, id: ConnectionId, amount: u64) {
        {
            let mut inner = self.inner.lock();
            if let Some(held) = inner.allocations.get_mut(&id) {
                let released = amount.min(*held);
                *held -= released;
                inner.pool_remaining += released;
            }
        }
        self.refresh_gauges();
    }

    /// Dynamic credit currently allocated to `id`.
    pub fn allocated(&self, id: ConnectionId) -> u64 {
        self.inner.lock().allocations.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(pool_size: u64, max_connections: u64, static_window: u64, realloc_ticks: u32) -> DynamicWindowPool {
        DynamicWindowPool::new(
            DynamicWindowPoolOptions { pool_size, max_connections, static_window, realloc_ticks },
            None,
        )
    }

    #[test]
    fn balanced_window_recomputes_only_every_realloc_ticks() {
        let pool = pool(100, 10, 1, 5);
        let a = pool.attach();
        let _b = pool.attach();
        assert_eq!(pool.balanced_window(), 0, "not yet recomputed");
        for _ in 0..4 {
            pool.on_stats_tick();
        }
        assert_eq!(pool.balanced_window(), 0, "still within the same realloc window");
        pool.on_stats_tick();
        assert_eq!(pool.balanced_window(), 50);
        let _ = a;
    }

    #[test]
    fn growth_is_capped_by_balanced_window_and_pool_remaining() {
        let pool = pool(100, 10, 1, 1);
        let a = pool.attach();
        let b = pool.attach();
        pool.on_stats_tick();
        assert_eq!(pool.balanced_window(), 50);

        assert_eq!(pool.request_growth(a, 1000), 50);
        assert_eq!(pool.pool_remaining(), 50);
        // b is capped by the remaining pool, not its own balanced_window.
        assert_eq!(pool.request_growth(b, 1000), 50);
        assert_eq!(pool.pool_remaining(), 0);
    }

    #[test]
    fn release_returns_credit_and_conservation_holds() {
        let pool = pool(100, 10, 1, 1);
        let a = pool.attach();
        pool.on_stats_tick();
        pool.request_growth(a, 50);
        assert_eq!(pool.allocated(a) + pool.pool_remaining(), pool.pool_size());
        pool.release(a, 20);
        assert_eq!(pool.allocated(a), 30);
        assert_eq!(pool.allocated(a) + pool.pool_remaining(), pool.pool_size());
    }

    #[test]
    fn detach_returns_all_held_credit_to_the_pool() {
        let pool = pool(100, 10, 1, 1);
        let a = pool.attach();
        pool.on_stats_tick();
        pool.request_growth(a, 50);
        pool.detach(a);
        assert_eq!(pool.pool_remaining(), pool.pool_size());
    }

    #[test]
    fn too_many_connections_yields_zero_balanced_window() {
        let pool = pool(10, 1, 1, 1);
        for _ in 0..20 {
            pool.attach();
        }
        pool.on_stats_tick();
        assert_eq!(pool.balanced_window(), 0);
        let a = pool.attach();
        assert_eq!(pool.request_growth(a, 5), 0, "zero balanced window grants nothing");
    }

    #[test]
    fn init_rounds_pool_size_up_to_a_multiple_of_max_connections() {
        let pool = pool(101, 10, 1, 1);
        assert_eq!(pool.pool_size(), 110);
    }

    #[test]
    fn conservation_invariant_holds_after_a_sequence_of_operations() {
        let pool = pool(120, 10, 1, 1);
        let ids: Vec<_> = (0..5).map(|_| pool.attach()).collect();
        pool.on_stats_tick();
        for &id in &ids {
            pool.request_growth(id, 7);
        }
        pool.release(ids[0], 3);
        pool.detach(ids[1]);

        let in_use: u64 = ids.iter().filter(|&&id| id != ids[1]).map(|&id| pool.allocated(id)).sum();
        assert_eq!(in_use + pool.pool_remaining(), pool.pool_size());
    }
}
