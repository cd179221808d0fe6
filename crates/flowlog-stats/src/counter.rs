// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Individual counters (§4.1, §9).
//!
//! A counter is either owned by the registry (`Owned`), borrowed from
//! storage the caller owns (`External`/`Alias`), or a `Null` sink handed
//! out when a registration is gated out by level or refused by the
//! dynamic-cluster cap. Mutation of the backing atomic is lockless; only
//! cluster lookup/creation takes the registry lock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Owned,
    External,
    Null,
}

/// A single counter handle. Cheap to clone (shares the backing atomic).
#[derive(Debug, Clone)]
pub struct Counter {
    storage: Storage,
    value: Arc<AtomicI64>,
}

impl Counter {
    pub(crate) fn owned() -> Self {
        Counter { storage: Storage::Owned, value: Arc::new(AtomicI64::new(0)) }
    }

    pub(crate) fn external(value: Arc<AtomicI64>) -> Self {
        Counter { storage: Storage::External, value }
    }

    pub fn null() -> Self {
        Counter { storage: Storage::Null, value: Arc::new(AtomicI64::new(0)) }
    }

    pub fn is_null(&self) -> bool {
        self.storage == Storage::Null
    }

    pub fn is_external(&self) -> bool {
        self.storage == Storage::External
    }

    /// Shares this counter's backing storage -- used by `register_alias_counter`.
    pub(crate) fn storage_handle(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.value)
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn dec(&self) {
        self.add(-1);
    }

    // External counters are only ever created internally from storage the
    // registry itself hands out (`register_external_counter`/`register_alias_counter`);
    // a write reaching here is a bug in this crate, not caller-reachable
    // user error, so it stays a panic rather than a `Result`.
    #[allow(clippy::panic)]
    pub fn add(&self, delta: i64) {
        match self.storage {
            Storage::Owned => {
                self.value.fetch_add(delta, Ordering::Relaxed);
            }
            Storage::Null => {}
            Storage::External => {
                panic!("programming error: attempted to mutate an external/alias counter through the registry")
            }
        }
    }

    #[allow(clippy::panic)]
    pub fn set(&self, new_value: i64) {
        match self.storage {
            Storage::Owned => self.value.store(new_value, Ordering::Relaxed),
            Storage::Null => {}
            Storage::External => {
                panic!("programming error: attempted to mutate an external/alias counter through the registry")
            }
        }
    }

    pub fn get(&self) -> i64 {
        match self.storage {
            Storage::Null => 0,
            Storage::Owned | Storage::External => self.value.load(Ordering::Relaxed),
        }
    }
}
