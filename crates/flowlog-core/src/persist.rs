// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persist-store collaborator (§9 "Configuration object lifecycle"):
//! objects that must survive a configuration reload (disk queues, listen
//! fds, connection lists, dynamic-window pools, sequence numbers) are
//! handed off through this trait, keyed by a stable "persist name" (§6,
//! glossary). The on-disk file format backing it is explicitly out of
//! scope (§1); this crate only fixes the in-memory handoff contract a
//! reload needs, per SPEC_FULL §0.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Stores arbitrary `Send + Sync` objects under a stable string key so a
/// new configuration generation can fetch back what the previous
/// generation stashed before it was torn down.
pub trait PersistStore: Send + Sync {
    fn put(&self, key: &str, value: Box<dyn Any + Send + Sync>);
    fn take(&self, key: &str) -> Option<Box<dyn Any + Send + Sync>>;
    fn contains(&self, key: &str) -> bool;
}

/// An in-process persist-store good enough to exercise reload semantics
/// within a single running daemon; no on-disk representation (§1 excludes
/// the persistent-state file format).
#[derive(Default)]
pub struct InMemoryPersistStore {
    entries: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl InMemoryPersistStore {
    pub fn new() -> Self {
        InMemoryPersistStore::default()
    }

    pub fn shared() -> Arc<dyn PersistStore> {
        Arc::new(InMemoryPersistStore::new())
    }
}

impl PersistStore for InMemoryPersistStore {
    fn put(&self, key: &str, value: Box<dyn Any + Send + Sync>) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn take(&self, key: &str) -> Option<Box<dyn Any + Send + Sync>> {
        self.entries.lock().remove(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}
