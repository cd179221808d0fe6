// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob-pattern queries over the registry (§4.1 "Query layer", §6 STATS/QUERY).

use crate::cluster::CounterType;
use crate::key::ClusterKey;
use crate::registry::StatsRegistry;
use std::sync::atomic::AtomicBool;

/// One row of a query result: the cluster's query key, the counter type,
/// and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub key: String,
    pub counter: CounterType,
    pub value: i64,
}

/// `*`/`?` glob match against a cluster's [`ClusterKey::query_key`], the
/// same matching the control socket's QUERY command exposes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    glob_match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn glob_match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match_bytes(&pattern[1..], text)
                || (!text.is_empty() && glob_match_bytes(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match_bytes(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match_bytes(&pattern[1..], &text[1..]),
        _ => false,
    }
}

/// List every `(key, counter, value)` row whose query key matches `pattern`.
pub fn list(registry: &StatsRegistry, pattern: &str) -> Vec<QueryRow> {
    let mut rows = Vec::new();
    let cancel = AtomicBool::new(false);
    registry.foreach_counter(&cancel, |cluster, ty, counter| {
        let key = cluster.key.query_key();
        if glob_match(pattern, &key) {
            rows.push(QueryRow { key: key.clone(), counter: ty, value: counter.get() });
        }
    });
    rows
}

/// `get`: single exact-key, single-counter-type lookup.
pub fn get(registry: &StatsRegistry, key: &ClusterKey, ty: CounterType) -> Option<i64> {
    let mut found = None;
    let cancel = AtomicBool::new(false);
    registry.foreach_counter(&cancel, |cluster, cty, counter| {
        if found.is_none() && cty == ty && &cluster.key == key {
            found = Some(counter.get());
        }
    });
    found
}

/// Sum of every counter matching `pattern`, excluding `stamp` counters
/// (§4.1: timestamps are not meaningfully additive).
pub fn get_sum(registry: &StatsRegistry, pattern: &str) -> i64 {
    list(registry, pattern).into_iter().filter(|r| !r.counter.is_timestamp()).map(|r| r.value).sum()
}
