// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shared metrics registry: counter clusters, registration, glob queries,
//! aggregation, and export (§4.1).

pub mod aggregator;
pub mod cluster;
pub mod counter;
pub mod export;
pub mod key;
pub mod query;
pub mod registry;

pub use cluster::{Cluster, CounterFormatting, CounterType, FrameOfReference, Unit};
pub use counter::Counter;
pub use key::{ClusterKey, LegacyComponent, LegacyKey};
pub use query::QueryRow;
pub use registry::StatsRegistry;
