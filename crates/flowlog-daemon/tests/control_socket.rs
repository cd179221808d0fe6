// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests driving the control socket over a real `UnixStream`,
//! since this crate has no CLI surface to black-box otherwise (§8).

use std::sync::Arc;

use flowlog_control::LogFlags;
use flowlog_daemon::DaemonActions;
use flowlog_stats::{ClusterKey, CounterType, StatsRegistry};
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{watch, Notify};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn spawn_control_socket(registry: Arc<StatsRegistry>) -> (std::path::PathBuf, watch::Sender<bool>) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("control.sock");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (watch_tx, _watch_rx) = watch::channel(false);
    let actions = Arc::new(DaemonActions::new(watch_tx, Arc::new(Notify::new())));

    let serve_path = path.clone();
    tokio::spawn(async move {
        flowlog_control::socket::serve(&serve_path, registry, Arc::new(LogFlags::new()), actions, shutdown_rx).await
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // Keep the temp directory alive for the socket's lifetime by leaking it;
    // the OS cleans up `/tmp` eventually and the test process is short-lived.
    std::mem::forget(dir);
    (path, shutdown_tx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stats_command_reports_registered_counters() {
    let registry = Arc::new(StatsRegistry::new(3, 0));
    registry.register_counter(0, ClusterKey::new("center"), CounterType::PROCESSED).add(5);
    let (path, shutdown_tx) = spawn_control_socket(Arc::clone(&registry)).await;

    let mut client = UnixStream::connect(&path).await.unwrap();
    client.write_all(b"STATS\n").await.unwrap();

    let mut reader = BufReader::new(&mut client);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.contains("center;;;a;processed;5"), "unexpected STATS row: {line}");

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn reset_stats_zeroes_a_live_counter() {
    let registry = Arc::new(StatsRegistry::new(3, 0));
    let counter = registry.register_counter(0, ClusterKey::new("center"), CounterType::PROCESSED);
    counter.add(10);
    let (path, shutdown_tx) = spawn_control_socket(Arc::clone(&registry)).await;

    let mut client = UnixStream::connect(&path).await.unwrap();
    client.write_all(b"RESET_STATS\n").await.unwrap();
    let mut reader = BufReader::new(&mut client);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line.trim(), "OK");
    assert_eq!(counter.get(), 0);

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn unknown_command_gets_an_error_reply() {
    let registry = Arc::new(StatsRegistry::new(3, 0));
    let (path, shutdown_tx) = spawn_control_socket(registry).await;

    let mut client = UnixStream::connect(&path).await.unwrap();
    client.write_all(b"BOGUS\n").await.unwrap();
    let mut reader = BufReader::new(&mut client);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("ERROR"));

    let _ = shutdown_tx.send(true);
}
