// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control socket (§6): a `UnixListener` accepting one connection per
//! command, line-oriented, UTF-8.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

use crate::command::{process_line, ControlActions};
use crate::error::ControlError;
use crate::logflags::LogFlags;
use flowlog_stats::StatsRegistry;

/// Accept loop. Binds `path` (removing a stale socket file first, the same
/// as the teacher's listener setup), and serves connections until `shutdown`
/// reports true.
pub async fn serve(
    path: &Path,
    registry: Arc<StatsRegistry>,
    log_flags: Arc<LogFlags>,
    actions: Arc<dyn ControlActions>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ControlError> {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path).map_err(ControlError::Bind)?;
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let registry = Arc::clone(&registry);
                let log_flags = Arc::clone(&log_flags);
                let actions = Arc::clone(&actions);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, &registry, &log_flags, actions.as_ref()).await {
                        tracing::warn!(%err, "control connection error");
                    }
                });
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    registry: &StatsRegistry,
    log_flags: &LogFlags,
    actions: &dyn ControlActions,
) -> Result<(), ControlError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = process_line(&line, registry, log_flags, actions);
        writer.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ControlActions;
    use flowlog_stats::{ClusterKey, CounterType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
    use tokio::net::UnixStream as ClientStream;

    struct NoopActions;
    impl ControlActions for NoopActions {
        fn request_stop(&self) {}
        fn request_reload(&self) {}
    }

    #[tokio::test]
    async fn stats_round_trips_over_the_socket() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let registry = Arc::new(StatsRegistry::new(3, 0));
        registry.register_counter(0, ClusterKey::new("src"), CounterType::PROCESSED).add(2);
        let (tx, rx) = watch::channel(false);
        let server_path = path.clone();
        let server_registry = Arc::clone(&registry);
        let handle = tokio::spawn(async move {
            serve(&server_path, server_registry, Arc::new(LogFlags::new()), Arc::new(NoopActions), rx).await
        });

        // let the listener bind before we connect.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let mut client = ClientStream::connect(&path).await.unwrap();
        client.write_all(b"STATS\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("src;;;a;processed;2"));
        assert!(text.ends_with("\n\n"));

        let _ = tx.send(true);
        let _ = handle.await;
    }
}
