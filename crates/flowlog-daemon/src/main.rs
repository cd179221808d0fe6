// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowlogd entrypoint: loads config, starts the control socket, the HTTP
//! scrape endpoint, and the source-to-destination pipeline, then waits for
//! SIGTERM/SIGINT or a control-socket `STOP` before shutting down (§6).

use std::path::PathBuf;
use std::sync::Arc;

use flowlog_control::{ExportFormat as ControlExportFormat, LogFlags, ScrapeOptions, ScrapeServer};
use flowlog_daemon::config::ScrapeFormat;
use flowlog_daemon::{Config, DaemonActions, DaemonError, Pipeline};
use flowlog_stats::StatsRegistry;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, Notify};

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let _log_guard = flowlog_daemon::logging::setup_logging(config.log_path.as_deref())?;
    tracing::info!(?config_path, "starting flowlogd");

    let registry = Arc::new(StatsRegistry::new(config.stats.level, config.stats.max_dynamic));
    let persist = flowlog_daemon::pipeline::fresh_persist_store();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reload_notify = Arc::new(Notify::new());
    let actions = Arc::new(DaemonActions::new(shutdown_tx.clone(), Arc::clone(&reload_notify)));

    // Configuration reload (new graph built in parallel, swap at a barrier,
    // drain the old -- spec §9) is out of scope here; a `RELOAD` only logs.
    let reload_watch_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut shutdown = reload_watch_shutdown;
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = reload_notify.notified() => {
                    tracing::warn!("RELOAD requested but configuration reload is not implemented");
                }
            }
        }
    });

    let control_socket_path = config.control.socket_path.clone();
    let control_registry = Arc::clone(&registry);
    let control_shutdown = shutdown_rx.clone();
    let control_handle = tokio::spawn(async move {
        flowlog_control::socket::serve(
            &control_socket_path,
            control_registry,
            Arc::new(LogFlags::new()),
            actions,
            control_shutdown,
        )
        .await
    });

    let scrape_addr = config
        .scrape
        .bind_addr
        .parse()
        .map_err(|err| DaemonError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
    let scrape_server = Arc::new(ScrapeServer::new(
        Arc::clone(&registry),
        ScrapeOptions {
            path_pattern: config.scrape.path_pattern.clone(),
            format: match config.scrape.format {
                ScrapeFormat::Prometheus => ControlExportFormat::Prometheus,
                ScrapeFormat::Csv => ControlExportFormat::Csv,
                ScrapeFormat::Kv => ControlExportFormat::Kv,
            },
            scrape_freq_limit: config.scrape.freq_limit(),
            single_instance: config.scrape.single_instance,
        },
    ));
    let scrape_handle = tokio::spawn(scrape_server.serve(scrape_addr, shutdown_rx.clone()));

    let pipeline = Pipeline::start(&config, Arc::clone(&registry), Arc::clone(&persist), shutdown_rx.clone()).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
        changed = wait_for_stop(shutdown_tx.subscribe()) => {
            if changed {
                tracing::info!("stopped via control socket");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    pipeline.join().await;
    let _ = control_handle.await;
    let _ = scrape_handle.await;
    tracing::info!("flowlogd shut down");
    Ok(())
}

/// Waits until the shutdown watch is flipped by a control-socket `STOP`.
/// Returns `false` if the sender side is dropped first (process exiting via
/// a signal instead).
async fn wait_for_stop(mut rx: watch::Receiver<bool>) -> bool {
    loop {
        if *rx.borrow() {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}
