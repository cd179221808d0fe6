// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The AF_SOCKET source driver (§4.5): connection lifecycle, admission
//! control, and keep-alive reload handoff. Wire framing is delegated to a
//! [`ConnectionReader`] the caller supplies.
//!
//! **Reload handoff.** The spec's C implementation stores the listen fd as
//! `fd+1` in a generic persistent-state table (zero meaning absent) because
//! its persist-store only speaks integers and opaque blobs. This crate's
//! [`flowlog_core::PersistStore`] is already a type-erased `Any` store, so
//! the idiomatic realization hands off the owned [`StreamListener`] object
//! itself under `<persist_name>.listen_fd` rather than a duplicated raw
//! descriptor -- same effect (the new generation reclaims the bound socket
//! without rebinding), no raw fd arithmetic.

use crate::error::SourceError;
use crate::hosts_access::HostsAccess;
use crate::reader::ConnectionReader;
use crate::state::{ConnectionState, DriverState};
use crate::transport::{DatagramSocket, PeerAddr, StreamListener};
use flowlog_core::PersistStore;
use flowlog_stats::{ClusterKey, Counter, CounterType, StatsRegistry};
use flowlog_window::{ConnectionId, DynamicWindowPool};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const COUNTER_NUM_CONNECTIONS: CounterType = CounterType("num_connections");
const COUNTER_REJECTED_CONNECTIONS: CounterType = CounterType("rejected_connections_total");

/// Options controlling admission and keep-alive behavior (§4.5, §6).
#[derive(Debug, Clone)]
pub struct SourceDriverOptions {
    pub max_connections: u64,
    /// §6 `listen-backlog`, consumed by the caller at bind time; retained
    /// here only for observability/reload bookkeeping.
    pub listen_backlog: u32,
    pub keep_alive: bool,
    /// Stable persist name this driver's reloadable state is stored under
    /// (§6 "Persistent-state entries").
    pub persist_name: String,
    pub stats_level: u8,
}

struct ConnectionEntry {
    peer: PeerAddr,
    state: ConnectionState,
    window_id: Option<ConnectionId>,
}

/// One accept-loop-driven AF_SOCKET stream source (§4.5 "Stream sockets").
pub struct StreamSourceDriver<R: ConnectionReader + 'static> {
    listener: Mutex<Option<Arc<StreamListener>>>,
    state: Mutex<DriverState>,
    connections: Mutex<HashMap<u64, ConnectionEntry>>,
    next_conn_id: AtomicU64,
    options: SourceDriverOptions,
    window_pool: Option<Arc<DynamicWindowPool>>,
    hosts_access: Arc<dyn HostsAccess>,
    reader: Arc<R>,
    num_connections: Counter,
    rejected_connections_total: Counter,
}

impl<R: ConnectionReader + 'static> StreamSourceDriver<R> {
    /// Bind a fresh listener, or fail. Use [`Self::reclaim`] instead when
    /// `keep_alive` reload handoff may have a listener already waiting in
    /// the persist store.
    pub fn new(
        listener: StreamListener,
        options: SourceDriverOptions,
        reader: Arc<R>,
        window_pool: Option<Arc<DynamicWindowPool>>,
        hosts_access: Arc<dyn HostsAccess>,
        registry: &StatsRegistry,
    ) -> Self {
        let key = ClusterKey::new(options.persist_name.clone());
        let num_connections = registry.register_counter(options.stats_level, key.clone(), COUNTER_NUM_CONNECTIONS);
        let rejected_connections_total =
            registry.register_counter(options.stats_level, key, COUNTER_REJECTED_CONNECTIONS);
        StreamSourceDriver {
            listener: Mutex::new(Some(Arc::new(listener))),
            state: Mutex::new(DriverState::Bound),
            connections: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            options,
            window_pool,
            hosts_access,
            reader,
            num_connections,
            rejected_connections_total,
        }
    }

    /// Reclaim a previously handed-off listener from the persist store
    /// (§4.5 "Reload"), falling back to `fresh` if nothing was stored.
    pub fn reclaim_or(
        persist: &dyn PersistStore,
        options: SourceDriverOptions,
        fresh: StreamListener,
        reader: Arc<R>,
        window_pool: Option<Arc<DynamicWindowPool>>,
        hosts_access: Arc<dyn HostsAccess>,
        registry: &StatsRegistry,
    ) -> Self {
        let key = format!("{}.listen_fd", options.persist_name);
        let reclaimed = persist.take(&key).and_then(|boxed| boxed.downcast::<Arc<StreamListener>>().ok());
        let driver = Self::new(fresh, options, reader, window_pool, hosts_access, registry);
        if let Some(listener) = reclaimed {
            *driver.listener.lock() = Some(*listener);
        }
        driver
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock()
    }

    pub fn active_connections(&self) -> u64 {
        self.connections.lock().len() as u64
    }

    /// Accept up to 30 connections (§4.5's accept-loop bound), applying
    /// admission control and `hosts_access` to each. Called when the event
    /// loop observes the listen socket readable; drains up to 30 already-
    /// pending connections without blocking for more once the backlog is
    /// exhausted. Returns the number of connections actually accepted
    /// (admitted or not) this wakeup.
    pub async fn accept_wakeup(self: &Arc<Self>) -> usize {
        const MAX_ACCEPTS_PER_WAKEUP: usize = 30;
        const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(20);
        *self.state.lock() = DriverState::Accepting;

        let mut accepted = 0;
        for _ in 0..MAX_ACCEPTS_PER_WAKEUP {
            let listener = match self.listener.lock().clone() {
                Some(listener) => listener,
                None => break,
            };
            let (conn, peer) = match tokio::time::timeout(DRAIN_TIMEOUT, listener.accept()).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(err)) => {
                    tracing::warn!(%err, "accept failed");
                    break;
                }
                Err(_elapsed) => break,
            };
            accepted += 1;
            self.admit(conn, peer);
        }

        *self.state.lock() = if self.active_connections() >= self.options.max_connections {
            DriverState::Full
        } else {
            DriverState::Listening
        };
        accepted
    }

    fn admit(self: &Arc<Self>, conn: crate::transport::StreamConn, peer: PeerAddr) {
        if self.active_connections() >= self.options.max_connections {
            self.rejected_connections_total.inc();
            tracing::info!(%peer, "rejecting connection: max_connections reached");
            return;
        }
        if !self.hosts_access.allowed(&peer) {
            self.rejected_connections_total.inc();
            tracing::info!(%peer, "rejecting connection: denied by hosts_access");
            return;
        }

        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let window_id = self.window_pool.as_ref().map(|pool| pool.attach());
        self.connections
            .lock()
            .insert(id, ConnectionEntry { peer: peer.clone(), state: ConnectionState::Open, window_id });
        self.num_connections.inc();

        let driver = Arc::clone(self);
        let reader = Arc::clone(&self.reader);
        tokio::spawn(async move {
            driver.set_connection_state(id, ConnectionState::Reading);
            let result = reader.run_stream(conn, peer).await;
            driver.close_connection(id, result.is_err());
        });
    }

    fn set_connection_state(&self, id: u64, state: ConnectionState) {
        if let Some(entry) = self.connections.lock().get_mut(&id) {
            entry.state = state;
        }
    }

    fn close_connection(&self, id: u64, errored: bool) {
        let removed = self.connections.lock().remove(&id);
        if let Some(entry) = removed {
            if let (Some(pool), Some(window_id)) = (&self.window_pool, entry.window_id) {
                pool.detach(window_id);
            }
        }
        self.num_connections.dec();
        if errored {
            tracing::debug!(connection = id, "connection closed with error");
        }
    }

    /// Hand the listener, connection list, and window pool off for a
    /// keep-alive reload (§4.5 "Reload"). No-op if `keep_alive` is off.
    pub fn prepare_for_reload(&self, persist: &dyn PersistStore) {
        if !self.options.keep_alive {
            return;
        }
        if let Some(listener) = self.listener.lock().take() {
            persist.put(&format!("{}.listen_fd", self.options.persist_name), Box::new(listener));
        }
        // `listener` is stored as `Arc<StreamListener>`; `reclaim_or` downcasts
        // to that same type.
        // The connection list and dynamic-window pool are deliberately left
        // for the new generation's driver to fetch by the same persist
        // name on its own init (§4.5); this crate's responsibility ends at
        // handing the listener back.
    }
}

/// A single pseudo-connection datagram source (§4.5 "Datagram sockets").
pub struct DatagramSourceDriver<R: ConnectionReader + 'static> {
    socket: Arc<DatagramSocket>,
    reader: Arc<R>,
}

impl<R: ConnectionReader + 'static> DatagramSourceDriver<R> {
    pub fn new(socket: DatagramSocket, reader: Arc<R>) -> Self {
        DatagramSourceDriver { socket: Arc::new(socket), reader }
    }

    /// Run the single pseudo-connection until it errors. There is no
    /// accept loop and no admission control for datagram sockets.
    pub async fn run(&self) -> std::io::Result<()> {
        self.reader.run_datagram(&self.socket).await
    }

    pub fn socket(&self) -> Arc<DatagramSocket> {
        Arc::clone(&self.socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts_access::AllowAll;
    use crate::transport::StreamConn;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    struct CountingReader {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionReader for CountingReader {
        async fn run_stream(&self, _io: StreamConn, _peer: PeerAddr) -> std::io::Result<()> {
            self.runs.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        async fn run_datagram(&self, _io: &DatagramSocket) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn options(max_connections: u64) -> SourceDriverOptions {
        SourceDriverOptions {
            max_connections,
            listen_backlog: 255,
            keep_alive: true,
            persist_name: "test.source".to_string(),
            stats_level: 0,
        }
    }

    #[tokio::test]
    async fn admits_connections_up_to_max_connections_then_rejects() {
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = tcp.local_addr().unwrap();
        let registry = StatsRegistry::new(3, 0);
        let reader = Arc::new(CountingReader { runs: AtomicUsize::new(0) });
        let driver = Arc::new(StreamSourceDriver::new(
            StreamListener::Tcp(tcp),
            options(1),
            Arc::clone(&reader),
            None,
            Arc::new(AllowAll),
            &registry,
        ));

        let d = Arc::clone(&driver);
        let accept_task = tokio::spawn(async move { d.accept_wakeup().await });

        let _client_a = tokio::net::TcpStream::connect(addr).await.unwrap();
        let _client_b = tokio::net::TcpStream::connect(addr).await.unwrap();
        // Give the accept loop a moment to process both connection attempts.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let accepted = accept_task.await.unwrap();
        assert_eq!(accepted, 2, "both connection attempts reach accept()");
        assert_eq!(driver.rejected_connections_total.get(), 1, "second connection exceeds max_connections");
    }

    #[tokio::test]
    async fn hosts_access_denial_rejects_without_admitting() {
        struct DenyAll;
        impl HostsAccess for DenyAll {
            fn allowed(&self, _peer: &PeerAddr) -> bool {
                false
            }
        }

        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = tcp.local_addr().unwrap();
        let registry = StatsRegistry::new(3, 0);
        let reader = Arc::new(CountingReader { runs: AtomicUsize::new(0) });
        let driver = Arc::new(StreamSourceDriver::new(
            StreamListener::Tcp(tcp),
            options(10),
            Arc::clone(&reader),
            None,
            Arc::new(DenyAll),
            &registry,
        ));

        let d = Arc::clone(&driver);
        let accept_task = tokio::spawn(async move { d.accept_wakeup().await });
        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        accept_task.await.unwrap();

        assert_eq!(driver.active_connections(), 0);
        assert_eq!(driver.rejected_connections_total.get(), 1);
    }

    #[test]
    fn prepare_for_reload_hands_listener_to_persist_store() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let registry = StatsRegistry::new(3, 0);
            let reader = Arc::new(CountingReader { runs: AtomicUsize::new(0) });
            let driver = StreamSourceDriver::new(
                StreamListener::Tcp(tcp),
                options(10),
                reader,
                None,
                Arc::new(AllowAll),
                &registry,
            );
            let persist = flowlog_core::InMemoryPersistStore::new();
            driver.prepare_for_reload(&persist);
            assert!(persist.contains("test.source.listen_fd"));
            assert!(driver.listener.lock().is_none());
        });
    }
}
