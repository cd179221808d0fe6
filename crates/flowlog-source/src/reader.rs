// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-connection reader hook (§3 "AF_SOCKET source connection": "a
//! reader bound to the fd"). Wire framing and message parsing are named in
//! §1 as an excluded protocol codec concern; callers implement
//! [`ConnectionReader`] for whatever protocol they speak, mirroring the
//! destination driver's `DestinationWorker` trait-injection pattern
//! (§4.6 supplement).

use crate::transport::{DatagramSocket, PeerAddr, StreamConn};
use async_trait::async_trait;

/// Drives one live connection until it closes or errors. For a stream
/// connection this owns `io` exclusively; for a datagram socket every
/// reader shares the one underlying socket (there is only ever one
/// pseudo-connection).
#[async_trait]
pub trait ConnectionReader: Send + Sync {
    async fn run_stream(&self, io: StreamConn, peer: PeerAddr) -> std::io::Result<()>;
    async fn run_datagram(&self, io: &DatagramSocket) -> std::io::Result<()>;
}
