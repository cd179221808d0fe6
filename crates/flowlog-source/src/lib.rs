// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowlog-source: the AF_SOCKET source driver (§4.5) -- listener admission
//! control, connection lifecycle, keep-alive reload handoff, and the
//! optional `SO_MEMINFO`-style drop/buffer observability timer.

pub mod driver;
pub mod error;
pub mod hosts_access;
pub mod meminfo;
pub mod reader;
pub mod state;
pub mod transport;

pub use driver::{DatagramSourceDriver, SourceDriverOptions, StreamSourceDriver};
pub use error::SourceError;
pub use hosts_access::{AllowAll, HostsAccess};
pub use meminfo::{MemInfoWatcher, SocketMemInfo, SocketMemInfoProbe, UnsupportedProbe};
pub use reader::ConnectionReader;
pub use state::{ConnectionState, DriverState};
pub use transport::{DatagramSocket, PeerAddr, StreamConn, StreamListener};
