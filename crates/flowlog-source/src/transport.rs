// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream vs. datagram transport (§4.5 "Stream sockets"/"Datagram sockets"):
//! a stream listener runs an accept loop producing one connection per
//! peer; a datagram socket is a single pseudo-connection for its whole
//! lifetime. Modeled as plain enums rather than a shared trait object since
//! the two only meet at the driver layer, which already branches on kind.

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

/// Where a connection (or, for datagram sockets, the bind address) came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    Ip(SocketAddr),
    UnixPath(Option<PathBuf>),
    Unspecified,
}

impl std::fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerAddr::Ip(addr) => write!(f, "{addr}"),
            PeerAddr::UnixPath(Some(path)) => write!(f, "unix:{}", path.display()),
            PeerAddr::UnixPath(None) => write!(f, "unix:<unnamed>"),
            PeerAddr::Unspecified => write!(f, "<unspecified>"),
        }
    }
}

/// A bound listen socket accepting new stream connections.
pub enum StreamListener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// One accepted stream connection's I/O handle.
pub enum StreamConn {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl StreamListener {
    pub async fn accept(&self) -> std::io::Result<(StreamConn, PeerAddr)> {
        match self {
            StreamListener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((StreamConn::Tcp(stream), PeerAddr::Ip(addr)))
            }
            StreamListener::Unix(listener) => {
                let (stream, addr) = listener.accept().await?;
                let path = addr.as_pathname().map(|p| p.to_path_buf());
                Ok((StreamConn::Unix(stream), PeerAddr::UnixPath(path)))
            }
        }
    }
}

/// A bound datagram socket, treated as a single pseudo-connection for its
/// whole lifetime (§4.5 "Datagram sockets").
pub enum DatagramSocket {
    Udp(tokio::net::UdpSocket),
}
