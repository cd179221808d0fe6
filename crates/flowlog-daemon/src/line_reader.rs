// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A line-oriented [`ConnectionReader`] (§4.5 supplement): one message per
//! newline-terminated line, carried as the `MESSAGE` value. Wire framing
//! beyond this is out of scope (§1 excludes protocol codecs); a production
//! wire protocol would implement this trait the same way.

use async_trait::async_trait;
use flowlog_core::priority::{Facility, Severity};
use flowlog_core::{LogMessage, LogMessageData, LogValue, Priority, SourceAddr};
use flowlog_source::{ConnectionReader, DatagramSocket, PeerAddr, StreamConn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

pub struct LineSourceReader {
    sender: mpsc::Sender<LogMessage>,
}

impl LineSourceReader {
    pub fn new(sender: mpsc::Sender<LogMessage>) -> Self {
        LineSourceReader { sender }
    }

    fn make_message(peer: &PeerAddr, line: &str) -> LogMessage {
        let source_addr = match peer {
            PeerAddr::Ip(addr) => SourceAddr::Ip(addr.ip()),
            PeerAddr::UnixPath(_) => SourceAddr::Unix,
            PeerAddr::Unspecified => SourceAddr::Unspecified,
        };
        let mut data = LogMessageData::new(Priority::new(Facility::USER, Severity::NOTICE), source_addr);
        data.values.insert("MESSAGE".to_string(), LogValue::string(line.to_string()));
        LogMessage::new(data)
    }
}

#[async_trait]
impl ConnectionReader for LineSourceReader {
    async fn run_stream(&self, io: StreamConn, peer: PeerAddr) -> std::io::Result<()> {
        match io {
            StreamConn::Tcp(stream) => self.read_lines(stream, &peer).await,
            StreamConn::Unix(stream) => self.read_lines(stream, &peer).await,
        }
    }

    async fn run_datagram(&self, io: &DatagramSocket) -> std::io::Result<()> {
        let DatagramSocket::Udp(socket) = io;
        let mut buf = vec![0u8; 65_536];
        loop {
            let (n, addr) = socket.recv_from(&mut buf).await?;
            let text = String::from_utf8_lossy(&buf[..n]);
            let msg = Self::make_message(&PeerAddr::Ip(addr), text.trim_end());
            if self.sender.send(msg).await.is_err() {
                return Ok(());
            }
        }
    }
}

impl LineSourceReader {
    async fn read_lines<S: AsyncReadExt + Unpin>(&self, io: S, peer: &PeerAddr) -> std::io::Result<()> {
        let mut lines = BufReader::new(io).lines();
        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                continue;
            }
            let msg = Self::make_message(peer, &line);
            if self.sender.send(msg).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn each_line_becomes_one_message_carrying_the_text() {
        let (tx, mut rx) = mpsc::channel(8);
        let reader = LineSourceReader::new(tx);
        let (mut client, server) = duplex(1024);

        let peer = PeerAddr::Unspecified;
        let handle = tokio::spawn(async move { reader.read_lines(server, &peer).await });

        client.write_all(b"first\nsecond\n").await.unwrap();
        drop(client);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.value("MESSAGE").unwrap().as_str(), "first");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.value("MESSAGE").unwrap().as_str(), "second");
        assert!(rx.recv().await.is_none());
        handle.await.unwrap().unwrap();
    }
}
