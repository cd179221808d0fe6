// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A line-oriented file [`DestinationWorker`] (§4.6 supplement): one worker
//! appends each message's `MESSAGE` value as a line, demonstrating the
//! trait-injection seam the library crate leaves for callers to fill with
//! their own wire protocol.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use flowlog_core::LogMessage;
use flowlog_dest::{DestinationWorker, FlushMode, InsertResult};
use parking_lot::Mutex;

pub struct FileSinkWorker {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSinkWorker {
    pub fn new(path: PathBuf) -> Self {
        FileSinkWorker { path, writer: Mutex::new(None) }
    }
}

#[async_trait]
impl DestinationWorker for FileSinkWorker {
    async fn connect(&self) -> bool {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => {
                *self.writer.lock() = Some(BufWriter::new(file));
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "failed to open sink file");
                false
            }
        }
    }

    async fn disconnect(&self) {
        if let Some(mut writer) = self.writer.lock().take() {
            let _ = writer.flush();
        }
    }

    async fn insert(&self, msg: &LogMessage) -> InsertResult {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return InsertResult::NotConnected;
        };
        let line = msg.value("MESSAGE").map(|v| v.as_str().into_owned()).unwrap_or_default();
        match writeln!(writer, "{line}") {
            Ok(()) => InsertResult::Success,
            Err(err) => {
                tracing::warn!(%err, "sink write failed");
                InsertResult::Error
            }
        }
    }

    async fn flush(&self, _mode: FlushMode) -> InsertResult {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return InsertResult::NotConnected;
        };
        match writer.flush() {
            Ok(()) => InsertResult::Success,
            Err(err) => {
                tracing::warn!(%err, "sink flush failed");
                InsertResult::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_core::priority::{Facility, Severity};
    use flowlog_core::{LogMessageData, LogValue, Priority, SourceAddr};
    use tempfile::tempdir;

    fn msg_with_message(text: &str) -> LogMessage {
        let mut data = LogMessageData::new(Priority::new(Facility::USER, Severity::DEBUG), SourceAddr::Unspecified);
        data.values.insert("MESSAGE".to_string(), LogValue::string(text));
        LogMessage::new(data)
    }

    #[tokio::test]
    async fn insert_appends_a_line_and_flush_persists_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        let worker = FileSinkWorker::new(path.clone());
        assert!(worker.connect().await);
        assert_eq!(worker.insert(&msg_with_message("hello")).await, InsertResult::Success);
        assert_eq!(worker.flush(FlushMode::Normal).await, InsertResult::Success);
        worker.disconnect().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[tokio::test]
    async fn insert_before_connect_is_not_connected() {
        let dir = tempdir().unwrap();
        let worker = FileSinkWorker::new(dir.path().join("out.log"));
        assert_eq!(worker.insert(&msg_with_message("x")).await, InsertResult::NotConnected);
    }
}
