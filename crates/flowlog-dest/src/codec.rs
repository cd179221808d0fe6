// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire encoding for a [`crate::queue::QueueItem`] stored in a
//! [`flowlog_diskqueue::DiskQueue`] (§4.3's generic `serialize`/`deserialize`
//! codec, specialized here to this workspace's message type).

use flowlog_core::{LogMessage, LogMessageData, LogValue, PathOptions, Priority, SourceAddr, TagSet, ValueType};
use flowlog_diskqueue::{DiskQueueError, MessageCodec};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::queue::QueueItem;

#[derive(Serialize, Deserialize)]
enum WireValueType {
    String,
    Integer,
    Double,
    Boolean,
    DateTime,
    Json,
    List,
    Null,
    Bytes,
    Protobuf,
}

impl From<ValueType> for WireValueType {
    fn from(t: ValueType) -> Self {
        match t {
            ValueType::String => WireValueType::String,
            ValueType::Integer => WireValueType::Integer,
            ValueType::Double => WireValueType::Double,
            ValueType::Boolean => WireValueType::Boolean,
            ValueType::DateTime => WireValueType::DateTime,
            ValueType::Json => WireValueType::Json,
            ValueType::List => WireValueType::List,
            ValueType::Null => WireValueType::Null,
            ValueType::Bytes => WireValueType::Bytes,
            ValueType::Protobuf => WireValueType::Protobuf,
        }
    }
}

impl From<WireValueType> for ValueType {
    fn from(t: WireValueType) -> Self {
        match t {
            WireValueType::String => ValueType::String,
            WireValueType::Integer => ValueType::Integer,
            WireValueType::Double => ValueType::Double,
            WireValueType::Boolean => ValueType::Boolean,
            WireValueType::DateTime => ValueType::DateTime,
            WireValueType::Json => ValueType::Json,
            WireValueType::List => ValueType::List,
            WireValueType::Null => ValueType::Null,
            WireValueType::Bytes => ValueType::Bytes,
            WireValueType::Protobuf => ValueType::Protobuf,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireValue {
    bytes: Vec<u8>,
    value_type: WireValueType,
}

#[derive(Serialize, Deserialize)]
enum WireSourceAddr {
    Ip(IpAddr),
    Unix,
    Unspecified,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    priority: u16,
    timestamp_recv_ms: u64,
    timestamp_stamp_ms: u64,
    source_addr: WireSourceAddr,
    values: Vec<(String, WireValue)>,
    tag_words: Vec<u64>,
    flow_control_requested: bool,
    matched: bool,
}

fn millis_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Encodes/decodes a `(LogMessage, PathOptions)` pair for a disk-backed
/// queue (§4.3). The message's value map, tag bitmap, priority, timestamps,
/// and source address all round-trip; the `ref_count` itself is not part of
/// the wire format since it is purely an in-process bookkeeping artifact.
pub struct LogMessageCodec;

impl MessageCodec<QueueItem> for LogMessageCodec {
    fn encode(&self, item: &QueueItem) -> Result<Vec<u8>, DiskQueueError> {
        let (msg, path_options) = item;
        let data = msg.data();
        let wire = WireMessage {
            priority: data.priority.0,
            timestamp_recv_ms: millis_since_epoch(data.timestamp_recv),
            timestamp_stamp_ms: millis_since_epoch(data.timestamp_stamp),
            source_addr: match &data.source_addr {
                SourceAddr::Ip(ip) => WireSourceAddr::Ip(*ip),
                SourceAddr::Unix => WireSourceAddr::Unix,
                SourceAddr::Unspecified => WireSourceAddr::Unspecified,
            },
            values: data
                .values
                .iter()
                .map(|(k, v)| (k.clone(), WireValue { bytes: v.bytes.clone(), value_type: v.value_type.into() }))
                .collect(),
            tag_words: data.tags.words().to_vec(),
            flow_control_requested: path_options.flow_control_requested,
            matched: path_options.matched,
        };
        serde_json::to_vec(&wire).map_err(|e| DiskQueueError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<QueueItem, DiskQueueError> {
        let wire: WireMessage = serde_json::from_slice(bytes).map_err(|e| DiskQueueError::Codec(e.to_string()))?;
        let mut data = LogMessageData::new(
            Priority(wire.priority),
            match wire.source_addr {
                WireSourceAddr::Ip(ip) => SourceAddr::Ip(ip),
                WireSourceAddr::Unix => SourceAddr::Unix,
                WireSourceAddr::Unspecified => SourceAddr::Unspecified,
            },
        );
        data.timestamp_recv = UNIX_EPOCH + Duration::from_millis(wire.timestamp_recv_ms);
        data.timestamp_stamp = UNIX_EPOCH + Duration::from_millis(wire.timestamp_stamp_ms);
        data.values = wire
            .values
            .into_iter()
            .map(|(k, v)| (k, LogValue { bytes: v.bytes, value_type: v.value_type.into() }))
            .collect();
        data.tags = TagSet::from_words(wire.tag_words);
        let path_options =
            PathOptions { flow_control_requested: wire.flow_control_requested, matched: wire.matched };
        Ok((LogMessage::new(data), path_options))
    }
}
