// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The generic length-prefixed codec named in §4.3 ("serialize(fn, state,
//! err), deserialize(fn, state, err)"): the queue stores raw framed bytes
//! and is agnostic to message internals, delegating encode/decode of the
//! payload to whatever [`MessageCodec`] the caller supplies.

use crate::error::DiskQueueError;

/// Encodes/decodes one logical item to/from the byte payload a
/// [`crate::queue::DiskQueue`] frames with a length prefix. Implemented
/// once per item type (e.g. a `LogMessage` codec in the daemon binary);
/// the queue itself never inspects the payload.
pub trait MessageCodec<T>: Send + Sync {
    fn encode(&self, item: &T) -> Result<Vec<u8>, DiskQueueError>;
    fn decode(&self, bytes: &[u8]) -> Result<T, DiskQueueError>;
}

/// A codec for opaque byte blobs, useful for tests and for callers that
/// already serialize messages themselves before handing them to the queue.
pub struct RawBytesCodec;

impl MessageCodec<Vec<u8>> for RawBytesCodec {
    fn encode(&self, item: &Vec<u8>) -> Result<Vec<u8>, DiskQueueError> {
        Ok(item.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, DiskQueueError> {
        Ok(bytes.to_vec())
    }
}
