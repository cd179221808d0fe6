// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The template language interpreter is out of scope (§1). Callers that
//! need to evaluate a template against a message window implement this
//! trait; a couple of trivial implementations are provided for direct
//! value/literal access, which is all the filter engine needs internally.

use crate::message::LogMessage;
use crate::value::ValueType;

/// Evaluates to a typed byte string given a window of correlated messages,
/// the last of which is the primary message (mirrors the `eval()` contract
/// in spec §4.2).
pub trait Template: std::fmt::Debug + Send + Sync {
    fn format_with_type(&self, messages: &[LogMessage]) -> (Vec<u8>, ValueType);
}

/// A constant string template.
#[derive(Debug, Clone)]
pub struct LiteralTemplate {
    pub bytes: Vec<u8>,
    pub value_type: ValueType,
}

impl LiteralTemplate {
    pub fn string(s: impl Into<String>) -> Self {
        LiteralTemplate { bytes: s.into().into_bytes(), value_type: ValueType::String }
    }
}

impl Template for LiteralTemplate {
    fn format_with_type(&self, _messages: &[LogMessage]) -> (Vec<u8>, ValueType) {
        (self.bytes.clone(), self.value_type)
    }
}

/// Looks up a single named value on the primary (last) message.
#[derive(Debug, Clone)]
pub struct ValueRefTemplate {
    pub name: String,
}

impl ValueRefTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        ValueRefTemplate { name: name.into() }
    }
}

impl Template for ValueRefTemplate {
    fn format_with_type(&self, messages: &[LogMessage]) -> (Vec<u8>, ValueType) {
        match messages.last().and_then(|m| m.value(&self.name)) {
            Some(v) => (v.bytes.clone(), v.value_type),
            None => (Vec::new(), ValueType::Null),
        }
    }
}
