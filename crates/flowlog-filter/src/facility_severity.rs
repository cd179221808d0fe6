// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facility/severity filter nodes (§4.2 "Facility/Severity").

use flowlog_core::message::LogMessage;
use flowlog_core::priority::{Facility, Severity};

/// A sentinel high bit on the raw config value marks "exact number" rather
/// than "bitmap", mirroring syslog-ng's encoding of `facility(<n>)` vs.
/// `facility(name, name, ...)`.
const EXACT_SENTINEL: u32 = 1 << 31;

#[derive(Debug, Clone, Copy)]
pub enum FacilityMatch {
    Bitmap(u32),
    Exact(u8),
}

impl FacilityMatch {
    /// Decode a raw config value: if the sentinel high bit is set, the low
    /// byte is the exact facility number; otherwise the value is a bitmap.
    pub fn from_raw(raw: u32) -> Self {
        if raw & EXACT_SENTINEL != 0 {
            FacilityMatch::Exact((raw & 0xff) as u8)
        } else {
            FacilityMatch::Bitmap(raw)
        }
    }

    pub fn eval(self, facility: Facility) -> bool {
        match self {
            FacilityMatch::Bitmap(mask) => mask & facility.bit() != 0,
            FacilityMatch::Exact(n) => facility.0 == n,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeverityMatch(pub u32);

impl SeverityMatch {
    pub fn eval(self, severity: Severity) -> bool {
        self.0 & severity.bit() != 0
    }
}

pub fn eval_facility(m: FacilityMatch, messages: &[LogMessage]) -> bool {
    messages.last().map(|msg| m.eval(msg.priority().facility())).unwrap_or(false)
}

pub fn eval_severity(m: SeverityMatch, messages: &[LogMessage]) -> bool {
    messages.last().map(|msg| m.eval(msg.priority().severity())).unwrap_or(false)
}
