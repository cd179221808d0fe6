// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path options: a small struct carried alongside a message through the
//! pipeline, tracking flow-control request and match result (§3 glossary).

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// The source requested flow control: if this message is dropped, the
    /// upstream should be suspended (§7 "Message drop").
    pub flow_control_requested: bool,
    /// Whether a filter along the path matched.
    pub matched: bool,
}

impl PathOptions {
    pub fn new() -> Self {
        PathOptions::default()
    }

    pub fn with_flow_control(mut self, requested: bool) -> Self {
        self.flow_control_requested = requested;
        self
    }
}
