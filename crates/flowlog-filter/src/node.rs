// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The filter expression tree (§4.2): a common node wrapper around the
//! variant kinds, carrying the negate flag and per-node match counters.

use crate::compare::{self, CompareMode};
use crate::facility_severity::{self, FacilityMatch, SeverityMatch};
use crate::netmask::NetmaskNode;
use crate::regex_match::RegexMatchNode;
use flowlog_core::message::LogMessage;
use flowlog_core::template::Template;
use flowlog_stats::Counter;
use std::sync::Arc;

pub struct ComparisonNode {
    pub left: Box<dyn Template>,
    pub right: Box<dyn Template>,
    pub mode: CompareMode,
    pub op_mask: u8,
}

impl std::fmt::Debug for ComparisonNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonNode").field("mode", &self.mode).field("op_mask", &self.op_mask).finish()
    }
}

/// The sum type of leaf and compound filter expression nodes.
pub enum NodeKind {
    Comparison(ComparisonNode),
    RegexMatch(RegexMatchNode),
    NetmaskV4(NetmaskNode),
    NetmaskV6(NetmaskNode),
    Facility(FacilityMatch),
    Severity(SeverityMatch),
    TagMember(flowlog_core::tags::TagId),
    /// Resolved at init time by [`crate::registry::FilterRuleRegistry::init`].
    FilterCall(Arc<FilterNode>),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Comparison(c) => write!(f, "Comparison({c:?})"),
            NodeKind::RegexMatch(_) => write!(f, "RegexMatch"),
            NodeKind::NetmaskV4(_) => write!(f, "NetmaskV4"),
            NodeKind::NetmaskV6(_) => write!(f, "NetmaskV6"),
            NodeKind::Facility(_) => write!(f, "Facility"),
            NodeKind::Severity(_) => write!(f, "Severity"),
            NodeKind::TagMember(id) => write!(f, "TagMember({id:?})"),
            NodeKind::FilterCall(_) => write!(f, "FilterCall"),
            NodeKind::And(children) => write!(f, "And({})", children.len()),
            NodeKind::Or(children) => write!(f, "Or({})", children.len()),
            NodeKind::Not(_) => write!(f, "Not"),
        }
    }
}

/// One node in the filter expression tree. `negate` is XORed onto the
/// kind's raw result (§4.2's public contract); `matched`/`not_matched` are
/// incremented on every evaluation.
pub struct FilterNode {
    pub kind: NodeKind,
    pub negate: bool,
    pub matched: Counter,
    pub not_matched: Counter,
}

impl std::fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterNode").field("kind", &self.kind).field("negate", &self.negate).finish()
    }
}

impl FilterNode {
    pub fn new(kind: NodeKind, negate: bool) -> Self {
        FilterNode { kind, negate, matched: Counter::null(), not_matched: Counter::null() }
    }

    pub fn modifies_message(&self) -> bool {
        match &self.kind {
            NodeKind::RegexMatch(r) => r.modifies_message(),
            NodeKind::And(children) | NodeKind::Or(children) => children.iter().any(FilterNode::modifies_message),
            NodeKind::Not(child) => child.modifies_message(),
            NodeKind::FilterCall(target) => target.modifies_message(),
            _ => false,
        }
    }

    /// Traversal: compound nodes expose their children, leaves expose none
    /// (§4.2 "Traversal").
    pub fn children(&self) -> Vec<&FilterNode> {
        match &self.kind {
            NodeKind::And(children) | NodeKind::Or(children) => children.iter().collect(),
            NodeKind::Not(child) => vec![child.as_ref()],
            NodeKind::FilterCall(target) => vec![target.as_ref()],
            _ => Vec::new(),
        }
    }

    fn eval_kind(&self, messages: &mut [LogMessage]) -> bool {
        match &self.kind {
            NodeKind::Comparison(c) => {
                let (lb, lt) = c.left.format_with_type(messages);
                let (rb, rt) = c.right.format_with_type(messages);
                let left = flowlog_core::value::LogValue { bytes: lb, value_type: lt };
                let right = flowlog_core::value::LogValue { bytes: rb, value_type: rt };
                compare::evaluate(c.mode, c.op_mask, &left, &right)
            }
            NodeKind::RegexMatch(r) => r.eval(messages),
            NodeKind::NetmaskV4(n) | NodeKind::NetmaskV6(n) => n.eval(messages),
            NodeKind::Facility(m) => facility_severity::eval_facility(*m, messages),
            NodeKind::Severity(m) => facility_severity::eval_severity(*m, messages),
            NodeKind::TagMember(id) => messages.last().map(|m| m.tags().contains(*id)).unwrap_or(false),
            NodeKind::FilterCall(target) => crate::eval::eval(target, messages),
            NodeKind::And(children) => children.iter().all(|c| crate::eval::eval(c, messages)),
            NodeKind::Or(children) => children.iter().any(|c| crate::eval::eval(c, messages)),
            NodeKind::Not(child) => !crate::eval::eval(child, messages),
        }
    }

    pub(crate) fn eval_and_record(&self, messages: &mut [LogMessage]) -> bool {
        let raw = self.eval_kind(messages);
        let result = raw ^ self.negate;
        if result {
            self.matched.inc();
        } else {
            self.not_matched.inc();
        }
        result
    }
}
