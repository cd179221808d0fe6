// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public evaluation contract (§4.2): `eval(node, messages[], n) -> bool`.

use crate::node::FilterNode;
use flowlog_core::message::LogMessage;

/// Evaluate `node` against a window of correlated messages. `messages` must
/// be non-empty; `messages.last()` is the primary message. If
/// `node.modifies_message()` is true the caller must already have made the
/// primary message writable (it is passed `&mut` here precisely so nodes
/// that attach regex captures can do so in place).
///
/// The result is XORed with the node's `negate` flag, and the node's
/// `matched`/`not_matched` counters are incremented exactly once per call.
pub fn eval(node: &FilterNode, messages: &mut [LogMessage]) -> bool {
    debug_assert!(!messages.is_empty(), "eval requires at least the primary message");
    node.eval_and_record(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{op, CompareMode};
    use crate::node::{ComparisonNode, NodeKind};
    use flowlog_core::message::{LogMessageData, SourceAddr};
    use flowlog_core::priority::{Facility, Priority, Severity};
    use flowlog_core::template::ValueRefTemplate;
    use flowlog_core::value::LogValue;

    fn msg_with(name: &str, value: &str) -> LogMessage {
        let mut data = LogMessageData::new(Priority::new(Facility::USER, Severity::DEBUG), SourceAddr::Unspecified);
        data.values.insert(name.to_string(), LogValue::string(value));
        LogMessage::new(data)
    }

    #[test]
    fn negate_flips_result_and_counts() {
        let node = FilterNode::new(
            NodeKind::Comparison(ComparisonNode {
                left: Box::new(ValueRefTemplate::new("program")),
                right: Box::new(flowlog_core::template::LiteralTemplate::string("sshd")),
                mode: CompareMode::StringBased,
                op_mask: op::EQ,
            }),
            true,
        );
        let mut messages = vec![msg_with("program", "sshd")];
        assert!(!eval(&node, &mut messages), "direct match negated should be false");
        assert_eq!(node.not_matched.get(), 1);
        assert_eq!(node.matched.get(), 0);
    }

    #[test]
    fn and_node_short_circuits_on_first_false_in_counters_but_evaluates_all() {
        let always_true = FilterNode::new(
            NodeKind::Comparison(ComparisonNode {
                left: Box::new(flowlog_core::template::LiteralTemplate::string("a")),
                right: Box::new(flowlog_core::template::LiteralTemplate::string("a")),
                mode: CompareMode::StringBased,
                op_mask: op::EQ,
            }),
            false,
        );
        let always_false = FilterNode::new(
            NodeKind::Comparison(ComparisonNode {
                left: Box::new(flowlog_core::template::LiteralTemplate::string("a")),
                right: Box::new(flowlog_core::template::LiteralTemplate::string("b")),
                mode: CompareMode::StringBased,
                op_mask: op::EQ,
            }),
            false,
        );
        let and_node = FilterNode::new(NodeKind::And(vec![always_true, always_false]), false);
        let mut messages = vec![msg_with("x", "y")];
        assert!(!eval(&and_node, &mut messages));
    }
}
