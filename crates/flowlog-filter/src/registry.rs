// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named filter rule storage and init-time resolution (§4.2 "Filter call",
//! "Error conditions").

use crate::error::FilterInitError;
use crate::node::{FilterNode, NodeKind};
use crate::raw::{RawFilterNode, RawKind};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Holds every named filter rule's unresolved definition, and lazily
/// resolves (and caches) each into a fully linked [`FilterNode`] tree on
/// first `init`.
pub struct FilterRuleRegistry {
    definitions: Mutex<HashMap<String, RawFilterNode>>,
    resolved: Mutex<HashMap<String, Arc<FilterNode>>>,
}

impl Default for FilterRuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRuleRegistry {
    pub fn new() -> Self {
        FilterRuleRegistry { definitions: Mutex::new(HashMap::new()), resolved: Mutex::new(HashMap::new()) }
    }

    pub fn define(&self, name: impl Into<String>, root: RawFilterNode) {
        self.definitions.lock().insert(name.into(), root);
    }

    /// Resolve a named rule into a linked, evaluable tree, recursively
    /// resolving any `FilterCall` nodes it references. Cached after the
    /// first successful resolution.
    pub fn init(&self, name: &str) -> Result<Arc<FilterNode>, FilterInitError> {
        let mut visiting = HashSet::new();
        self.resolve(name, &mut visiting)
    }

    fn resolve(&self, name: &str, visiting: &mut HashSet<String>) -> Result<Arc<FilterNode>, FilterInitError> {
        if let Some(cached) = self.resolved.lock().get(name) {
            return Ok(Arc::clone(cached));
        }
        if !visiting.insert(name.to_string()) {
            return Err(FilterInitError::CycleDetected(name.to_string()));
        }
        let raw = self
            .definitions
            .lock()
            .remove(name)
            .ok_or_else(|| FilterInitError::FilterNotFound(name.to_string()))?;
        let built = self.build(raw, visiting)?;
        let arc = Arc::new(built);
        self.resolved.lock().insert(name.to_string(), Arc::clone(&arc));
        visiting.remove(name);
        Ok(arc)
    }

    fn build(&self, raw: RawFilterNode, visiting: &mut HashSet<String>) -> Result<FilterNode, FilterInitError> {
        let kind = match raw.kind {
            RawKind::Comparison(c) => NodeKind::Comparison(c),
            RawKind::RegexMatch(r) => NodeKind::RegexMatch(r),
            RawKind::NetmaskV4(n) => NodeKind::NetmaskV4(n),
            RawKind::NetmaskV6(n) => NodeKind::NetmaskV6(n),
            RawKind::Facility(m) => NodeKind::Facility(m),
            RawKind::Severity(m) => NodeKind::Severity(m),
            RawKind::TagMember(id) => NodeKind::TagMember(id),
            RawKind::FilterCall(target_name) => NodeKind::FilterCall(self.resolve(&target_name, visiting)?),
            RawKind::And(children) => {
                let mut built = Vec::with_capacity(children.len());
                for child in children {
                    built.push(self.build(child, visiting)?);
                }
                NodeKind::And(built)
            }
            RawKind::Or(children) => {
                let mut built = Vec::with_capacity(children.len());
                for child in children {
                    built.push(self.build(child, visiting)?);
                }
                NodeKind::Or(built)
            }
            RawKind::Not(child) => NodeKind::Not(Box::new(self.build(*child, visiting)?)),
        };
        Ok(FilterNode::new(kind, raw.negate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{op, CompareMode};
    use crate::node::ComparisonNode;
    use flowlog_core::template::LiteralTemplate;

    fn literal_eq(value: &str) -> RawFilterNode {
        RawFilterNode::new(
            RawKind::Comparison(ComparisonNode {
                left: Box::new(LiteralTemplate::string(value)),
                right: Box::new(LiteralTemplate::string(value)),
                mode: CompareMode::StringBased,
                op_mask: op::EQ,
            }),
            false,
        )
    }

    #[test]
    fn missing_filter_call_target_fails_init() {
        let registry = FilterRuleRegistry::new();
        registry.define("a", RawFilterNode::new(RawKind::FilterCall("b".into()), false));
        let err = registry.init("a").unwrap_err();
        assert!(matches!(err, FilterInitError::FilterNotFound(name) if name == "b"));
    }

    #[test]
    fn direct_cycle_is_detected() {
        let registry = FilterRuleRegistry::new();
        registry.define("a", RawFilterNode::new(RawKind::FilterCall("b".into()), false));
        registry.define("b", RawFilterNode::new(RawKind::FilterCall("a".into()), false));
        let err = registry.init("a").unwrap_err();
        assert!(matches!(err, FilterInitError::CycleDetected(_)));
    }

    #[test]
    fn resolves_and_caches_named_rule() {
        let registry = FilterRuleRegistry::new();
        registry.define("always", literal_eq("x"));
        let first = registry.init("always").unwrap();
        let second = registry.init("always").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn filter_call_resolves_through_to_target_evaluation() {
        let registry = FilterRuleRegistry::new();
        registry.define("inner", literal_eq("x"));
        registry.define("outer", RawFilterNode::new(RawKind::FilterCall("inner".into()), false));
        let node = registry.init("outer").unwrap();
        let mut messages = vec![flowlog_core::message::LogMessage::new(flowlog_core::message::LogMessageData::new(
            flowlog_core::priority::Priority::new(flowlog_core::priority::Facility::USER, flowlog_core::priority::Severity::DEBUG),
            flowlog_core::message::SourceAddr::Unspecified,
        ))];
        assert!(crate::eval::eval(&node, &mut messages));
    }
}
