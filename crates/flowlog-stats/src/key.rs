// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stats cluster keys (§4.1 "Key equality").

/// Legacy component tags (§6), matching the `SCS_*` values in syslog-ng's
/// `stats-cluster.h`. Used only for CSV's legacy component column and the
/// legacy branch of key equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyComponent {
    Source,
    Destination,
    Global,
    Center,
    Host,
    Sender,
    Program,
    Severity,
    Facility,
    Tag,
    Filter,
    Parser,
}

impl LegacyComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            LegacyComponent::Source => "source",
            LegacyComponent::Destination => "destination",
            LegacyComponent::Global => "global",
            LegacyComponent::Center => "center",
            LegacyComponent::Host => "host",
            LegacyComponent::Sender => "sender",
            LegacyComponent::Program => "program",
            LegacyComponent::Severity => "severity",
            LegacyComponent::Facility => "facility",
            LegacyComponent::Tag => "tag",
            LegacyComponent::Filter => "filter",
            LegacyComponent::Parser => "parser",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LegacyKey {
    pub component: LegacyComponent,
    pub id: String,
    pub instance: String,
}

/// The canonical key a cluster is registered and looked up under. Label
/// ordering is canonicalized (sorted by name) at construction so two keys
/// built with labels in different orders still compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub legacy: Option<LegacyKey>,
}

impl ClusterKey {
    pub fn new(name: impl Into<String>) -> Self {
        ClusterKey { name: name.into(), labels: Vec::new(), legacy: None }
    }

    pub fn with_labels(mut self, mut labels: Vec<(String, String)>) -> Self {
        labels.sort_by(|a, b| a.0.cmp(&b.0));
        self.labels = labels;
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyKey) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// The string a glob query pattern is matched against: `name` followed
    /// by each `label=value` in canonical order.
    pub fn query_key(&self) -> String {
        let mut s = self.name.clone();
        for (k, v) in &self.labels {
            s.push(';');
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_order_is_canonicalized() {
        let a = ClusterKey::new("x").with_labels(vec![("b".into(), "2".into()), ("a".into(), "1".into())]);
        let b = ClusterKey::new("x").with_labels(vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
        assert_eq!(a, b);
    }
}
