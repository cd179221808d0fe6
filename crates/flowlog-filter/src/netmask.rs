// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Netmask v4/v6 filter node (§4.2 "Netmask v4/v6").

use flowlog_core::message::LogMessage;
use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Parses a CIDR at construction. An invalid CIDR does not fail init --
/// the node is marked invalid and evaluates as a constant per §4.2.
#[derive(Debug)]
pub struct NetmaskNode {
    network: Option<IpNetwork>,
}

impl NetmaskNode {
    pub fn new(cidr: &str) -> Self {
        NetmaskNode { network: cidr.parse::<IpNetwork>().ok() }
    }

    pub fn is_valid(&self) -> bool {
        self.network.is_some()
    }

    /// Returns `false` (a constant) when invalid; otherwise `address &
    /// mask == network address`.
    pub fn eval(&self, messages: &[LogMessage]) -> bool {
        let Some(network) = &self.network else { return false };
        let Some(msg) = messages.last() else { return false };
        let addr = msg.source_addr().effective_ip();
        match (network, addr) {
            (IpNetwork::V4(net), IpAddr::V4(ip)) => net.contains(ip),
            (IpNetwork::V6(net), IpAddr::V6(ip)) => net.contains(ip),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_core::message::{LogMessageData, SourceAddr};
    use flowlog_core::priority::{Facility, Priority, Severity};
    use std::net::Ipv4Addr;

    fn msg_from(addr: SourceAddr) -> LogMessage {
        LogMessage::new(LogMessageData::new(Priority::new(Facility::USER, Severity::DEBUG), addr))
    }

    #[test]
    fn matches_address_inside_network() {
        let node = NetmaskNode::new("10.0.0.0/8");
        let msg = msg_from(SourceAddr::Ip(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))));
        assert!(node.eval(&[msg]));
    }

    #[test]
    fn rejects_address_outside_network() {
        let node = NetmaskNode::new("10.0.0.0/8");
        let msg = msg_from(SourceAddr::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(!node.eval(&[msg]));
    }

    #[test]
    fn unix_source_treated_as_loopback() {
        let node = NetmaskNode::new("127.0.0.0/8");
        let msg = msg_from(SourceAddr::Unix);
        assert!(node.eval(&[msg]));
    }

    #[test]
    fn invalid_cidr_marks_node_invalid_and_evaluates_false() {
        let node = NetmaskNode::new("not-a-cidr");
        assert!(!node.is_valid());
        let msg = msg_from(SourceAddr::Unspecified);
        assert!(!node.eval(&[msg]));
    }
}
