//! Node registry (C4, spec §4.3): the in-memory table of known devices.

use crate::association::AssociationState;
use crate::error::HubError;
use alertme_protocol::{AttributeEntry, AttributeValue};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_addr_long(addr_long: [u8; 8]) -> String {
    addr_long
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// A single known device.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub addr_long: [u8; 8],
    pub addr_short: u16,
    pub associated: bool,
    pub name: String,
    pub created_on: u64,
    pub last_seen: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub attributes: HashMap<String, AttributeEntry>,
    pub assoc_state: AssociationState,
}

impl Node {
    fn new(addr_long: [u8; 8], addr_short: u16) -> Self {
        let now = now_unix();
        Self {
            id: format_addr_long(addr_long),
            addr_long,
            addr_short,
            associated: false,
            name: "Unknown Device".to_string(),
            created_on: now,
            last_seen: now,
            messages_received: 1,
            messages_sent: 0,
            attributes: HashMap::new(),
            // Creation is itself the node's first observed frame, so it
            // starts life already past UNKNOWN (spec §4.6: "Creation event
            // (any first frame): UNKNOWN -> ANNOUNCED").
            assoc_state: AssociationState::Announced,
        }
    }
}

/// Concurrent, address-keyed device table.
///
/// Backed by `DashMap`, sharded internally so lookups and updates from
/// different nodes don't serialize behind a single registry-wide lock.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: DashMap<[u8; 8], Node>,
}

impl NodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or creates the node for `addr_long`. On every call (creation
    /// included) this updates `addr_short` if it changed, bumps `last_seen`,
    /// and increments `messages_received`. Returns the address, which is the
    /// index/key into this table.
    pub fn ensure_node(&self, addr_long: [u8; 8], addr_short: u16) -> [u8; 8] {
        let now = now_unix();
        self.nodes
            .entry(addr_long)
            .and_modify(|node| {
                if node.addr_short != addr_short {
                    node.addr_short = addr_short;
                }
                node.last_seen = now;
                node.messages_received += 1;
            })
            .or_insert_with(|| Node::new(addr_long, addr_short));
        addr_long
    }

    #[must_use]
    pub fn get(&self, addr_long: [u8; 8]) -> Option<Node> {
        self.nodes.get(&addr_long).map(|r| r.value().clone())
    }

    /// Snapshot of every known node. Each entry is a deep copy, so later
    /// mutation of the registry never shows up in an already-returned list.
    #[must_use]
    pub fn list(&self) -> Vec<Node> {
        self.nodes.iter().map(|r| r.value().clone()).collect()
    }

    pub fn set_attributes<I>(&self, addr_long: [u8; 8], attrs: I) -> Result<(), HubError>
    where
        I: IntoIterator<Item = (String, AttributeValue)>,
    {
        let mut node = self
            .nodes
            .get_mut(&addr_long)
            .ok_or_else(|| HubError::DeviceNotFound(format_addr_long(addr_long)))?;
        let now = now_unix();
        for (key, value) in attrs {
            node.attributes.insert(
                key,
                AttributeEntry {
                    reported_value: value,
                    report_received_time: now,
                },
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn has_attribute(&self, addr_long: [u8; 8], key: &str) -> bool {
        self.nodes
            .get(&addr_long)
            .is_some_and(|node| node.attributes.contains_key(key))
    }

    pub fn rename(&self, addr_long: [u8; 8], name: String) -> Result<(), HubError> {
        let mut node = self
            .nodes
            .get_mut(&addr_long)
            .ok_or_else(|| HubError::DeviceNotFound(format_addr_long(addr_long)))?;
        node.name = name;
        Ok(())
    }

    pub fn mark_associated(&self, addr_long: [u8; 8]) {
        if let Some(mut node) = self.nodes.get_mut(&addr_long) {
            node.associated = true;
        }
    }

    pub fn set_assoc_state(&self, addr_long: [u8; 8], state: AssociationState) {
        if let Some(mut node) = self.nodes.get_mut(&addr_long) {
            node.assoc_state = state;
        }
    }

    /// Increments `messages_sent` if a matching node exists; a no-op
    /// otherwise (egress to an address with no registry entry is not an
    /// error, per §4.5).
    pub fn increment_sent(&self, addr_long: [u8; 8]) {
        if let Some(mut node) = self.nodes.get_mut(&addr_long) {
            node.messages_sent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_node_creates_once() {
        let registry = NodeRegistry::new();
        let addr = [0, 1, 2, 3, 4, 5, 6, 7];
        registry.ensure_node(addr, 0x1234);
        registry.ensure_node(addr, 0x1234);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn ensure_node_increments_messages_received() {
        let registry = NodeRegistry::new();
        let addr = [0u8; 8];
        registry.ensure_node(addr, 1);
        registry.ensure_node(addr, 1);
        registry.ensure_node(addr, 1);
        assert_eq!(registry.get(addr).unwrap().messages_received, 3);
    }

    #[test]
    fn ensure_node_updates_changed_short_addr() {
        let registry = NodeRegistry::new();
        let addr = [1u8; 8];
        registry.ensure_node(addr, 0x0001);
        registry.ensure_node(addr, 0x0002);
        assert_eq!(registry.get(addr).unwrap().addr_short, 0x0002);
    }

    #[test]
    fn id_is_colon_separated_lowercase_hex() {
        let registry = NodeRegistry::new();
        let addr = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22, 0x33];
        registry.ensure_node(addr, 0);
        assert_eq!(registry.get(addr).unwrap().id, "de:ad:be:ef:00:11:22:33");
    }

    #[test]
    fn set_attributes_on_unknown_node_fails() {
        let registry = NodeRegistry::new();
        let result = registry.set_attributes([9u8; 8], [("RSSI".to_string(), AttributeValue::Rssi(1))]);
        assert!(matches!(result, Err(HubError::DeviceNotFound(_))));
    }

    #[test]
    fn list_is_a_deep_copy() {
        let registry = NodeRegistry::new();
        let addr = [2u8; 8];
        registry.ensure_node(addr, 0);
        let mut snapshot = registry.list();
        snapshot[0].name = "mutated locally".to_string();
        assert_eq!(registry.get(addr).unwrap().name, "Unknown Device");
    }
}
