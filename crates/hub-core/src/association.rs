//! Association state machine (C6, spec §4.6).

use crate::egress::Egress;
use crate::error::HubError;
use crate::registry::NodeRegistry;
use alertme_protocol::ids::endpoint;
use alertme_protocol::{Catalog, MessageParams};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Per-node join progress. Nodes are created already past `Unknown` (see
/// `registry::Node::new`); the variant is kept so the full state set named
/// in §4.6 is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Unknown,
    Announced,
    Matching,
    EndpointsRequested,
    HardwareJoining,
    Associated,
}

/// The magic signature that triggers a `security_init` reply (§4.6, §9).
const SECURITY_INIT_SIGNATURE: [u8; 4] = [0x15, 0x00, 0x39, 0x10];

/// Drives a newly-seen device through the ZDP and vendor join handshakes.
pub struct Association {
    registry: Arc<NodeRegistry>,
    egress: Arc<Egress>,
    catalog: Arc<Catalog>,
    sequence: AtomicU8,
}

impl Association {
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>, egress: Arc<Egress>, catalog: Arc<Catalog>) -> Self {
        Self {
            registry,
            egress,
            catalog,
            sequence: AtomicU8::new(1),
        }
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Runs the full Match-Descriptor handshake (§4.6). Re-entrant: devices
    /// that retransmit their request simply repeat the sequence.
    pub async fn handle_match_descriptor_request(
        &self,
        addr_long: [u8; 8],
        addr_short: u16,
    ) -> Result<(), HubError> {
        self.registry
            .set_assoc_state(addr_long, AssociationState::Matching);
        let sequence = self.next_sequence();

        let endpoints_request = self.catalog.get_message(
            "active_endpoints_request",
            &MessageParams {
                sequence: Some(sequence),
                net_addr: Some(addr_short),
                ..Default::default()
            },
        )?;
        self.egress.send(endpoints_request, addr_long, addr_short).await?;
        self.registry
            .set_assoc_state(addr_long, AssociationState::EndpointsRequested);

        let descriptor_response = self.catalog.get_message(
            "match_descriptor_response",
            &MessageParams {
                sequence: Some(sequence),
                status: Some(0x00),
                net_addr: Some(addr_short),
                endpoints: Some(vec![endpoint::ALERTME]),
                ..Default::default()
            },
        )?;
        self.egress.send(descriptor_response, addr_long, addr_short).await?;

        let join_1 = self
            .catalog
            .get_message("hardware_join_1", &MessageParams::default())?;
        self.egress.send(join_1, addr_long, addr_short).await?;
        let join_2 = self
            .catalog
            .get_message("hardware_join_2", &MessageParams::default())?;
        self.egress.send(join_2, addr_long, addr_short).await?;
        self.registry
            .set_assoc_state(addr_long, AssociationState::HardwareJoining);

        self.registry.mark_associated(addr_long);
        self.registry
            .set_assoc_state(addr_long, AssociationState::Associated);

        tracing::info!(node = %format_addr(addr_long), "device associated");
        Ok(())
    }

    /// A Version Information Response jumps straight to `Associated` from
    /// any prior state.
    pub fn handle_version_info_response(&self, addr_long: [u8; 8]) {
        self.registry.mark_associated(addr_long);
        self.registry
            .set_assoc_state(addr_long, AssociationState::Associated);
    }

    #[must_use]
    pub fn is_security_init_signature(bytes: &[u8]) -> bool {
        bytes.len() >= 7 && bytes[3..7] == SECURITY_INIT_SIGNATURE
    }

    /// Sends the `security_init` reply. Does not change association state.
    pub async fn handle_security_signature(
        &self,
        addr_long: [u8; 8],
        addr_short: u16,
    ) -> Result<(), HubError> {
        let frame = self
            .catalog
            .get_message("security_init", &MessageParams::default())?;
        self.egress.send(frame, addr_long, addr_short).await
    }
}

fn format_addr(addr_long: [u8; 8]) -> String {
    addr_long
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egress::ModemHandle;
    use tokio::sync::mpsc;

    fn make_association() -> (Association, Arc<NodeRegistry>, mpsc::Receiver<crate::egress::OutboundFrame>) {
        let registry = Arc::new(NodeRegistry::new());
        let (tx, rx) = mpsc::channel(16);
        let egress = Arc::new(Egress::new(ModemHandle::new(tx), registry.clone()));
        let catalog = Arc::new(Catalog::new());
        (Association::new(registry.clone(), egress, catalog), registry, rx)
    }

    #[tokio::test]
    async fn match_descriptor_handshake_sends_frames_in_order_and_associates() {
        let (association, registry, mut rx) = make_association();
        let addr = [4u8; 8];
        registry.ensure_node(addr, 0xBEEF);

        association
            .handle_match_descriptor_request(addr, 0xBEEF)
            .await
            .unwrap();

        let mut clusters = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            clusters.push(frame.cluster);
        }
        assert_eq!(
            clusters,
            vec![
                alertme_protocol::ids::zdp_cluster::ACTIVE_ENDPOINTS_REQUEST,
                alertme_protocol::ids::zdp_cluster::MATCH_DESCRIPTOR_RESPONSE,
                alertme_protocol::ids::alertme_cluster::DISCOVERY,
                alertme_protocol::ids::alertme_cluster::DISCOVERY,
            ]
        );

        let node = registry.get(addr).unwrap();
        assert!(node.associated);
        assert_eq!(node.assoc_state, AssociationState::Associated);
    }

    #[tokio::test]
    async fn version_info_response_jumps_to_associated() {
        let (association, registry, _rx) = make_association();
        let addr = [5u8; 8];
        registry.ensure_node(addr, 1);
        association.handle_version_info_response(addr);
        let node = registry.get(addr).unwrap();
        assert!(node.associated);
        assert_eq!(node.assoc_state, AssociationState::Associated);
    }

    #[test]
    fn recognizes_security_init_signature() {
        let bytes = [0x09, 0x00, 0x00, 0x15, 0x00, 0x39, 0x10];
        assert!(Association::is_security_init_signature(&bytes));
        let other = [0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(!Association::is_security_init_signature(&other));
    }
}
