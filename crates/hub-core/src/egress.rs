//! Egress (C8, spec §4.5): hands composed frames to the modem collaborator.

use crate::error::HubError;
use crate::registry::NodeRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An outbound unit: a fully-materialized frame plus its destination.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub profile: u16,
    pub cluster: u16,
    pub src_endpoint: u8,
    pub dest_endpoint: u8,
    pub data: Vec<u8>,
    pub addr_long: [u8; 8],
    pub addr_short: u16,
}

/// An inbound explicit-RX unit, as reported by the modem collaborator (§6).
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub id: String,
    pub profile: u16,
    pub cluster: u16,
    pub source_addr_long: [u8; 8],
    pub source_addr: u16,
    pub rf_data: Vec<u8>,
}

/// Handle to the modem collaborator's send side.
///
/// Modeled as a channel rather than a trait object: a background task owns
/// the real transport and drains the receiving end from outside this
/// workspace.
#[derive(Clone)]
pub struct ModemHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl ModemHandle {
    #[must_use]
    pub fn new(tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { tx }
    }

    async fn send(&self, frame: OutboundFrame) -> Result<(), HubError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| HubError::ModemError("modem channel closed".to_string()))
    }
}

/// Composes outbound frames and tracks per-node send counters.
pub struct Egress {
    modem: ModemHandle,
    registry: Arc<NodeRegistry>,
}

impl Egress {
    #[must_use]
    pub fn new(modem: ModemHandle, registry: Arc<NodeRegistry>) -> Self {
        Self { modem, registry }
    }

    /// Delegates to the modem collaborator and increments `messages_sent`
    /// for the destination node, if one is known.
    pub async fn send(
        &self,
        frame: alertme_protocol::MessageFrame,
        addr_long: [u8; 8],
        addr_short: u16,
    ) -> Result<(), HubError> {
        let outbound = OutboundFrame {
            profile: frame.profile,
            cluster: frame.cluster,
            src_endpoint: frame.src_endpoint,
            dest_endpoint: frame.dest_endpoint,
            data: frame.data,
            addr_long,
            addr_short,
        };
        self.modem.send(outbound).await?;
        self.registry.increment_sent(addr_long);
        Ok(())
    }
}
