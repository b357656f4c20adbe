//! Ingress dispatcher (C5, spec §4.4): classifies and routes inbound frames.

use crate::association::Association;
use crate::egress::{Egress, InboundFrame};
use crate::registry::NodeRegistry;
use alertme_protocol::ids::{alertme_cluster, alertme_cmd, profile, zdp_cluster};
use alertme_protocol::{codec, zdp, AttributeValue, Catalog, MessageParams};
use std::sync::Arc;

/// The only inbound frame kind the core handles (§6).
const EXPLICIT_RX: &str = "rx_explicit";

/// Routes inbound explicit-RX frames to the right parser and registry
/// mutation, driving the association state machine and the "probe unknown
/// devices" side effect along the way.
pub struct Dispatcher {
    registry: Arc<NodeRegistry>,
    egress: Arc<Egress>,
    association: Arc<Association>,
    catalog: Arc<Catalog>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<NodeRegistry>,
        egress: Arc<Egress>,
        association: Arc<Association>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            registry,
            egress,
            association,
            catalog,
        }
    }

    /// Handles one inbound frame. Decode and dispatch-miss failures are
    /// logged and the frame dropped (§7); this never returns an error to the
    /// caller because nothing in the ingress path is meant to be fatal.
    pub async fn handle_inbound(&self, frame: InboundFrame) {
        if frame.id != EXPLICIT_RX {
            return;
        }

        let addr_long = frame.source_addr_long;
        let addr_short = frame.source_addr;
        self.registry.ensure_node(addr_long, addr_short);

        match frame.profile {
            profile::ZDP => self.handle_zdp(addr_long, addr_short, frame.cluster, &frame.rf_data).await,
            profile::ALERTME => self.handle_alertme(addr_long, addr_short, frame.cluster, &frame.rf_data).await,
            other => {
                tracing::warn!(profile = format_args!("{other:#06x}"), "unknown profile");
            }
        }
    }

    async fn handle_zdp(&self, addr_long: [u8; 8], addr_short: u16, cluster: u16, rf_data: &[u8]) {
        match cluster {
            zdp_cluster::DEVICE_ANNOUNCE => {
                tracing::info!(node = %hex_addr(addr_long), "device announce");
            }
            zdp_cluster::NETWORK_ADDRESS_RESPONSE => {
                tracing::debug!(node = %hex_addr(addr_long), "network address response");
            }
            zdp_cluster::NODE_DESCRIPTOR_RESPONSE => {
                tracing::debug!(node = %hex_addr(addr_long), "node descriptor response");
            }
            zdp_cluster::ACTIVE_ENDPOINTS_RESPONSE => {
                tracing::debug!(node = %hex_addr(addr_long), "active endpoints response");
            }
            zdp_cluster::MATCH_DESCRIPTOR_REQUEST => {
                if zdp::parse_match_descriptor_request(rf_data).is_err() {
                    tracing::warn!(node = %hex_addr(addr_long), "malformed match descriptor request");
                    return;
                }
                if let Err(err) = self
                    .association
                    .handle_match_descriptor_request(addr_long, addr_short)
                    .await
                {
                    tracing::warn!(node = %hex_addr(addr_long), error = %err, "association handshake failed");
                }
            }
            other => {
                tracing::error!(node = %hex_addr(addr_long), cluster = format_args!("{other:#06x}"), "unknown zdp cluster");
            }
        }
    }

    async fn handle_alertme(&self, addr_long: [u8; 8], addr_short: u16, cluster: u16, rf_data: &[u8]) {
        if rf_data.len() < 3 {
            tracing::warn!(node = %hex_addr(addr_long), "alertme frame too short to carry a cluster command");
            return;
        }
        let cmd = rf_data[2];

        match (cluster, cmd) {
            (alertme_cluster::SWITCH, alertme_cmd::SWITCH_STATE_UPDATE) => {
                self.apply(addr_long, codec::parse_switch_state_update(rf_data), |state| {
                    vec![("state".to_string(), AttributeValue::SwitchState(state))]
                });
            }
            (alertme_cluster::POWER, alertme_cmd::POWER_DEMAND_UPDATE) => {
                self.apply(addr_long, codec::parse_power_demand(rf_data), |power| {
                    vec![("instantaneousPower".to_string(), AttributeValue::InstantaneousPower(power))]
                });
            }
            (alertme_cluster::POWER, alertme_cmd::POWER_CONSUMPTION_UPDATE) => {
                self.apply(addr_long, codec::parse_power_consumption(rf_data), |pc| {
                    vec![
                        ("PowerConsumption".to_string(), AttributeValue::PowerConsumption(pc.consumption_wh)),
                        ("UpTime".to_string(), AttributeValue::UpTime(pc.uptime_s)),
                    ]
                });
            }
            (alertme_cluster::DISCOVERY, alertme_cmd::STATUS_UPDATE) => {
                self.apply(addr_long, codec::parse_status_update(rf_data), status_update_attributes);
            }
            (alertme_cluster::TAMPER, _) => {
                self.apply(addr_long, codec::parse_tamper_state(rf_data), |state| {
                    vec![("TamperSwitch".to_string(), AttributeValue::TamperSwitch(state))]
                });
            }
            (alertme_cluster::BUTTON, _) => {
                self.apply(addr_long, codec::parse_button_press(rf_data), |press| {
                    vec![
                        ("state".to_string(), AttributeValue::SwitchState(press.state)),
                        ("counter".to_string(), AttributeValue::Counter(u32::from(press.counter))),
                    ]
                });
            }
            (alertme_cluster::DEVICE_INFO, alertme_cmd::RANGE_UPDATE) => {
                self.apply(addr_long, codec::parse_range_info_update(rf_data), |rssi| {
                    vec![("RSSI".to_string(), AttributeValue::Rssi(rssi))]
                });
            }
            (alertme_cluster::DEVICE_INFO, alertme_cmd::VERSION_INFO_UPDATE) => {
                let decoded = codec::parse_version_info_update(rf_data);
                self.apply(addr_long, decoded, |info| {
                    vec![
                        ("hwVersion".to_string(), AttributeValue::HwVersion(info.hw_version)),
                        ("manufacturer".to_string(), AttributeValue::Manufacturer(info.manufacturer)),
                        ("model".to_string(), AttributeValue::Model(info.model)),
                        ("manufactureDate".to_string(), AttributeValue::ManufactureDate(info.manufacture_date)),
                    ]
                });
                self.association.handle_version_info_response(addr_long);
            }
            (alertme_cluster::SECURITY, _) => {
                if Association::is_security_init_signature(rf_data) {
                    if let Err(err) = self.association.handle_security_signature(addr_long, addr_short).await {
                        tracing::warn!(node = %hex_addr(addr_long), error = %err, "security_init reply failed");
                    }
                }
                self.apply(addr_long, codec::parse_security_device_state(rf_data), |state| {
                    vec![
                        ("ReedSwitch".to_string(), AttributeValue::ReedSwitch(state.reed_switch)),
                        ("TamperSwitch".to_string(), AttributeValue::TamperSwitch(state.tamper_switch)),
                    ]
                });
            }
            (cluster, cmd) => {
                tracing::error!(
                    node = %hex_addr(addr_long),
                    cluster = format_args!("{cluster:#06x}"),
                    cmd = format_args!("{cmd:#04x}"),
                    "unknown alertme cluster/command pair"
                );
            }
        }

        if !self.registry.has_attribute(addr_long, "model") {
            if let Ok(frame) = self.catalog.get_message("version_info_request", &MessageParams::default()) {
                if let Err(err) = self.egress.send(frame, addr_long, addr_short).await {
                    tracing::warn!(node = %hex_addr(addr_long), error = %err, "version_info_request failed");
                }
            }
        }
    }

    /// Decodes with `parser`, logs and drops on failure, otherwise merges
    /// `to_attrs`'s output into the node's attribute map.
    fn apply<T, E: std::fmt::Display>(
        &self,
        addr_long: [u8; 8],
        parsed: Result<T, E>,
        to_attrs: impl FnOnce(T) -> Vec<(String, AttributeValue)>,
    ) {
        match parsed {
            Ok(value) => {
                let attrs = to_attrs(value);
                if let Err(err) = self.registry.set_attributes(addr_long, attrs) {
                    tracing::warn!(node = %hex_addr(addr_long), error = %err, "failed to record attributes");
                }
            }
            Err(err) => {
                tracing::warn!(node = %hex_addr(addr_long), error = %err, "malformed payload, frame dropped");
            }
        }
    }
}

fn status_update_attributes(status: codec::StatusUpdate) -> Vec<(String, AttributeValue)> {
    match status {
        codec::StatusUpdate::PowerClamp => {
            vec![("Type".to_string(), AttributeValue::DeviceTypeLabel("Power Clamp".to_string()))]
        }
        codec::StatusUpdate::PowerSwitch => {
            vec![("Type".to_string(), AttributeValue::DeviceTypeLabel("Power Switch".to_string()))]
        }
        codec::StatusUpdate::KeyFob { counter, temperature_f } => vec![
            ("Type".to_string(), AttributeValue::DeviceTypeLabel("Key Fob".to_string())),
            ("counter".to_string(), AttributeValue::Counter(counter)),
            ("Temperature".to_string(), AttributeValue::TemperatureFahrenheit(temperature_f)),
        ],
        codec::StatusUpdate::DoorSensor {
            reed_switch,
            tamper_switch,
            temperature_f,
        } => {
            let mut attrs = vec![
                ("Type".to_string(), AttributeValue::DeviceTypeLabel("Door Sensor".to_string())),
                ("ReedSwitch".to_string(), AttributeValue::ReedSwitch(reed_switch)),
                ("TamperSwitch".to_string(), AttributeValue::TamperSwitch(tamper_switch)),
            ];
            if let Some(f) = temperature_f {
                attrs.push(("Temperature".to_string(), AttributeValue::TemperatureFahrenheit(f)));
            }
            attrs
        }
    }
}

fn hex_addr(addr_long: [u8; 8]) -> String {
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
    use crate::Association;
    use tokio::sync::mpsc;

    fn make_dispatcher() -> (Dispatcher, Arc<NodeRegistry>, mpsc::Receiver<crate::egress::OutboundFrame>) {
        let registry = Arc::new(NodeRegistry::new());
        let (tx, rx) = mpsc::channel(32);
        let egress = Arc::new(Egress::new(ModemHandle::new(tx), registry.clone()));
        let catalog = Arc::new(Catalog::new());
        let association = Arc::new(Association::new(registry.clone(), egress.clone(), catalog.clone()));
        (
            Dispatcher::new(registry.clone(), egress, association, catalog),
            registry,
            rx,
        )
    }

    #[tokio::test]
    async fn ignores_non_explicit_rx_frames() {
        let (dispatcher, registry, _rx) = make_dispatcher();
        dispatcher
            .handle_inbound(InboundFrame {
                id: "rx_other".to_string(),
                profile: profile::ALERTME,
                cluster: alertme_cluster::SWITCH,
                source_addr_long: [1u8; 8],
                source_addr: 1,
                rf_data: vec![0x09, 0x68, 0x80, 0x07, 0x01],
            })
            .await;
        assert!(registry.get([1u8; 8]).is_none());
    }

    #[tokio::test]
    async fn switch_update_sets_state_attribute_and_probes_for_model() {
        let (dispatcher, registry, mut rx) = make_dispatcher();
        let addr = [2u8; 8];
        dispatcher
            .handle_inbound(InboundFrame {
                id: EXPLICIT_RX.to_string(),
                profile: profile::ALERTME,
                cluster: alertme_cluster::SWITCH,
                source_addr_long: addr,
                source_addr: 0x10,
                rf_data: vec![0x09, 0x68, alertme_cmd::SWITCH_STATE_UPDATE, 0x07, 0x01],
            })
            .await;

        let node = registry.get(addr).unwrap();
        assert!(matches!(
            node.attributes.get("state").unwrap().reported_value,
            AttributeValue::SwitchState(alertme_protocol::SwitchState::On)
        ));

        // Node has no `model` attribute yet, so a version_info_request must
        // have been queued to the modem.
        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.profile, profile::ALERTME);
        assert_eq!(queued.cluster, alertme_cluster::DEVICE_INFO);
    }

    #[tokio::test]
    async fn version_info_update_marks_node_associated_and_skips_probe() {
        let (dispatcher, registry, mut rx) = make_dispatcher();
        let addr = [6u8; 8];
        let mut rf_data = vec![0x09, 0x71, alertme_cmd::VERSION_INFO_UPDATE];
        rf_data.extend_from_slice(&1u16.to_le_bytes());
        rf_data.extend_from_slice(&[0u8; 17]);
        rf_data.extend_from_slice(b"AlertMe.com\nSmart Plug\n2013-01-01");

        dispatcher
            .handle_inbound(InboundFrame {
                id: EXPLICIT_RX.to_string(),
                profile: profile::ALERTME,
                cluster: alertme_cluster::DEVICE_INFO,
                source_addr_long: addr,
                source_addr: 0x20,
                rf_data,
            })
            .await;

        let node = registry.get(addr).unwrap();
        assert!(node.associated);
        assert!(node.attributes.contains_key("model"));
        assert!(rx.try_recv().is_err(), "model now known, no probe expected");
    }

    #[tokio::test]
    async fn match_descriptor_request_drives_association() {
        let (dispatcher, registry, mut rx) = make_dispatcher();
        let addr = [7u8; 8];
        let mut rf_data = vec![0x01u8];
        rf_data.extend_from_slice(&0xBEEFu16.to_le_bytes());
        rf_data.extend_from_slice(&0x0104u16.to_le_bytes());
        rf_data.push(0x00);
        rf_data.push(0x00);

        dispatcher
            .handle_inbound(InboundFrame {
                id: EXPLICIT_RX.to_string(),
                profile: profile::ZDP,
                cluster: zdp_cluster::MATCH_DESCRIPTOR_REQUEST,
                source_addr_long: addr,
                source_addr: 0xBEEF,
                rf_data,
            })
            .await;

        let node = registry.get(addr).unwrap();
        assert!(node.associated);

        let mut seen = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            seen.push(frame.cluster);
        }
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn security_signature_triggers_reply_and_updates_attributes() {
        let (dispatcher, registry, mut rx) = make_dispatcher();
        let addr = [8u8; 8];
        let rf_data = vec![0x11, 0x80, 0x00, 0x15, 0x00, 0x39, 0x10];

        dispatcher
            .handle_inbound(InboundFrame {
                id: EXPLICIT_RX.to_string(),
                profile: profile::ALERTME,
                cluster: alertme_cluster::SECURITY,
                source_addr_long: addr,
                source_addr: 0x30,
                rf_data,
            })
            .await;

        let node = registry.get(addr).unwrap();
        assert!(node.attributes.contains_key("ReedSwitch"));
        assert!(node.attributes.contains_key("TamperSwitch"));

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        assert!(frames.iter().any(|f| f.cluster == alertme_cluster::SECURITY));
    }
}
