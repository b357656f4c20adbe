//! Typed attribute values produced by the payload codec.
//!
//! The legacy source keeps an untyped key-value attribute bag; per the
//! design notes, this is modeled here as a tagged union so the registry
//! holds a `HashMap<String, AttributeEntry>` of known shapes rather than
//! `HashMap<String, serde_json::Value>`. Decoders return their own small
//! typed structs (see `codec.rs`); `AttributeValue` is what those structs
//! are converted into right before they're merged into a node's attribute
//! map, using the canonical key names fixed in SPEC_FULL.md.

use serde::{Deserialize, Serialize};

/// On/off state as reported by the switch cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchState::On => "ON",
            SwitchState::Off => "OFF",
        }
    }
}

/// Reed/tamper contact state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactState {
    Open,
    Closed,
}

impl ContactState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContactState::Open => "open",
            ContactState::Closed => "closed",
        }
    }
}

/// A single decoded attribute value, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AttributeValue {
    SwitchState(SwitchState),
    Counter(u32),
    Rssi(u8),
    InstantaneousPower(u16),
    PowerConsumption(u32),
    UpTime(u32),
    TemperatureFahrenheit(f32),
    ReedSwitch(ContactState),
    TamperSwitch(ContactState),
    DeviceTypeLabel(String),
    HwVersion(u16),
    Manufacturer(String),
    Model(String),
    ManufactureDate(String),
}

/// A reported attribute together with the time it was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub reported_value: AttributeValue,
    pub report_received_time: u64,
}
