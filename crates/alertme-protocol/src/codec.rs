//! AlertMe-over-ZigBee application-layer payload codec (spec §4.1).
//!
//! All multi-byte integers are little-endian. Every payload opens with a
//! message-specific 2-byte preamble and 1-byte cluster command; these are
//! fixed literals on encode and are never verified against inbound data on
//! decode (design note: the preambles are cosmetic for parsing).

use crate::attributes::{ContactState, SwitchState};
use crate::error::CodecError;
use crate::ids::alertme_cmd::*;
use crate::ids::StatusDeviceKind;

fn require_len(rf_data: &[u8], min: usize, what: &str) -> Result<(), CodecError> {
    if rf_data.len() < min {
        return Err(CodecError::MalformedPayload(format!(
            "{what}: need at least {min} bytes, got {}",
            rf_data.len()
        )));
    }
    Ok(())
}

fn require_cmd(rf_data: &[u8], expected: u8, what: &str) -> Result<(), CodecError> {
    if rf_data[2] != expected {
        return Err(CodecError::MalformedPayload(format!(
            "{what}: expected cmd {expected:#04x}, got {:#04x}",
            rf_data[2]
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------

/// `version_info_request`: preamble `11 00`, cmd `FC`, empty payload.
#[must_use]
pub fn encode_version_info_request() -> Vec<u8> {
    vec![0x11, 0x00, VERSION_INFO_REQUEST]
}

/// `version_info_update`: preamble `09 71`, cmd `FE`, u16 HW version LE, 17
/// fixed vendor bytes, then `Manufacturer\nType\nManufactureDate`.
const VERSION_INFO_FIXED_BYTES: [u8; 17] = [
    0xf8, 0xb9, 0xbb, 0x03, 0x00, 0x6f, 0x0d, 0x00, 0x39, 0x10, 0x07, 0x00, 0x00, 0x29, 0x00, 0x01,
    0x0b,
];

pub fn encode_version_info_update(
    hw_version: u16,
    manufacturer: &str,
    model: &str,
    manufacture_date: &str,
) -> Result<Vec<u8>, CodecError> {
    if manufacturer.is_empty() || model.is_empty() || manufacture_date.is_empty() {
        return Err(CodecError::BadParameter(
            "manufacturer, model and manufacture_date are all required".into(),
        ));
    }
    let mut out = vec![0x09, 0x71, VERSION_INFO_UPDATE];
    out.extend_from_slice(&hw_version.to_le_bytes());
    out.extend_from_slice(&VERSION_INFO_FIXED_BYTES);
    out.extend_from_slice(format!("{manufacturer}\n{model}\n{manufacture_date}").as_bytes());
    Ok(out)
}

/// `range_update`: preamble `09 2B`, cmd `FD`, u8 RSSI, 1 padding byte.
#[must_use]
pub fn encode_range_update(rssi: u8) -> Vec<u8> {
    vec![0x09, 0x2B, RANGE_UPDATE, rssi, 0x00]
}

/// `power_demand_update`: preamble `09 6A`, cmd `81`, u16 power (W) LE.
#[must_use]
pub fn encode_power_demand_update(power_w: u16) -> Vec<u8> {
    let mut out = vec![0x09, 0x6A, POWER_DEMAND_UPDATE];
    out.extend_from_slice(&power_w.to_le_bytes());
    out
}

/// `power_consumption_update`: preamble `09 6E`, cmd `82`, u32 consumption
/// (Wh) LE, u32 uptime (s) LE, 1 trailing byte.
#[must_use]
pub fn encode_power_consumption_update(consumption_wh: u32, uptime_s: u32) -> Vec<u8> {
    let mut out = vec![0x09, 0x6E, POWER_CONSUMPTION_UPDATE];
    out.extend_from_slice(&consumption_wh.to_le_bytes());
    out.extend_from_slice(&uptime_s.to_le_bytes());
    out.push(0x00);
    out
}

/// `mode_change_request`: preamble `11 00`, cmd `FA`, 2-byte mode selector.
pub fn encode_mode_change_request(mode: &str) -> Result<Vec<u8>, CodecError> {
    let selector: [u8; 2] = match mode {
        "Normal" => [0x00, 0x01],
        "RangeTest" => [0x01, 0x01],
        "Locked" => [0x02, 0x01],
        "Silent" => [0x03, 0x01],
        other => return Err(CodecError::UnknownEnum(other.to_string())),
    };
    let mut out = vec![0x11, 0x00, MODE_CHANGE_REQUEST];
    out.extend_from_slice(&selector);
    Ok(out)
}

/// `switch_state_request`: preamble `11 00`; cmd `01` for a query, `02` for
/// a set. `set_on` is ignored (and must be `None`) for a query.
pub fn encode_switch_state_request(
    query: bool,
    set_on: Option<bool>,
) -> Result<Vec<u8>, CodecError> {
    if query && set_on.is_some() {
        return Err(CodecError::BadParameter(
            "switch_state_request: set_on must be None for a query".into(),
        ));
    }
    let mut out = vec![0x11, 0x00];
    if query {
        out.push(SWITCH_STATE_QUERY);
        out.push(0x01);
    } else {
        out.push(SWITCH_STATE_SET);
        match set_on {
            Some(true) => out.extend_from_slice(&[0x01, 0x01]),
            Some(false) => out.extend_from_slice(&[0x00, 0x01]),
            None => {
                return Err(CodecError::BadParameter(
                    "switch_state_request: set_on is required unless query".into(),
                ))
            }
        }
    }
    Ok(out)
}

/// `switch_state_update`: preamble `09 68`, cmd `80`, `07 01` on / `06 00` off.
#[must_use]
pub fn encode_switch_state_update(state: SwitchState) -> Vec<u8> {
    let mut out = vec![0x09, 0x68, SWITCH_STATE_UPDATE];
    match state {
        SwitchState::On => out.extend_from_slice(&[0x07, 0x01]),
        SwitchState::Off => out.extend_from_slice(&[0x06, 0x00]),
    }
    out
}

/// `security_init`: preamble `11 80`, cmd `00`, payload `00 05`.
#[must_use]
pub fn encode_security_init() -> Vec<u8> {
    vec![0x11, 0x80, SECURITY_INIT, 0x00, 0x05]
}

// ---------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------

/// Decoded version info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub hw_version: u16,
    pub manufacturer: String,
    pub model: String,
    pub manufacture_date: String,
}

/// Separator bytes the legacy firmware uses in place of `\n`.
const VERSION_SEPARATORS: [u8; 7] = [0x09, 0x0D, 0x0E, 0x0B, 0x06, 0x04, 0x12];

fn normalize_version_separators(raw: &[u8]) -> String {
    let normalized: Vec<u8> = raw
        .iter()
        .map(|&b| if VERSION_SEPARATORS.contains(&b) { b'\n' } else { b })
        .collect();
    String::from_utf8_lossy(&normalized).into_owned()
}

pub fn parse_version_info_update(rf_data: &[u8]) -> Result<VersionInfo, CodecError> {
    require_len(rf_data, 22, "version info")?;
    require_cmd(rf_data, VERSION_INFO_UPDATE, "version info")?;
    let hw_version = u16::from_le_bytes([rf_data[3], rf_data[4]]);
    let text = normalize_version_separators(&rf_data[22..]);
    let mut fields = text.splitn(3, '\n');
    let manufacturer = fields.next().unwrap_or_default().to_string();
    let model = fields.next().unwrap_or_default().to_string();
    let manufacture_date = fields.next().unwrap_or_default().to_string();
    if manufacturer.is_empty() || model.is_empty() {
        return Err(CodecError::MalformedPayload(
            "version info: expected Manufacturer\\nType\\nManufactureDate".into(),
        ));
    }
    Ok(VersionInfo {
        hw_version,
        manufacturer,
        model,
        manufacture_date,
    })
}

/// `{RSSI: n}`
pub fn parse_range_info_update(rf_data: &[u8]) -> Result<u8, CodecError> {
    require_len(rf_data, 4, "range info")?;
    require_cmd(rf_data, RANGE_UPDATE, "range info")?;
    Ok(rf_data[3])
}

/// `{instantaneousPower: n}` (watts)
pub fn parse_power_demand(rf_data: &[u8]) -> Result<u16, CodecError> {
    require_len(rf_data, 5, "power demand")?;
    require_cmd(rf_data, POWER_DEMAND_UPDATE, "power demand")?;
    Ok(u16::from_le_bytes([rf_data[3], rf_data[4]]))
}

/// `{PowerConsumption, UpTime}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerConsumption {
    pub consumption_wh: u32,
    pub uptime_s: u32,
}

pub fn parse_power_consumption(rf_data: &[u8]) -> Result<PowerConsumption, CodecError> {
    require_len(rf_data, 11, "power consumption")?;
    require_cmd(rf_data, POWER_CONSUMPTION_UPDATE, "power consumption")?;
    let consumption_wh = u32::from_le_bytes([rf_data[3], rf_data[4], rf_data[5], rf_data[6]]);
    let uptime_s = u32::from_le_bytes([rf_data[7], rf_data[8], rf_data[9], rf_data[10]]);
    Ok(PowerConsumption {
        consumption_wh,
        uptime_s,
    })
}

/// `{state: 'ON'|'OFF'}`
pub fn parse_switch_state_update(rf_data: &[u8]) -> Result<SwitchState, CodecError> {
    require_len(rf_data, 5, "switch state update")?;
    require_cmd(rf_data, SWITCH_STATE_UPDATE, "switch state update")?;
    Ok(if rf_data[4] & 0x01 != 0 {
        SwitchState::On
    } else {
        SwitchState::Off
    })
}

/// `{state, counter}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub state: SwitchState,
    pub counter: u16,
}

pub fn parse_button_press(rf_data: &[u8]) -> Result<ButtonPress, CodecError> {
    require_len(rf_data, 7, "button press")?;
    let state = if rf_data[2] == 0x01 {
        SwitchState::On
    } else {
        SwitchState::Off
    };
    let counter = u16::from_le_bytes([rf_data[5], rf_data[6]]);
    Ok(ButtonPress { state, counter })
}

/// Tamper cluster: `1` if tamper open, `0` if closed.
pub fn parse_tamper_state(rf_data: &[u8]) -> Result<ContactState, CodecError> {
    require_len(rf_data, 4, "tamper state")?;
    Ok(if rf_data[3] == 0x02 {
        ContactState::Open
    } else {
        ContactState::Closed
    })
}

/// `{ReedSwitch, TamperSwitch}` from the dedicated security cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityDeviceState {
    pub reed_switch: ContactState,
    pub tamper_switch: ContactState,
}

pub fn parse_security_device_state(rf_data: &[u8]) -> Result<SecurityDeviceState, CodecError> {
    require_len(rf_data, 4, "security device state")?;
    let bits = rf_data[3];
    let reed_switch = if bits & 0x01 != 0 {
        ContactState::Open
    } else {
        ContactState::Closed
    };
    let tamper_switch = if bits & 0x04 != 0 {
        ContactState::Closed
    } else {
        ContactState::Open
    };
    Ok(SecurityDeviceState {
        reed_switch,
        tamper_switch,
    })
}

fn centi_celsius_to_fahrenheit(raw: i16) -> f32 {
    f32::from(raw) * 0.018 + 32.0
}

/// `{Type, ...}` status update, keyed by device-type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    PowerClamp,
    PowerSwitch,
    KeyFob {
        counter: u32,
        temperature_f: f32,
    },
    DoorSensor {
        reed_switch: ContactState,
        tamper_switch: ContactState,
        temperature_f: Option<f32>,
    },
}

pub fn parse_status_update(rf_data: &[u8]) -> Result<StatusUpdate, CodecError> {
    require_len(rf_data, 4, "status update")?;
    require_cmd(rf_data, STATUS_UPDATE, "status update")?;
    let kind = StatusDeviceKind::from_byte(rf_data[3])
        .ok_or_else(|| CodecError::MalformedPayload(format!("unknown status device type {:#04x}", rf_data[3])))?;
    match kind {
        StatusDeviceKind::PowerClamp => Ok(StatusUpdate::PowerClamp),
        StatusDeviceKind::PowerSwitch => Ok(StatusUpdate::PowerSwitch),
        StatusDeviceKind::KeyFob => {
            require_len(rf_data, 10, "status update (key fob)")?;
            let counter = u32::from_le_bytes([rf_data[4], rf_data[5], rf_data[6], rf_data[7]]);
            let raw_temp = i16::from_le_bytes([rf_data[8], rf_data[9]]);
            Ok(StatusUpdate::KeyFob {
                counter,
                temperature_f: centi_celsius_to_fahrenheit(raw_temp),
            })
        }
        StatusDeviceKind::DoorSensorNoTemp | StatusDeviceKind::DoorSensorWithTemp => {
            require_len(rf_data, 16, "status update (door sensor)")?;
            let bits = rf_data[rf_data.len() - 1];
            let reed_switch = if bits & 0x01 != 0 {
                ContactState::Closed
            } else {
                ContactState::Open
            };
            let tamper_switch = if bits & 0x02 != 0 {
                ContactState::Closed
            } else {
                ContactState::Open
            };
            let temperature_f = if kind == StatusDeviceKind::DoorSensorWithTemp {
                let raw_temp = i16::from_le_bytes([rf_data[8], rf_data[9]]);
                Some(centi_celsius_to_fahrenheit(raw_temp))
            } else {
                None
            };
            Ok(StatusUpdate::DoorSensor {
                reed_switch,
                tamper_switch,
                temperature_f,
            })
        }
    }
}
