//! ZDP (ZigBee Device Profile) frame layouts this engine exercises (spec §6).
//!
//! Short addresses and profile IDs embedded in these payloads are
//! little-endian, independent of how the surrounding cluster/profile
//! constants are usually written (big-endian hex pairs).

use crate::error::CodecError;

/// `Sequence(1) | NetAddrLE(2)`
#[must_use]
pub fn encode_active_endpoints_request(sequence: u8, net_addr: u16) -> Vec<u8> {
    let mut out = vec![sequence];
    out.extend_from_slice(&net_addr.to_le_bytes());
    out
}

/// A parsed Match Descriptor Request, as sent by a device trying to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDescriptorRequest {
    pub sequence: u8,
    pub net_addr: u16,
    pub profile_id: u16,
    pub in_clusters: Vec<u16>,
    pub out_clusters: Vec<u16>,
}

/// `Sequence(1) | NetAddrLE(2) | ProfileIdLE(2) | NumIn(1) | InList(2*NumIn)
/// | NumOut(1) | OutList(2*NumOut)`
pub fn parse_match_descriptor_request(data: &[u8]) -> Result<MatchDescriptorRequest, CodecError> {
    if data.len() < 6 {
        return Err(CodecError::MalformedPayload(format!(
            "match descriptor request: need at least 6 bytes, got {}",
            data.len()
        )));
    }
    let sequence = data[0];
    let net_addr = u16::from_le_bytes([data[1], data[2]]);
    let profile_id = u16::from_le_bytes([data[3], data[4]]);
    let mut idx = 5;

    let num_in = data[idx] as usize;
    idx += 1;
    let in_end = idx + 2 * num_in;
    if data.len() < in_end + 1 {
        return Err(CodecError::MalformedPayload(
            "match descriptor request: truncated input cluster list".into(),
        ));
    }
    let in_clusters = data[idx..in_end]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    idx = in_end;

    let num_out = data[idx] as usize;
    idx += 1;
    let out_end = idx + 2 * num_out;
    if data.len() < out_end {
        return Err(CodecError::MalformedPayload(
            "match descriptor request: truncated output cluster list".into(),
        ));
    }
    let out_clusters = data[idx..out_end]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    Ok(MatchDescriptorRequest {
        sequence,
        net_addr,
        profile_id,
        in_clusters,
        out_clusters,
    })
}

/// `Sequence(1) | Status(1) | NetAddrLE(2) | Length(1) | EndpointList(Length)`
#[must_use]
pub fn encode_match_descriptor_response(sequence: u8, status: u8, net_addr: u16, endpoints: &[u8]) -> Vec<u8> {
    let mut out = vec![sequence, status];
    out.extend_from_slice(&net_addr.to_le_bytes());
    out.push(endpoints.len() as u8);
    out.extend_from_slice(endpoints);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_endpoints_request_layout() {
        let encoded = encode_active_endpoints_request(0x42, 0xBEEF);
        assert_eq!(encoded, vec![0x42, 0xEF, 0xBE]);
    }

    #[test]
    fn match_descriptor_request_round_trip() {
        let mut data = vec![0x01, 0xAD, 0xDE, 0x04, 0x01, 0x02];
        data.extend_from_slice(&0x0006u16.to_le_bytes());
        data.extend_from_slice(&0x0000u16.to_le_bytes());
        data.push(0x00);
        let parsed = parse_match_descriptor_request(&data).unwrap();
        assert_eq!(parsed.sequence, 0x01);
        assert_eq!(parsed.net_addr, 0xDEAD);
        assert_eq!(parsed.profile_id, 0x0104);
        assert_eq!(parsed.in_clusters, vec![0x0006, 0x0000]);
        assert!(parsed.out_clusters.is_empty());
    }

    #[test]
    fn match_descriptor_response_layout() {
        let encoded = encode_match_descriptor_response(0x01, 0x00, 0xDEAD, &[0x02]);
        assert_eq!(encoded, vec![0x01, 0x00, 0xAD, 0xDE, 0x01, 0x02]);
    }
}
