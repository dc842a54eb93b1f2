//! LAN discovery protocol.
//!
//! A mobile client broadcasts the ASCII token [`DISCOVER_REQUEST_TOKEN`] to
//! UDP port [`DISCOVERY_PORT`].  Every host that receives it answers the
//! sender directly with a JSON [`DiscoverResponse`].  Any datagram that does
//! not start with the token is ignored.
//!
//! The same identity is also published as a DNS-SD service of type
//! [`MDNS_SERVICE_TYPE`] for clients that browse with zero-config instead of
//! broadcasting.

use serde::{Deserialize, Serialize};

use crate::domain::device::{Device, DeviceId, DeviceKind};

/// Default UDP port the discovery responder listens on.
pub const DISCOVERY_PORT: u16 = 45454;

/// Prefix every discovery request must start with.
pub const DISCOVER_REQUEST_TOKEN: &[u8] = b"LOCALDESK_DISCOVER_REQUEST";

/// Value of the `type` field in a discovery response.
pub const DISCOVER_RESPONSE_TYPE: &str = "LOCALDESK_DISCOVER_RESPONSE";

/// DNS-SD service type under which the host advertises itself.
pub const MDNS_SERVICE_TYPE: &str = "_localdesk._tcp.local.";

/// Protocol version published in the zero-config TXT record.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Returns `true` if `datagram` is a discovery request.
pub fn is_discover_request(datagram: &[u8]) -> bool {
    datagram.starts_with(DISCOVER_REQUEST_TOKEN)
}

/// The JSON document sent back to a probing client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    #[serde(rename = "type")]
    pub message_type: String,
    pub device_id: DeviceId,
    pub device_name: String,
    pub device_type: DeviceKind,
    /// Session channel port.
    pub port: u16,
    /// HTTP bootstrap port, absent on hosts that do not serve one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    /// Milliseconds since the Unix epoch at the time of the reply.
    pub timestamp: u64,
}

impl DiscoverResponse {
    /// Builds the response describing `host`.
    pub fn for_host(host: &Device, http_port: Option<u16>, timestamp_ms: u64) -> Self {
        Self {
            message_type: DISCOVER_RESPONSE_TYPE.to_string(),
            device_id: host.id.clone(),
            device_name: host.name.clone(),
            device_type: host.kind,
            port: host.port,
            http_port,
            timestamp: timestamp_ms,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a response datagram, rejecting documents of any other `type`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(bytes)
            .ok()
            .filter(|r| r.message_type == DISCOVER_RESPONSE_TYPE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Device {
        Device {
            id: DeviceId::new("host-1"),
            name: "Workstation".to_string(),
            kind: DeviceKind::Desktop,
            host: "192.168.1.10".to_string(),
            port: 3100,
        }
    }

    #[test]
    fn test_is_discover_request_matches_prefix() {
        assert!(is_discover_request(b"LOCALDESK_DISCOVER_REQUEST"));
        assert!(is_discover_request(b"LOCALDESK_DISCOVER_REQUEST extra bytes"));
    }

    #[test]
    fn test_is_discover_request_rejects_other_payloads() {
        assert!(!is_discover_request(b""));
        assert!(!is_discover_request(b"LOCALDESK_DISCOVER"));
        assert!(!is_discover_request(b"hello LOCALDESK_DISCOVER_REQUEST"));
        assert!(!is_discover_request(&[0xff, 0x00, 0x12]));
    }

    #[test]
    fn test_discover_response_json_shape() {
        // Arrange
        let response = DiscoverResponse::for_host(&host(), Some(3101), 1_700_000_000_000);

        // Act
        let json: serde_json::Value =
            serde_json::from_slice(&response.to_bytes().unwrap()).unwrap();

        // Assert
        assert_eq!(json["type"], DISCOVER_RESPONSE_TYPE);
        assert_eq!(json["deviceId"], "host-1");
        assert_eq!(json["deviceName"], "Workstation");
        assert_eq!(json["deviceType"], "desktop");
        assert_eq!(json["port"], 3100);
        assert_eq!(json["httpPort"], 3101);
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_discover_response_omits_http_port_when_absent() {
        let response = DiscoverResponse::for_host(&host(), None, 1);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("httpPort").is_none());
    }

    #[test]
    fn test_from_bytes_rejects_foreign_type() {
        let bytes = br#"{"type":"OTHER","deviceId":"a","deviceName":"b","deviceType":"desktop","port":1,"timestamp":2}"#;
        assert!(DiscoverResponse::from_bytes(bytes).is_none());
    }
}
