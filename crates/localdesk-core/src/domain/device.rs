//! Device identities and the durable trust record.
//!
//! A [`DeviceId`] is generated by the mobile client on first launch and sent
//! with every pairing claim.  The host treats it as an opaque string and
//! assumes uniqueness; no authentication is layered on top of it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, client-generated device identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the identity is empty or whitespace only.
    ///
    /// Blank identities cannot be trusted: every claim would collide with
    /// every other blank claim.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The class of device on either end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Desktop,
    /// Phones and tablets.  Mobile clients report their OS (`ios`,
    /// `android`) in the same field; both map here.
    #[default]
    #[serde(alias = "ios", alias = "android")]
    Mobile,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desktop => f.write_str("desktop"),
            Self::Mobile => f.write_str("mobile"),
        }
    }
}

/// A reachable device on the LAN.
///
/// The host describes itself with one of these when answering discovery
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    pub host: String,
    pub port: u16,
}

/// A device the operator has approved.
///
/// Created only by an approved pairing and removed only by an explicit
/// operator action.  The JSON shape (`type` for the kind, camelCase field
/// names) is what `trusted.json` has always contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedDevice {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: DeviceKind,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub added_at: u64,
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

fn default_auto_connect() -> bool {
    true
}

impl TrustedDevice {
    /// Creates a trust record with `auto_connect` enabled.
    pub fn new(id: DeviceId, name: impl Into<String>, kind: DeviceKind, added_at: u64) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            added_at,
            auto_connect: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_device_serializes_kind_as_type_field() {
        // Arrange
        let device = TrustedDevice::new(
            DeviceId::new("phone-1"),
            "Pixel",
            DeviceKind::Mobile,
            1_700_000_000_000,
        );

        // Act
        let json = serde_json::to_value(&device).expect("serialize");

        // Assert
        assert_eq!(json["id"], "phone-1");
        assert_eq!(json["type"], "mobile");
        assert_eq!(json["addedAt"], 1_700_000_000_000u64);
        assert_eq!(json["autoConnect"], true);
    }

    #[test]
    fn test_trusted_device_missing_optional_fields_use_defaults() {
        // Arrange
        let json = r#"{"id":"abc","name":"Old Phone"}"#;

        // Act
        let device: TrustedDevice = serde_json::from_str(json).expect("deserialize");

        // Assert
        assert_eq!(device.kind, DeviceKind::Mobile);
        assert_eq!(device.added_at, 0);
        assert!(device.auto_connect);
    }

    #[test]
    fn test_device_kind_accepts_platform_os_names() {
        let ios: DeviceKind = serde_json::from_str("\"ios\"").unwrap();
        let android: DeviceKind = serde_json::from_str("\"android\"").unwrap();
        let desktop: DeviceKind = serde_json::from_str("\"desktop\"").unwrap();

        assert_eq!(ios, DeviceKind::Mobile);
        assert_eq!(android, DeviceKind::Mobile);
        assert_eq!(desktop, DeviceKind::Desktop);
    }

    #[test]
    fn test_device_kind_rejects_unknown_values() {
        let result: Result<DeviceKind, _> = serde_json::from_str("\"toaster\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_device_id_is_blank_detects_whitespace() {
        assert!(DeviceId::new("").is_blank());
        assert!(DeviceId::new("   ").is_blank());
        assert!(!DeviceId::new("a").is_blank());
    }

    #[test]
    fn test_device_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&DeviceId::new("x-1")).unwrap();
        assert_eq!(json, "\"x-1\"");
    }
}
