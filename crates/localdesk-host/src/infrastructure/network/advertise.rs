//! Zero-config (mDNS / DNS-SD) advertisement.
//!
//! Publishes the host as `<device name>._localdesk._tcp.local.` on the
//! session port, with a TXT record carrying the device id, kind, protocol
//! version and HTTP port.  Clients that browse instead of broadcasting find
//! the host this way.
//!
//! Advertisement is best effort: if the multicast daemon cannot start or the
//! record cannot be registered, the host logs a warning and keeps serving
//! UDP discovery.

use std::collections::HashMap;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use thiserror::Error;
use tracing::{debug, info, warn};

use localdesk_core::{protocol::discovery::PROTOCOL_VERSION, Device, MDNS_SERVICE_TYPE};

/// Error type for zero-config advertisement.
#[derive(Debug, Error)]
pub enum AdvertiseError {
    #[error("mDNS daemon failed to start: {0}")]
    Daemon(#[source] mdns_sd::Error),

    #[error("invalid mDNS service record: {0}")]
    Record(#[source] mdns_sd::Error),

    #[error("mDNS registration failed: {0}")]
    Register(#[source] mdns_sd::Error),
}

/// A registered service record.  Call [`MdnsAdvertiser::shutdown`] to
/// withdraw it.
pub struct MdnsAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

impl MdnsAdvertiser {
    /// Registers `host` under [`MDNS_SERVICE_TYPE`].
    ///
    /// # Errors
    ///
    /// Returns an [`AdvertiseError`] if the daemon cannot be started or the
    /// record is rejected.
    pub fn register(host: &Device) -> Result<Self, AdvertiseError> {
        let daemon = ServiceDaemon::new().map_err(AdvertiseError::Daemon)?;

        let instance = instance_name(&host.name);
        let host_name = format!("{}.local.", instance.replace(' ', "-"));
        let info = ServiceInfo::new(
            MDNS_SERVICE_TYPE,
            &instance,
            &host_name,
            "",
            host.port,
            txt_properties(host),
        )
        .map_err(AdvertiseError::Record)?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();
        daemon.register(info).map_err(AdvertiseError::Register)?;
        info!("advertising {fullname} on port {}", host.port);

        Ok(Self { daemon, fullname })
    }

    /// Withdraws the record and stops the daemon.
    pub fn shutdown(self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!("failed to unregister {}: {e}", self.fullname);
        }
        match self.daemon.shutdown() {
            Ok(_) => debug!("mDNS daemon stopped"),
            Err(e) => warn!("failed to stop mDNS daemon: {e}"),
        }
    }
}

/// DNS labels are limited to 63 bytes and must not contain dots.
fn instance_name(device_name: &str) -> String {
    let cleaned: String = device_name
        .trim()
        .chars()
        .map(|c| if c == '.' { '-' } else { c })
        .collect();
    let mut name = if cleaned.is_empty() {
        "LocalDesk".to_string()
    } else {
        cleaned
    };
    while name.len() > 63 {
        name.pop();
    }
    name
}

/// `httpPort` repeats the service port, which also serves the HTTP surface.
fn txt_properties(host: &Device) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert("deviceId".to_string(), host.id.to_string());
    props.insert("deviceType".to_string(), host.kind.to_string());
    props.insert("version".to_string(), PROTOCOL_VERSION.to_string());
    props.insert("httpPort".to_string(), host.port.to_string());
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdesk_core::{DeviceId, DeviceKind};

    #[test]
    fn test_instance_name_strips_dots_and_defaults() {
        assert_eq!(instance_name("my.desk"), "my-desk");
        assert_eq!(instance_name("   "), "LocalDesk");
        assert_eq!(instance_name(&"x".repeat(80)).len(), 63);
    }

    #[test]
    fn test_txt_record_carries_identity() {
        // Arrange
        let host = Device {
            id: DeviceId::new("host-1"),
            name: "Desk".to_string(),
            kind: DeviceKind::Desktop,
            host: String::new(),
            port: 3100,
        };

        // Act
        let props = txt_properties(&host);

        // Assert
        assert_eq!(props["deviceId"], "host-1");
        assert_eq!(props["deviceType"], "desktop");
        assert_eq!(props["httpPort"], "3100");
        assert_eq!(props["version"], PROTOCOL_VERSION);
    }
}
