//! Registry of authorized, live connections.
//!
//! An [`ActiveSession`] binds a connection to the device identity it proved
//! through pairing.  The registry enforces one session per device: when a
//! device registers again (reconnect, second phone with a copied id), every
//! earlier session for that device is removed and its connection closed.
//!
//! Authorization is always evaluated against the current trust store, so a
//! device whose trust was revoked loses the right to run commands even while
//! its connection stays open.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use localdesk_core::{DeviceId, ServerMessage};

use super::connection::{ConnectionHandle, ConnectionId};
use super::trust::TrustStore;

#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub connection_id: ConnectionId,
    pub device_id: DeviceId,
    pub device_name: String,
    pub handle: ConnectionHandle,
    /// Milliseconds since the Unix epoch.
    pub connected_at: u64,
}

/// Operator-facing view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub connection_id: String,
    pub device_id: DeviceId,
    pub device_name: String,
    pub connected_at: u64,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_connection: HashMap<ConnectionId, ActiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` after evicting every other session of the same
    /// device.  Evicted connections are closed; the evicted sessions are
    /// returned so callers can clean up state keyed by their connection.
    pub fn register(&mut self, session: ActiveSession) -> Vec<ActiveSession> {
        let evicted = self.evict_device(&session.device_id, Some(session.connection_id));
        info!(
            "session registered: device={} connection={}",
            session.device_id, session.connection_id
        );
        self.by_connection.insert(session.connection_id, session);
        evicted
    }

    /// Removes and closes all sessions of `device_id` except the one on
    /// `keep`, which is removed without being closed.
    pub fn evict_device(
        &mut self,
        device_id: &DeviceId,
        keep: Option<ConnectionId>,
    ) -> Vec<ActiveSession> {
        let stale: Vec<ConnectionId> = self
            .by_connection
            .values()
            .filter(|s| &s.device_id == device_id)
            .map(|s| s.connection_id)
            .collect();

        let mut evicted = Vec::new();
        for id in stale {
            if let Some(session) = self.by_connection.remove(&id) {
                if Some(id) != keep {
                    info!("evicting session {id} of device {device_id}");
                    session.handle.close();
                    evicted.push(session);
                }
            }
        }
        evicted
    }

    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<ActiveSession> {
        self.by_connection.remove(&connection_id)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ActiveSession> {
        self.by_connection.get(&connection_id)
    }

    /// A connection is authorized iff it has a session and that session's
    /// device is currently trusted.
    pub fn is_authorized(&self, connection_id: ConnectionId, trust: &TrustStore) -> bool {
        self.by_connection
            .get(&connection_id)
            .is_some_and(|s| trust.is_trusted(&s.device_id))
    }

    /// Queues `msg` on every live session whose device is still trusted.
    /// Returns the number reached.
    pub fn broadcast(&self, msg: &ServerMessage, trust: &TrustStore) -> usize {
        self.by_connection
            .values()
            .filter(|s| trust.is_trusted(&s.device_id))
            .filter(|s| s.handle.send(msg.clone()))
            .count()
    }

    pub fn sessions_for(&self, device_id: &DeviceId) -> usize {
        self.by_connection
            .values()
            .filter(|s| &s.device_id == device_id)
            .count()
    }

    /// Sessions ordered by connection time.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .by_connection
            .values()
            .map(|s| SessionSummary {
                connection_id: s.connection_id.to_string(),
                device_id: s.device_id.clone(),
                device_name: s.device_name.clone(),
                connected_at: s.connected_at,
            })
            .collect();
        out.sort_by_key(|s| s.connected_at);
        out
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection::OutboundQueue;
    use localdesk_core::{DeviceKind, TrustedDevice};

    fn session(device: &str) -> (ActiveSession, OutboundQueue) {
        let id = ConnectionId::new();
        let (handle, queue) = ConnectionHandle::channel(id);
        (
            ActiveSession {
                connection_id: id,
                device_id: DeviceId::new(device),
                device_name: device.to_uppercase(),
                handle,
                connected_at: 0,
            },
            queue,
        )
    }

    fn trusting(ids: &[&str]) -> TrustStore {
        TrustStore::new(
            ids.iter()
                .map(|id| TrustedDevice::new(DeviceId::new(*id), *id, DeviceKind::Mobile, 0))
                .collect(),
        )
    }

    #[test]
    fn test_register_evicts_and_closes_prior_session_of_same_device() {
        // Arrange
        let mut registry = SessionRegistry::new();
        let (first, _q1) = session("phone");
        let first_handle = first.handle.clone();
        let (second, _q2) = session("phone");
        let second_id = second.connection_id;
        registry.register(first);

        // Act
        let evicted = registry.register(second);

        // Assert
        assert_eq!(evicted.len(), 1);
        assert!(!first_handle.is_live(), "evicted connection must be closed");
        assert_eq!(registry.len(), 1);
        assert!(registry.get(second_id).is_some());
        assert_eq!(registry.sessions_for(&DeviceId::new("phone")), 1);
    }

    #[test]
    fn test_register_same_connection_twice_does_not_close_it() {
        let mut registry = SessionRegistry::new();
        let (s, _q) = session("phone");
        let handle = s.handle.clone();

        registry.register(s.clone());
        let evicted = registry.register(s);

        assert!(evicted.is_empty());
        assert!(handle.is_live());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sessions_of_different_devices_coexist() {
        let mut registry = SessionRegistry::new();
        let (a, _qa) = session("a");
        let (b, _qb) = session("b");

        registry.register(a);
        registry.register(b);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_is_authorized_requires_session_and_trust() {
        // Arrange
        let mut registry = SessionRegistry::new();
        let (s, _q) = session("phone");
        let id = s.connection_id;
        registry.register(s);

        // Act / Assert
        assert!(registry.is_authorized(id, &trusting(&["phone"])));
        assert!(!registry.is_authorized(id, &trusting(&[])));
        assert!(!registry.is_authorized(ConnectionId::new(), &trusting(&["phone"])));
    }

    #[test]
    fn test_unregister_removes_session() {
        let mut registry = SessionRegistry::new();
        let (s, _q) = session("phone");
        let id = s.connection_id;
        registry.register(s);

        assert!(registry.unregister(id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_only_live_sessions() {
        // Arrange
        let mut registry = SessionRegistry::new();
        let (a, mut qa) = session("a");
        let (b, qb) = session("b");
        registry.register(a);
        registry.register(b);
        drop(qb);

        // Act
        let reached = registry.broadcast(&ServerMessage::error("hello"), &trusting(&["a", "b"]));

        // Assert
        assert_eq!(reached, 1);
        assert_eq!(qa.rx.try_recv().unwrap(), ServerMessage::error("hello"));
    }

    #[test]
    fn test_broadcast_skips_sessions_of_revoked_devices() {
        // Arrange
        let mut registry = SessionRegistry::new();
        let (kept, mut q_kept) = session("kept");
        let (revoked, mut q_revoked) = session("revoked");
        registry.register(kept);
        registry.register(revoked);

        // Act
        let reached = registry.broadcast(&ServerMessage::error("hello"), &trusting(&["kept"]));

        // Assert
        assert_eq!(reached, 1);
        assert!(q_kept.rx.try_recv().is_ok());
        assert!(q_revoked.rx.try_recv().is_err(), "revoked device must not be reached");
    }
}
