//! Pairing: turning a device's claim into trust.
//!
//! Per device identity the flow is
//!
//! ```text
//! Unknown ──claim──▶ PendingApproval ──approve──▶ Trusted
//!                           │
//!                           └──────reject──────▶ Rejected (no record kept)
//! Trusted ──claim──▶ Trusted   (auto-grant, operator not involved)
//! ```
//!
//! A claim from an unknown device parks a [`PendingPairing`] holding the
//! claimant's connection and notifies the operator through an
//! [`ApprovalSink`].  The operator's decision, delivered through
//! [`PairingCoordinator::resolve_claim`], consumes the pending entry whether
//! it approves or rejects.
//!
//! Pending entries do not expire.  One is replaced when the same device
//! claims again and discarded when its connection disconnects.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use localdesk_core::{
    protocol::session::{PairRequest, PairResponse},
    DeviceId, DeviceKind, ServerMessage, TrustedDevice,
};

use super::connection::{ConnectionHandle, ConnectionId};
use super::sessions::ActiveSession;
use super::state::{now_ms, HostState};

/// Error type for pairing decisions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    /// No pending request exists for the device (never requested, or already
    /// resolved).
    #[error("no pending pairing for device {device_id}")]
    NotFound { device_id: DeviceId },
}

/// A claim awaiting the operator's decision.
#[derive(Debug, Clone)]
pub struct PendingPairing {
    pub device_id: DeviceId,
    pub device_name: String,
    pub device_kind: DeviceKind,
    pub handle: ConnectionHandle,
    /// Milliseconds since the Unix epoch.
    pub requested_at: u64,
}

/// What the operator is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub device_id: DeviceId,
    pub device_name: String,
    pub device_type: DeviceKind,
    pub requested_at: u64,
}

impl From<&PendingPairing> for ApprovalRequest {
    fn from(p: &PendingPairing) -> Self {
        Self {
            device_id: p.device_id.clone(),
            device_name: p.device_name.clone(),
            device_type: p.device_kind,
            requested_at: p.requested_at,
        }
    }
}

/// Delivers approval requests to whoever decides them.
///
/// Implementations must not block; the coordinator calls this with the
/// registries lock held.
pub trait ApprovalSink: Send + Sync {
    fn request_approval(&self, request: ApprovalRequest);
}

/// Pending pairings keyed by device.
#[derive(Debug, Default)]
pub struct PendingPairings {
    by_device: HashMap<DeviceId, PendingPairing>,
}

impl PendingPairings {
    /// Inserts `pending`, returning the entry it replaced.
    pub fn insert(&mut self, pending: PendingPairing) -> Option<PendingPairing> {
        self.by_device.insert(pending.device_id.clone(), pending)
    }

    pub fn take(&mut self, device_id: &DeviceId) -> Option<PendingPairing> {
        self.by_device.remove(device_id)
    }

    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.by_device.contains_key(device_id)
    }

    /// Drops every entry held by `connection`.
    pub fn remove_for_connection(&mut self, connection: ConnectionId) -> Vec<PendingPairing> {
        let ids: Vec<DeviceId> = self
            .by_device
            .values()
            .filter(|p| p.handle.id() == connection)
            .map(|p| p.device_id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| self.by_device.remove(id))
            .collect()
    }

    /// Pending requests, oldest first.
    pub fn list(&self) -> Vec<ApprovalRequest> {
        let mut out: Vec<ApprovalRequest> =
            self.by_device.values().map(ApprovalRequest::from).collect();
        out.sort_by_key(|r| r.requested_at);
        out
    }

    pub fn len(&self) -> usize {
        self.by_device.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }
}

/// Result of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The device was already trusted; the session is live.
    AutoGranted,
    /// The operator has been asked.
    AwaitingApproval,
}

/// Result of an operator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `delivered` is `false` if the claimant had already disconnected; the
    /// device is trusted regardless.
    Approved { delivered: bool },
    Rejected { delivered: bool },
}

pub struct PairingCoordinator {
    state: Arc<HostState>,
}

impl PairingCoordinator {
    pub fn new(state: Arc<HostState>) -> Self {
        Self { state }
    }

    /// Handles a `pair-request` received on `handle`.
    ///
    /// Any existing session of the claimed device is terminated first.  A
    /// trusted device is then granted immediately and receives the page set;
    /// an unknown device is parked for operator approval and receives
    /// nothing yet.
    pub async fn submit_claim(&self, claim: PairRequest, handle: &ConnectionHandle) -> ClaimOutcome {
        let mut reg = self.state.registries().await;
        reg.sessions.evict_device(&claim.device_id, Some(handle.id()));

        if reg.trust.is_trusted(&claim.device_id) {
            info!(
                "trusted device {} ({}) reconnected; auto-granting",
                claim.device_id, claim.device_name
            );
            grant(&mut reg, handle, &claim.device_id, &claim.device_name);
            handle.send(ServerMessage::PairResponse(PairResponse::auto_granted()));
            push_pages(&reg.pages, handle);
            return ClaimOutcome::AutoGranted;
        }

        let pending = PendingPairing {
            device_id: claim.device_id.clone(),
            device_name: claim.device_name,
            device_kind: claim.device_type,
            handle: handle.clone(),
            requested_at: now_ms(),
        };
        let request = ApprovalRequest::from(&pending);
        if let Some(previous) = reg.pending.insert(pending) {
            debug!(
                "replaced pending pairing of {} held by connection {}",
                previous.device_id,
                previous.handle.id()
            );
        }
        info!(
            "pairing requested by {} ({}); awaiting operator",
            request.device_id, request.device_name
        );
        self.state.approvals().request_approval(request);
        ClaimOutcome::AwaitingApproval
    }

    /// Applies the operator's decision for `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::NotFound`] if no request is pending for the
    /// device, including when it was already resolved.
    pub async fn resolve_claim(
        &self,
        device_id: &DeviceId,
        approved: bool,
    ) -> Result<Resolution, PairingError> {
        let mut reg = self.state.registries().await;
        let pending = reg
            .pending
            .take(device_id)
            .ok_or_else(|| PairingError::NotFound {
                device_id: device_id.clone(),
            })?;
        let live = pending.handle.is_live();

        if !approved {
            info!("pairing rejected for {device_id}");
            if live {
                pending
                    .handle
                    .send(ServerMessage::PairResponse(PairResponse::rejected()));
            }
            return Ok(Resolution::Rejected { delivered: live });
        }

        reg.trust.insert(TrustedDevice::new(
            pending.device_id.clone(),
            pending.device_name.clone(),
            pending.device_kind,
            now_ms(),
        ));
        self.state.persist_trust(&reg.trust);
        info!("pairing approved for {device_id}");

        if live {
            grant(
                &mut reg,
                &pending.handle,
                &pending.device_id,
                &pending.device_name,
            );
            pending
                .handle
                .send(ServerMessage::PairResponse(PairResponse::approved()));
            push_pages(&reg.pages, &pending.handle);
        }
        Ok(Resolution::Approved { delivered: live })
    }

    /// Pending requests, oldest first.
    pub async fn pending(&self) -> Vec<ApprovalRequest> {
        self.state.registries().await.pending.list()
    }
}

fn grant(
    reg: &mut super::state::Registries,
    handle: &ConnectionHandle,
    device_id: &DeviceId,
    device_name: &str,
) {
    reg.sessions.register(ActiveSession {
        connection_id: handle.id(),
        device_id: device_id.clone(),
        device_name: device_name.to_string(),
        handle: handle.clone(),
        connected_at: now_ms(),
    });
}

fn push_pages(pages: &[localdesk_core::Page], handle: &ConnectionHandle) {
    for msg in ServerMessage::page_updates(pages) {
        handle.send(msg);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{drain, TestHost};

    fn claim(id: &str) -> PairRequest {
        PairRequest {
            device_id: DeviceId::new(id),
            device_name: format!("{id}-name"),
            device_type: DeviceKind::Mobile,
        }
    }

    #[tokio::test]
    async fn test_unknown_device_claim_awaits_approval_and_notifies_sink() {
        // Arrange
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, mut queue) = host.connect();

        // Act
        let outcome = coordinator.submit_claim(claim("d1"), &handle).await;

        // Assert
        assert_eq!(outcome, ClaimOutcome::AwaitingApproval);
        assert!(drain(&mut queue).is_empty(), "no reply before a decision");
        let requests = host.approvals.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].device_id, DeviceId::new("d1"));
        assert_eq!(coordinator.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn test_approval_trusts_device_registers_session_and_pushes_pages() {
        // Arrange
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, mut queue) = host.connect();
        coordinator.submit_claim(claim("d1"), &handle).await;

        // Act
        let resolution = coordinator
            .resolve_claim(&DeviceId::new("d1"), true)
            .await
            .expect("pending must exist");

        // Assert
        assert_eq!(resolution, Resolution::Approved { delivered: true });
        let msgs = drain(&mut queue);
        assert_eq!(
            msgs[0],
            ServerMessage::PairResponse(PairResponse::approved())
        );
        assert!(matches!(msgs[1], ServerMessage::PagesUpdate(_)));
        assert!(matches!(msgs[2], ServerMessage::ShortcutsUpdate(_)));

        let reg = host.state.registries().await;
        assert!(reg.trust.is_trusted(&DeviceId::new("d1")));
        assert!(reg.sessions.is_authorized(handle.id(), &reg.trust));
        assert!(reg.pending.is_empty());
        drop(reg);
        assert_eq!(host.trust_snapshots.count(), 1, "trust set persisted once");
    }

    #[tokio::test]
    async fn test_second_resolution_returns_not_found() {
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, _queue) = host.connect();
        coordinator.submit_claim(claim("d1"), &handle).await;

        coordinator
            .resolve_claim(&DeviceId::new("d1"), true)
            .await
            .unwrap();
        let again = coordinator.resolve_claim(&DeviceId::new("d1"), true).await;

        assert_eq!(
            again,
            Err(PairingError::NotFound {
                device_id: DeviceId::new("d1")
            })
        );
    }

    #[tokio::test]
    async fn test_resolve_without_request_is_not_found() {
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());

        let result = coordinator.resolve_claim(&DeviceId::new("ghost"), false).await;

        assert!(matches!(result, Err(PairingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_rejection_replies_failure_and_leaves_trust_untouched() {
        // Arrange
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, mut queue) = host.connect();
        coordinator.submit_claim(claim("d1"), &handle).await;

        // Act
        let resolution = coordinator
            .resolve_claim(&DeviceId::new("d1"), false)
            .await
            .unwrap();

        // Assert
        assert_eq!(resolution, Resolution::Rejected { delivered: true });
        assert_eq!(
            drain(&mut queue),
            vec![ServerMessage::PairResponse(PairResponse::rejected())]
        );
        let reg = host.state.registries().await;
        assert!(!reg.trust.is_trusted(&DeviceId::new("d1")));
        assert!(reg.sessions.is_empty());
        assert!(reg.pending.is_empty());
    }

    #[tokio::test]
    async fn test_trusted_claim_is_auto_granted_without_pending_entry() {
        // Arrange
        let host = TestHost::with_trusted(&["d1"]);
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, mut queue) = host.connect();

        // Act
        let outcome = coordinator.submit_claim(claim("d1"), &handle).await;

        // Assert
        assert_eq!(outcome, ClaimOutcome::AutoGranted);
        let msgs = drain(&mut queue);
        assert_eq!(
            msgs[0],
            ServerMessage::PairResponse(PairResponse::auto_granted())
        );
        assert!(host.approvals.requests().is_empty());
        let reg = host.state.registries().await;
        assert!(reg.pending.is_empty());
        assert!(reg.sessions.is_authorized(handle.id(), &reg.trust));
    }

    #[tokio::test]
    async fn test_repeated_trusted_claims_leave_one_session() {
        // Arrange
        let host = TestHost::with_trusted(&["d1"]);
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (first, _q1) = host.connect();
        let (second, _q2) = host.connect();

        // Act
        coordinator.submit_claim(claim("d1"), &first).await;
        coordinator.submit_claim(claim("d1"), &second).await;
        coordinator.submit_claim(claim("d1"), &second).await;

        // Assert
        let reg = host.state.registries().await;
        assert_eq!(reg.sessions.sessions_for(&DeviceId::new("d1")), 1);
        assert!(reg.sessions.get(second.id()).is_some());
        assert!(!first.is_live(), "superseded connection is closed");
        assert!(second.is_live());
        assert_eq!(reg.trust.len(), 1);
    }

    #[tokio::test]
    async fn test_approval_after_claimant_disconnected_still_trusts() {
        // Arrange
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, queue) = host.connect();
        coordinator.submit_claim(claim("d1"), &handle).await;
        drop(queue);

        // Act
        let resolution = coordinator
            .resolve_claim(&DeviceId::new("d1"), true)
            .await
            .unwrap();

        // Assert
        assert_eq!(resolution, Resolution::Approved { delivered: false });
        let reg = host.state.registries().await;
        assert!(reg.trust.is_trusted(&DeviceId::new("d1")));
        assert!(reg.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_reclaim_replaces_pending_entry() {
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (first, _q1) = host.connect();
        let (second, mut q2) = host.connect();

        coordinator.submit_claim(claim("d1"), &first).await;
        coordinator.submit_claim(claim("d1"), &second).await;
        coordinator
            .resolve_claim(&DeviceId::new("d1"), true)
            .await
            .unwrap();

        assert_eq!(host.state.registries().await.pending.len(), 0);
        assert_eq!(
            drain(&mut q2)[0],
            ServerMessage::PairResponse(PairResponse::approved())
        );
    }

    #[tokio::test]
    async fn test_revocation_forces_approval_on_next_claim() {
        // Arrange
        let host = TestHost::with_trusted(&["d1"]);
        let coordinator = PairingCoordinator::new(host.state.clone());
        host.state.revoke(&DeviceId::new("d1")).await;
        let (handle, mut queue) = host.connect();

        // Act
        let outcome = coordinator.submit_claim(claim("d1"), &handle).await;

        // Assert
        assert_eq!(outcome, ClaimOutcome::AwaitingApproval);
        assert!(drain(&mut queue).is_empty());
    }

    #[tokio::test]
    async fn test_revocation_with_live_session_forces_approval_on_reclaim() {
        // Arrange: d1 is auto-granted on connection A, then revoked while
        // that session is still registered.
        let host = TestHost::with_trusted(&["d1"]);
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (a, mut qa) = host.connect();
        assert_eq!(
            coordinator.submit_claim(claim("d1"), &a).await,
            ClaimOutcome::AutoGranted
        );
        drain(&mut qa);
        host.state.revoke(&DeviceId::new("d1")).await;

        // Act 1: the same connection claims again.
        let on_a = coordinator.submit_claim(claim("d1"), &a).await;

        // Assert 1
        assert_eq!(on_a, ClaimOutcome::AwaitingApproval);
        assert!(drain(&mut qa).is_empty(), "no auto-grant after revocation");
        assert_eq!(host.approvals.requests().len(), 1);
        {
            let reg = host.state.registries().await;
            assert!(!reg.sessions.is_authorized(a.id(), &reg.trust));
        }

        // Act 2: a new connection B claims the same identity.
        let (b, mut qb) = host.connect();
        let on_b = coordinator.submit_claim(claim("d1"), &b).await;

        // Assert 2: A holds no session and the pending request now belongs
        // to B.
        assert_eq!(on_b, ClaimOutcome::AwaitingApproval);
        assert_eq!(host.approvals.requests().len(), 2);
        {
            let reg = host.state.registries().await;
            assert!(reg.sessions.get(a.id()).is_none());
            assert_eq!(reg.pending.len(), 1);
        }
        assert!(drain(&mut qb).is_empty());
        assert!(drain(&mut qa).is_empty());

        let resolution = coordinator
            .resolve_claim(&DeviceId::new("d1"), true)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Approved { delivered: true });
        assert_eq!(
            drain(&mut qb)[0],
            ServerMessage::PairResponse(PairResponse::approved())
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_for_one_identity_leave_at_most_one_of_each() {
        // Arrange
        let host = TestHost::new();
        let coordinator = Arc::new(PairingCoordinator::new(host.state.clone()));
        let (a, _qa) = host.connect();
        let (b, _qb) = host.connect();

        // Act
        let ca = Arc::clone(&coordinator);
        let cb = Arc::clone(&coordinator);
        let (ha, hb) = (a.clone(), b.clone());
        let t1 = tokio::spawn(async move { ca.submit_claim(claim("d1"), &ha).await });
        let t2 = tokio::spawn(async move { cb.submit_claim(claim("d1"), &hb).await });
        t1.await.unwrap();
        t2.await.unwrap();

        // Assert
        let reg = host.state.registries().await;
        assert_eq!(reg.pending.len(), 1);
        assert!(reg.sessions.sessions_for(&DeviceId::new("d1")) <= 1);
    }

    #[tokio::test]
    async fn test_disconnect_discards_pending_request() {
        let host = TestHost::new();
        let coordinator = PairingCoordinator::new(host.state.clone());
        let (handle, _queue) = host.connect();
        coordinator.submit_claim(claim("d1"), &handle).await;

        host.state.disconnect(handle.id()).await;

        assert!(coordinator.pending().await.is_empty());
        assert!(matches!(
            coordinator.resolve_claim(&DeviceId::new("d1"), true).await,
            Err(PairingError::NotFound { .. })
        ));
    }
}
