//! Host-wide state shared by every component.
//!
//! [`HostState`] owns all mutable connectivity state in one place:
//!
//! - the [`TrustStore`] of approved devices,
//! - pending pairing requests,
//! - the [`SessionRegistry`] of authorized connections,
//! - per-connection signaling sessions,
//! - the page book pushed to clients.
//!
//! All of it sits behind a single `tokio::sync::Mutex` ([`Registries`]).
//! Every multi-step sequence (evict-then-register, check-trust-then-grant,
//! resolve-pending) runs inside one lock acquisition, so concurrent claims
//! for the same device always observe each other's effects.
//!
//! # Rules for holding the lock
//!
//! - Never await socket or collaborator I/O while holding it.  Outbound
//!   messages go through [`ConnectionHandle::send`], which never blocks.
//! - Persistence is scheduled, not performed: mutations hand a snapshot to a
//!   [`SnapshotSink`] and return immediately.  The in-memory state is the
//!   source of truth; a failed write is retried by the sink and never rolls
//!   the state back.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, info};

use localdesk_core::{DeviceId, Page, TrustedDevice};

use super::connection::ConnectionId;
use super::pairing::{ApprovalSink, PendingPairings};
use super::sessions::{SessionRegistry, SessionSummary};
use super::signaling::SignalingTable;
use super::trust::TrustStore;
use crate::platform::{CaptureEvent, NativeBackends};

/// Capacity of the capture event channel.
const CAPTURE_EVENT_CAPACITY: usize = 64;

/// Receives state snapshots for durable storage.
///
/// `schedule` must return without blocking; implementations queue the
/// snapshot and write it in the background, in the order received.
pub trait SnapshotSink<T>: Send + Sync {
    fn schedule(&self, snapshot: T);
}

/// Discards every snapshot.  Used when persistence is disabled.
pub struct DiscardSnapshots;

impl<T> SnapshotSink<T> for DiscardSnapshots {
    fn schedule(&self, _snapshot: T) {}
}

/// How this host presents itself to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostIdentity {
    pub device_id: DeviceId,
    pub device_name: String,
    /// Serves both the session channel and the HTTP surface.
    pub session_port: u16,
}

/// Everything guarded by the registries lock.
#[derive(Debug)]
pub struct Registries {
    pub trust: TrustStore,
    pub pending: PendingPairings,
    pub sessions: SessionRegistry,
    pub signaling: SignalingTable,
    pub pages: Vec<Page>,
}

/// Construction inputs for [`HostState`].
pub struct HostParts {
    pub identity: HostIdentity,
    pub trusted: Vec<TrustedDevice>,
    pub pages: Vec<Page>,
    pub backends: NativeBackends,
    pub approvals: Arc<dyn ApprovalSink>,
    pub trust_sink: Arc<dyn SnapshotSink<Vec<TrustedDevice>>>,
    pub page_sink: Arc<dyn SnapshotSink<Vec<Page>>>,
}

pub struct HostState {
    identity: HostIdentity,
    registries: Mutex<Registries>,
    backends: NativeBackends,
    approvals: Arc<dyn ApprovalSink>,
    trust_sink: Arc<dyn SnapshotSink<Vec<TrustedDevice>>>,
    page_sink: Arc<dyn SnapshotSink<Vec<Page>>>,
    capture_events: mpsc::Sender<CaptureEvent>,
}

impl HostState {
    /// Builds the state.  The returned receiver yields events from the
    /// capture collaborator and must be drained by
    /// [`SignalingRelay::run_capture_events`](super::signaling::SignalingRelay::run_capture_events).
    pub fn new(parts: HostParts) -> (Arc<Self>, mpsc::Receiver<CaptureEvent>) {
        let (capture_events, capture_rx) = mpsc::channel(CAPTURE_EVENT_CAPACITY);
        let registries = Registries {
            trust: TrustStore::new(parts.trusted),
            pending: PendingPairings::default(),
            sessions: SessionRegistry::new(),
            signaling: SignalingTable::default(),
            pages: parts.pages,
        };
        info!(
            "host state ready: {} trusted device(s), {} page(s)",
            registries.trust.len(),
            registries.pages.len()
        );

        let state = Arc::new(Self {
            identity: parts.identity,
            registries: Mutex::new(registries),
            backends: parts.backends,
            approvals: parts.approvals,
            trust_sink: parts.trust_sink,
            page_sink: parts.page_sink,
            capture_events,
        });
        (state, capture_rx)
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    pub fn backends(&self) -> &NativeBackends {
        &self.backends
    }

    pub(crate) fn approvals(&self) -> &dyn ApprovalSink {
        self.approvals.as_ref()
    }

    pub(crate) fn capture_events(&self) -> mpsc::Sender<CaptureEvent> {
        self.capture_events.clone()
    }

    /// Acquires the registries lock.
    pub async fn registries(&self) -> MutexGuard<'_, Registries> {
        self.registries.lock().await
    }

    /// Schedules a write of the current trust set.  Call with the lock held
    /// so snapshots are queued in mutation order.
    pub(crate) fn persist_trust(&self, trust: &TrustStore) {
        self.trust_sink.schedule(trust.list().to_vec());
    }

    pub(crate) fn persist_pages(&self, pages: &[Page]) {
        self.page_sink.schedule(pages.to_vec());
    }

    pub async fn pages(&self) -> Vec<Page> {
        self.registries().await.pages.clone()
    }

    pub async fn trusted_devices(&self) -> Vec<TrustedDevice> {
        self.registries().await.trust.list().to_vec()
    }

    pub async fn connected_clients(&self) -> Vec<SessionSummary> {
        self.registries().await.sessions.snapshot()
    }

    /// Removes `device_id` from the trust store.
    ///
    /// Live sessions of the device stay open, but every later command is
    /// rejected and its next claim goes through approval again.
    pub async fn revoke(&self, device_id: &DeviceId) -> Option<TrustedDevice> {
        let mut reg = self.registries().await;
        let removed = reg.trust.remove(device_id)?;
        self.persist_trust(&reg.trust);
        info!("trust revoked for device {device_id}");
        Some(removed)
    }

    /// Clears every trace of `connection` and releases its capture
    /// resources.
    ///
    /// Capture `stop` is invoked unconditionally, whether or not a signaling
    /// session existed.
    pub async fn disconnect(&self, connection: ConnectionId) {
        {
            let mut reg = self.registries().await;
            let session = reg.sessions.unregister(connection);
            let signaling = reg.signaling.remove(connection);
            let pending = reg.pending.remove_for_connection(connection);
            debug!(
                "connection {connection} cleared: session={} signaling={} pending={}",
                session.is_some(),
                signaling.is_some(),
                pending.len()
            );
        }
        self.backends.capture.stop(connection).await;
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
