//! Test support: a fully wired [`HostState`] backed by recording doubles.
//!
//! Used by the unit tests in this crate and by the integration tests in
//! `tests/`.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use localdesk_core::{default_pages, DeviceId, DeviceKind, Page, ServerMessage, TrustedDevice};

use super::connection::{ConnectionHandle, ConnectionId, OutboundQueue};
use super::pairing::{ApprovalRequest, ApprovalSink};
use super::state::{HostIdentity, HostParts, HostState, SnapshotSink};
use crate::platform::{mock::MockBackends, CaptureEvent};

/// Records every approval request.
#[derive(Default)]
pub struct RecordingApprovals {
    requests: Mutex<Vec<ApprovalRequest>>,
}

impl RecordingApprovals {
    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

impl ApprovalSink for RecordingApprovals {
    fn request_approval(&self, request: ApprovalRequest) {
        self.requests.lock().expect("lock poisoned").push(request);
    }
}

/// Records every scheduled snapshot.
pub struct RecordingSnapshots<T> {
    snapshots: Mutex<Vec<T>>,
}

impl<T> Default for RecordingSnapshots<T> {
    fn default() -> Self {
        Self {
            snapshots: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> RecordingSnapshots<T> {
    pub fn count(&self) -> usize {
        self.snapshots.lock().expect("lock poisoned").len()
    }

    pub fn last(&self) -> Option<T> {
        self.snapshots.lock().expect("lock poisoned").last().cloned()
    }
}

impl<T: Send> SnapshotSink<T> for RecordingSnapshots<T> {
    fn schedule(&self, snapshot: T) {
        self.snapshots.lock().expect("lock poisoned").push(snapshot);
    }
}

pub fn test_identity() -> HostIdentity {
    HostIdentity {
        device_id: DeviceId::new("host-under-test"),
        device_name: "Test Desktop".to_string(),
        session_port: 3100,
    }
}

/// A host state plus handles to every double behind it.
pub struct TestHost {
    pub state: Arc<HostState>,
    pub capture_rx: mpsc::Receiver<CaptureEvent>,
    pub backends: MockBackends,
    pub approvals: Arc<RecordingApprovals>,
    pub trust_snapshots: Arc<RecordingSnapshots<Vec<TrustedDevice>>>,
    pub page_snapshots: Arc<RecordingSnapshots<Vec<Page>>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_trusted(&[])
    }

    /// A host that already trusts `ids`.
    pub fn with_trusted(ids: &[&str]) -> Self {
        let trusted = ids
            .iter()
            .map(|id| TrustedDevice::new(DeviceId::new(*id), *id, DeviceKind::Mobile, 1))
            .collect();
        Self::build(trusted, default_pages())
    }

    pub fn build(trusted: Vec<TrustedDevice>, pages: Vec<Page>) -> Self {
        let backends = MockBackends::new();
        let approvals = Arc::new(RecordingApprovals::default());
        let trust_snapshots = Arc::new(RecordingSnapshots::default());
        let page_snapshots = Arc::new(RecordingSnapshots::default());
        let (state, capture_rx) = HostState::new(HostParts {
            identity: test_identity(),
            trusted,
            pages,
            backends: backends.backends(),
            approvals: approvals.clone(),
            trust_sink: trust_snapshots.clone(),
            page_sink: page_snapshots.clone(),
        });
        Self {
            state,
            capture_rx,
            backends,
            approvals,
            trust_snapshots,
            page_snapshots,
        }
    }

    /// Opens a simulated connection.
    pub fn connect(&self) -> (ConnectionHandle, OutboundQueue) {
        ConnectionHandle::channel(ConnectionId::new())
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns every message currently queued on `queue`.
pub fn drain(queue: &mut OutboundQueue) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = queue.rx.try_recv() {
        out.push(msg);
    }
    out
}
