//! Routes decoded client messages to the component that owns them.

use std::sync::Arc;

use tracing::debug;

use localdesk_core::ClientMessage;

use super::command_gate::CommandGate;
use super::connection::{ConnectionHandle, ConnectionId};
use super::pairing::PairingCoordinator;
use super::signaling::SignalingRelay;
use super::state::HostState;

/// One dispatcher serves every connection; it is shared by the session
/// server's per-connection tasks.
pub struct SessionDispatcher {
    state: Arc<HostState>,
    pairing: PairingCoordinator,
    gate: CommandGate,
    relay: Arc<SignalingRelay>,
}

impl SessionDispatcher {
    pub fn new(state: Arc<HostState>) -> Self {
        Self {
            pairing: PairingCoordinator::new(Arc::clone(&state)),
            gate: CommandGate::new(Arc::clone(&state)),
            relay: Arc::new(SignalingRelay::new(Arc::clone(&state))),
            state,
        }
    }

    pub fn state(&self) -> &Arc<HostState> {
        &self.state
    }

    /// The relay, for draining capture events.
    pub fn relay(&self) -> Arc<SignalingRelay> {
        Arc::clone(&self.relay)
    }

    /// Handles one message from the client on `handle`.
    ///
    /// Rejections are reported to the client by the component that made
    /// them; nothing here is fatal to the connection.
    pub async fn dispatch(&self, handle: &ConnectionHandle, msg: ClientMessage) {
        let connection = handle.id();
        match msg {
            ClientMessage::PairRequest(claim) => {
                self.pairing.submit_claim(claim, handle).await;
            }
            ClientMessage::ExecuteShortcut(request) => {
                let _ = self.gate.execute(handle, request).await;
            }
            ClientMessage::WebrtcOffer(offer) => {
                if let Err(e) = self.relay.handle_offer(handle, offer).await {
                    debug!("connection {connection}: offer not answered: {e}");
                }
            }
            ClientMessage::WebrtcIceCandidate(candidate) => {
                self.relay.handle_ice_candidate(connection, candidate).await;
            }
            ClientMessage::WebrtcStop => self.relay.stop(connection).await,
            input => {
                self.relay.forward_input(connection, &input).await;
            }
        }
    }

    /// Cleans up after a closed connection.
    pub async fn disconnect(&self, connection: ConnectionId) {
        self.state.disconnect(connection).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{drain, TestHost};
    use localdesk_core::protocol::input::PointerPosition;
    use localdesk_core::protocol::session::{ExecuteShortcut, PairRequest, PairResponse};
    use localdesk_core::{ActionType, DeviceId, DeviceKind, ServerMessage, ShortcutId};

    #[tokio::test]
    async fn test_pair_then_execute_through_dispatcher() {
        // Arrange
        let host = TestHost::with_trusted(&["phone"]);
        let dispatcher = SessionDispatcher::new(host.state.clone());
        let (handle, mut queue) = host.connect();

        // Act
        dispatcher
            .dispatch(
                &handle,
                ClientMessage::PairRequest(PairRequest {
                    device_id: DeviceId::new("phone"),
                    device_name: "Phone".to_string(),
                    device_type: DeviceKind::Mobile,
                }),
            )
            .await;
        dispatcher
            .dispatch(
                &handle,
                ClientMessage::ExecuteShortcut(ExecuteShortcut {
                    shortcut_id: ShortcutId::Number(2),
                    keys: Some(vec!["CONTROL".to_string(), "S".to_string()]),
                    app_path: None,
                    action_type: ActionType::Keys,
                }),
            )
            .await;

        // Assert
        let msgs = drain(&mut queue);
        assert_eq!(msgs[0], ServerMessage::PairResponse(PairResponse::auto_granted()));
        assert!(matches!(msgs.last(), Some(ServerMessage::ExecuteResult(r)) if r.success));
        assert_eq!(host.backends.keys.chords().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_input_before_pairing_is_ignored() {
        let host = TestHost::new();
        let dispatcher = SessionDispatcher::new(host.state.clone());
        let (handle, mut queue) = host.connect();

        dispatcher
            .dispatch(
                &handle,
                ClientMessage::RemoteMouseMove(PointerPosition { x: 0.2, y: 0.2 }),
            )
            .await;

        assert!(drain(&mut queue).is_empty());
        assert!(host.backends.pointer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_stops_capture_without_session() {
        let host = TestHost::new();
        let dispatcher = SessionDispatcher::new(host.state.clone());
        let (handle, _queue) = host.connect();

        dispatcher.disconnect(handle.id()).await;

        assert_eq!(host.backends.capture.stop_count(handle.id()), 1);
    }
}
