//! WebRTC signaling relay and post-connection input forwarding.
//!
//! The host never touches media itself.  It relays the offer/answer/ICE
//! exchange between the remote client and the local capture collaborator,
//! and tracks one [`SignalingSession`] per connection:
//!
//! ```text
//! Idle ──offer──▶ Offered ──answer──▶ Answered ──connected──▶ Connected
//!   ▲                │                    │                       │
//!   └────────────────┴── stop / failure / disconnect ─────────────┘ (Closed)
//! ```
//!
//! Offers are only accepted from authorized connections.  The capture
//! collaborator is called with the registries lock released; when it
//! returns, the session is re-checked so an answer is never sent to a
//! connection that went away or started over in the meantime.
//!
//! Remote-control events (pointer, keyboard, media, volume) are forwarded
//! only while the session is `Connected` and the connection is still
//! authorized.  Anything else is dropped silently.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use localdesk_core::{
    protocol::{
        input::VolumeAction,
        session::{IceCandidateMessage, WebrtcAnswer, WebrtcOffer},
    },
    ClientMessage, ServerMessage,
};

use super::connection::{ConnectionHandle, ConnectionId};
use super::state::HostState;
use crate::platform::{CaptureEvent, PeerConnectionState, PlatformError};

/// Error type for signaling operations.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("Unauthorized")]
    Unauthorized,

    /// The capture collaborator could not produce an answer.
    #[error("screen capture failed: {0}")]
    CaptureFailed(#[source] PlatformError),
}

/// Lifecycle of one connection's peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Offering,
    Answered,
    Connected,
    Closed,
}

#[derive(Debug, Clone)]
pub struct SignalingSession {
    pub connection_id: ConnectionId,
    pub source_id: Option<String>,
    pub peer_state: PeerState,
    /// Distinguishes successive offers on the same connection.
    pub generation: u64,
    handle: ConnectionHandle,
}

/// Signaling sessions keyed by connection.
#[derive(Debug, Default)]
pub struct SignalingTable {
    by_connection: HashMap<ConnectionId, SignalingSession>,
    next_generation: u64,
}

impl SignalingTable {
    /// Opens a new session in `Offering`, replacing any previous one.
    /// Returns the new generation and the replaced session.
    pub fn open(
        &mut self,
        handle: &ConnectionHandle,
        source_id: Option<String>,
    ) -> (u64, Option<SignalingSession>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let previous = self.by_connection.insert(
            handle.id(),
            SignalingSession {
                connection_id: handle.id(),
                source_id,
                peer_state: PeerState::Offering,
                generation,
                handle: handle.clone(),
            },
        );
        (generation, previous)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&SignalingSession> {
        self.by_connection.get(&connection)
    }

    pub fn state(&self, connection: ConnectionId) -> Option<PeerState> {
        self.get(connection).map(|s| s.peer_state)
    }

    /// Moves the session of `connection` to `to` if it is still at
    /// `generation` and currently in `from`.
    fn transition(
        &mut self,
        connection: ConnectionId,
        generation: Option<u64>,
        from: &[PeerState],
        to: PeerState,
    ) -> bool {
        match self.by_connection.get_mut(&connection) {
            Some(s)
                if generation.map_or(true, |g| g == s.generation)
                    && from.contains(&s.peer_state) =>
            {
                s.peer_state = to;
                true
            }
            _ => false,
        }
    }

    /// Removes the session; the caller is responsible for stopping capture.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<SignalingSession> {
        self.by_connection.remove(&connection).map(|mut s| {
            s.peer_state = PeerState::Closed;
            s
        })
    }

    fn remove_generation(&mut self, connection: ConnectionId, generation: u64) -> bool {
        if self.get(connection).is_some_and(|s| s.generation == generation) {
            self.by_connection.remove(&connection);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}

pub struct SignalingRelay {
    state: Arc<HostState>,
}

impl SignalingRelay {
    pub fn new(state: Arc<HostState>) -> Self {
        Self { state }
    }

    /// Handles `webrtc-offer` from the client on `handle`.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::Unauthorized`] if the connection is not
    ///   authorized; the client receives `error{Unauthorized}`.
    /// - [`SignalingError::CaptureFailed`] if the collaborator fails; the
    ///   session is closed and only this client receives the error.
    pub async fn handle_offer(
        &self,
        handle: &ConnectionHandle,
        offer: WebrtcOffer,
    ) -> Result<(), SignalingError> {
        let connection = handle.id();
        let (generation, previous) = {
            let mut reg = self.state.registries().await;
            if !reg.sessions.is_authorized(connection, &reg.trust) {
                drop(reg);
                warn!("connection {connection}: webrtc-offer rejected (unauthorized)");
                handle.send(ServerMessage::error(SignalingError::Unauthorized.to_string()));
                return Err(SignalingError::Unauthorized);
            }
            reg.signaling.open(handle, offer.source_id.clone())
        };

        let capture = &self.state.backends().capture;
        if previous.is_some() {
            debug!("connection {connection}: new offer replaces running stream");
            capture.stop(connection).await;
        }

        info!(
            "connection {connection}: offer for source {}",
            offer.source_id.as_deref().unwrap_or("<primary>")
        );
        let result = capture
            .start(
                connection,
                offer.source_id,
                offer.offer,
                self.state.capture_events(),
            )
            .await;

        match result {
            Ok(answer) => {
                let delivered = {
                    let mut reg = self.state.registries().await;
                    reg.signaling.transition(
                        connection,
                        Some(generation),
                        &[PeerState::Offering],
                        PeerState::Answered,
                    )
                };
                if delivered {
                    handle.send(ServerMessage::WebrtcAnswer(WebrtcAnswer { answer }));
                } else {
                    debug!("connection {connection}: offer superseded; releasing capture");
                    let current = self.state.registries().await.signaling.state(connection);
                    if current.is_none() {
                        capture.stop(connection).await;
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!("connection {connection}: capture failed: {e}");
                let owned = self
                    .state
                    .registries()
                    .await
                    .signaling
                    .remove_generation(connection, generation);
                if owned {
                    capture.stop(connection).await;
                    handle.send(ServerMessage::error(e.to_string()));
                }
                Err(SignalingError::CaptureFailed(e))
            }
        }
    }

    /// Forwards a client ICE candidate to the capture collaborator.
    ///
    /// Candidates for connections without an open session are dropped.
    pub async fn handle_ice_candidate(&self, connection: ConnectionId, msg: IceCandidateMessage) {
        let open = self.state.registries().await.signaling.get(connection).is_some();
        if !open {
            trace!("connection {connection}: ICE candidate without session dropped");
            return;
        }
        let candidate = msg.into_candidate();
        if candidate.is_none() {
            debug!("connection {connection}: remote end-of-candidates");
        }
        if let Err(e) = self
            .state
            .backends()
            .capture
            .add_ice_candidate(connection, candidate)
            .await
        {
            warn!("connection {connection}: failed to add ICE candidate: {e}");
        }
    }

    /// Ends the stream for `connection` (`webrtc-stop`).  Capture `stop` is
    /// always invoked.
    pub async fn stop(&self, connection: ConnectionId) {
        let removed = self.state.registries().await.signaling.remove(connection);
        if removed.is_some() {
            info!("connection {connection}: screen share stopped");
        }
        self.state.backends().capture.stop(connection).await;
    }

    /// Applies one event reported by the capture collaborator.
    pub async fn handle_capture_event(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::LocalCandidate {
                connection,
                candidate,
            } => {
                let reg = self.state.registries().await;
                match reg.signaling.get(connection) {
                    Some(session) if session.peer_state != PeerState::Closed => {
                        session
                            .handle
                            .send(ServerMessage::WebrtcIceCandidate(IceCandidateMessage {
                                candidate,
                            }));
                    }
                    _ => trace!("connection {connection}: local candidate without session"),
                }
            }
            CaptureEvent::StateChanged { connection, state } => {
                if state == PeerConnectionState::Connected {
                    let moved = self.state.registries().await.signaling.transition(
                        connection,
                        None,
                        &[PeerState::Offering, PeerState::Answered],
                        PeerState::Connected,
                    );
                    if moved {
                        info!("connection {connection}: stream connected");
                    }
                } else if state.is_terminal() {
                    info!("connection {connection}: stream ended ({state:?})");
                    self.stop(connection).await;
                }
            }
        }
    }

    /// Drains capture events until every sender is gone.
    pub async fn run_capture_events(&self, mut events: mpsc::Receiver<CaptureEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_capture_event(event).await;
        }
        debug!("capture event channel closed");
    }

    /// Forwards a remote-control event if the stream is connected.
    ///
    /// Returns `true` if the event reached a collaborator.
    pub async fn forward_input(&self, connection: ConnectionId, msg: &ClientMessage) -> bool {
        let connected = {
            let reg = self.state.registries().await;
            reg.signaling.state(connection) == Some(PeerState::Connected)
                && reg.sessions.is_authorized(connection, &reg.trust)
        };
        if !connected {
            trace!(
                "connection {connection}: {} dropped (stream not connected)",
                msg.event_name()
            );
            return false;
        }

        let b = self.state.backends();
        let result = match msg {
            ClientMessage::RemoteMouseMove(p) => b.pointer.move_to(p.clamped()),
            ClientMessage::RemoteMouseClick(ev) => b.pointer.click(ev.button, ev.position()),
            ClientMessage::RemoteMouseButtonDown(ev) => {
                b.pointer.button_down(ev.button, ev.position())
            }
            ClientMessage::RemoteMouseButtonUp(ev) => b.pointer.button_up(ev.button, ev.position()),
            ClientMessage::RemoteMouseScroll(s) => b.pointer.scroll(s.delta_x, s.delta_y),
            ClientMessage::RemoteKeyboardInput(k) => {
                let mut r = Ok(());
                if let Some(text) = k.text.as_deref().filter(|t| !t.is_empty()) {
                    r = b.keys.type_text(text);
                }
                if let Some(keys) = k.keys.as_deref().filter(|k| !k.is_empty()) {
                    r = r.and(b.keys.send_keys(keys));
                }
                r
            }
            ClientMessage::RemoteMediaControl(m) => b.media.control(m.action),
            ClientMessage::RemoteVolumeControl(v) => match v.action {
                VolumeAction::Mute => b.audio.set_mute(true),
                VolumeAction::Unmute => b.audio.set_mute(false),
                VolumeAction::Set => match v.level() {
                    Some(level) => b.audio.set_volume(level),
                    None => Ok(()),
                },
                VolumeAction::Up | VolumeAction::Down => b.audio.volume().and_then(|current| {
                    let next = if v.action == VolumeAction::Up {
                        current.saturating_add(VOLUME_STEP).min(100)
                    } else {
                        current.saturating_sub(VOLUME_STEP)
                    };
                    b.audio.set_volume(next)
                }),
            },
            other => {
                debug!("{} is not a remote-control event", other.event_name());
                return false;
            }
        };

        if let Err(e) = result {
            debug!("connection {connection}: {} failed: {e}", msg.event_name());
        }
        true
    }
}

/// Percentage points per volume up/down step.
const VOLUME_STEP: u8 = 5;

// ── Tests ─────────────────────────────────────────────────────────────────────
