//! Session channel message schema.
//!
//! Every frame on a session channel is a single JSON object of the form
//!
//! ```json
//! { "event": "pair-request", "data": { "deviceId": "...", "deviceName": "..." } }
//! ```
//!
//! The set of events is closed: [`ClientMessage`] lists everything a mobile
//! client may send and [`ServerMessage`] everything the host may send.  Frames
//! that fail to parse into one of these enums are rejected at the boundary as
//! [`ProtocolError::MalformedMessage`] and never reach the application layer.
//!
//! # Adjacent tagging (for beginners)
//!
//! `#[serde(tag = "event", content = "data")]` tells serde to read the enum
//! variant name from the `event` field and the variant's payload from the
//! `data` field.  `rename_all = "kebab-case"` maps `PairRequest` to
//! `"pair-request"`, `WebrtcIceCandidate` to `"webrtc-ice-candidate"`, and so
//! on.  Unit variants such as [`ClientMessage::WebrtcStop`] accept a missing
//! or `null` `data` field.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::domain::device::{DeviceId, DeviceKind};
use crate::domain::page::{ActionType, Page, Shortcut, ShortcutId};
use crate::protocol::input::{
    KeyboardInput, MediaControl, MouseButtonEvent, MouseScroll, PointerPosition, VolumeControl,
};

/// Error type for session frame encoding and decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match the closed schema.
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// A pairing claim: "I am device X, please trust me".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    pub device_id: DeviceId,
    pub device_name: String,
    #[serde(default)]
    pub device_type: DeviceKind,
}

/// Request to run a shortcut.
///
/// The client sends the shortcut definition along with its id, so the host
/// does not need to look the shortcut up in its own page book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteShortcut {
    pub shortcut_id: ShortcutId,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub app_path: Option<String>,
    #[serde(default)]
    pub action_type: ActionType,
}

/// An SDP offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "answer".to_string(),
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebrtcOffer {
    pub offer: SessionDescription,
    /// Screen or window the client wants to watch; `None` means the primary
    /// screen.
    #[serde(default)]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebrtcAnswer {
    pub answer: SessionDescription,
}

/// A trickled ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

/// Envelope for ICE candidates in both directions.
///
/// A `null` candidate, or one whose candidate string is empty, marks the end
/// of candidate gathering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IceCandidateMessage {
    #[serde(default)]
    pub candidate: Option<IceCandidate>,
}

impl IceCandidateMessage {
    /// Returns the candidate unless this message marks end-of-candidates.
    pub fn into_candidate(self) -> Option<IceCandidate> {
        self.candidate.filter(|c| !c.candidate.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_connected: Option<bool>,
}

impl PairResponse {
    /// Grant for a device that was already trusted.
    pub fn auto_granted() -> Self {
        Self {
            success: true,
            message: Some("already trusted".to_string()),
            auto_connected: Some(true),
        }
    }

    pub fn approved() -> Self {
        Self {
            success: true,
            message: Some("pairing approved".to_string()),
            auto_connected: None,
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            message: Some("pairing rejected".to_string()),
            auto_connected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub success: bool,
    pub shortcut_id: ShortcutId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Every event a mobile client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    PairRequest(PairRequest),
    ExecuteShortcut(ExecuteShortcut),
    WebrtcOffer(WebrtcOffer),
    WebrtcIceCandidate(IceCandidateMessage),
    WebrtcStop,
    RemoteMouseMove(PointerPosition),
    RemoteMouseClick(MouseButtonEvent),
    RemoteMouseButtonDown(MouseButtonEvent),
    RemoteMouseButtonUp(MouseButtonEvent),
    RemoteMouseScroll(MouseScroll),
    RemoteKeyboardInput(KeyboardInput),
    RemoteMediaControl(MediaControl),
    RemoteVolumeControl(VolumeControl),
}

impl ClientMessage {
    /// Wire name of the event, for log messages.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PairRequest(_) => "pair-request",
            Self::ExecuteShortcut(_) => "execute-shortcut",
            Self::WebrtcOffer(_) => "webrtc-offer",
            Self::WebrtcIceCandidate(_) => "webrtc-ice-candidate",
            Self::WebrtcStop => "webrtc-stop",
            Self::RemoteMouseMove(_) => "remote-mouse-move",
            Self::RemoteMouseClick(_) => "remote-mouse-click",
            Self::RemoteMouseButtonDown(_) => "remote-mouse-button-down",
            Self::RemoteMouseButtonUp(_) => "remote-mouse-button-up",
            Self::RemoteMouseScroll(_) => "remote-mouse-scroll",
            Self::RemoteKeyboardInput(_) => "remote-keyboard-input",
            Self::RemoteMediaControl(_) => "remote-media-control",
            Self::RemoteVolumeControl(_) => "remote-volume-control",
        }
    }

    /// Returns `true` for the remote-control events that are only honoured
    /// while a screen-share stream is connected.
    pub fn is_remote_input(&self) -> bool {
        matches!(
            self,
            Self::RemoteMouseMove(_)
                | Self::RemoteMouseClick(_)
                | Self::RemoteMouseButtonDown(_)
                | Self::RemoteMouseButtonUp(_)
                | Self::RemoteMouseScroll(_)
                | Self::RemoteKeyboardInput(_)
                | Self::RemoteMediaControl(_)
                | Self::RemoteVolumeControl(_)
        )
    }
}

/// Every event the host may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    PairResponse(PairResponse),
    PagesUpdate(Vec<Page>),
    /// Shortcuts of the first page, for clients that predate pages.
    ShortcutsUpdate(Vec<Shortcut>),
    ExecuteResult(ExecuteResult),
    Error(ErrorPayload),
    WebrtcAnswer(WebrtcAnswer),
    WebrtcIceCandidate(IceCandidateMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// The pair of messages pushed whenever the page book changes or a
    /// session becomes authorized.
    pub fn page_updates(pages: &[Page]) -> [Self; 2] {
        let first = pages
            .first()
            .map(|p| p.shortcuts.clone())
            .unwrap_or_default();
        [Self::PagesUpdate(pages.to_vec()), Self::ShortcutsUpdate(first)]
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Parses and validates one text frame received from a client.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] if the frame is not JSON, names
/// an unknown event, carries a payload of the wrong shape, or claims a blank
/// device identity.
pub fn decode_client_message(frame: &str) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage =
        serde_json::from_str(frame).map_err(|e| ProtocolError::malformed(e.to_string()))?;

    if let ClientMessage::PairRequest(req) = &msg {
        if req.device_id.is_blank() {
            return Err(ProtocolError::malformed("pair-request with blank deviceId"));
        }
    }

    trace!("decoded {}", msg.event_name());
    Ok(msg)
}

/// Serializes a host message into one text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Serializes a client message.  Used by test clients and tooling.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Parses a host message.  Used by test clients and tooling.
pub fn decode_server_message(frame: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::malformed(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
