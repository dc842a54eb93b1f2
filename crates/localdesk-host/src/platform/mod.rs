//! Native collaborators the connectivity layer drives.
//!
//! Key injection, process launch, pointer control, volume, media transport
//! and screen capture are all OS-specific.  The application layer only sees
//! the traits defined here; concrete implementations are resolved once at
//! startup by [`NativeBackends::detect`] and handed to the host state as a
//! single bundle.
//!
//! # Capability resolution (for beginners)
//!
//! A capability the current build cannot provide is not an error at startup.
//! [`NativeBackends::detect`] plugs in an [`unavailable::Unavailable`] value
//! for it instead, logs a warning once, and every later call through that
//! capability returns [`PlatformError::Unavailable`].  Callers treat that the
//! same way as any other collaborator failure: the request reports
//! `success: false` and the session carries on.
//!
//! # Sub-modules
//!
//! - **`process`**     – Launches applications for `app` shortcuts.
//! - **`unavailable`** – Stand-ins for capabilities with no backend.
//! - **`mock`**        – Recording test doubles used by unit and integration
//!   tests.

pub mod mock;
pub mod process;
pub mod unavailable;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use localdesk_core::protocol::{
    input::{MediaAction, MediaStatus, MouseButton, PointerPosition},
    session::{IceCandidate, SessionDescription},
};

use crate::application::connection::ConnectionId;

/// Error type for native collaborator calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// No backend for this capability exists in the current build.
    #[error("{capability} is not available on this host")]
    Unavailable { capability: &'static str },

    /// The executable for an `app` shortcut does not exist.
    #[error("application not found: {}", path.display())]
    AppNotFound { path: PathBuf },

    /// The executable exists but could not be started.
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend reported a failure.
    #[error("platform error: {0}")]
    Backend(String),
}

/// Injects key chords and literal text.
#[cfg_attr(test, mockall::automock)]
pub trait KeyInjector: Send + Sync {
    /// Presses `keys` in order, then releases them in reverse order.
    fn send_keys(&self, keys: &[String]) -> Result<(), PlatformError>;

    /// Types `text` as if entered on a keyboard.
    fn type_text(&self, text: &str) -> Result<(), PlatformError>;
}

/// Starts applications.
pub trait AppLauncher: Send + Sync {
    /// Launches the executable at `path` with its own directory as the
    /// working directory.
    fn launch(&self, path: &Path) -> Result<(), PlatformError>;
}

/// Moves and clicks the system pointer using normalized coordinates.
pub trait PointerControl: Send + Sync {
    fn move_to(&self, position: PointerPosition) -> Result<(), PlatformError>;
    fn click(&self, button: MouseButton, position: PointerPosition) -> Result<(), PlatformError>;
    fn button_down(&self, button: MouseButton, position: PointerPosition)
        -> Result<(), PlatformError>;
    fn button_up(&self, button: MouseButton, position: PointerPosition)
        -> Result<(), PlatformError>;
    fn scroll(&self, delta_x: f64, delta_y: f64) -> Result<(), PlatformError>;
}

/// System output volume.
pub trait AudioControl: Send + Sync {
    /// Current level, `0..=100`.
    fn volume(&self) -> Result<u8, PlatformError>;
    fn set_volume(&self, level: u8) -> Result<(), PlatformError>;
    fn set_mute(&self, muted: bool) -> Result<(), PlatformError>;
}

/// The OS media session ("now playing").
pub trait MediaSession: Send + Sync {
    fn status(&self) -> Result<MediaStatus, PlatformError>;
    fn control(&self, action: MediaAction) -> Result<(), PlatformError>;
}

/// A screen or window that can be shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenSource {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Connection state reported by the capture collaborator's peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// Returns `true` for states after which the stream will not recover.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Asynchronous notifications from the capture collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A locally gathered ICE candidate; `None` marks end-of-candidates.
    LocalCandidate {
        connection: ConnectionId,
        candidate: Option<IceCandidate>,
    },
    StateChanged {
        connection: ConnectionId,
        state: PeerConnectionState,
    },
}

/// Screen capture plus the local side of the peer connection.
///
/// One capture session exists per connection.  `stop` must be idempotent:
/// the host calls it on every disconnect whether or not a session was ever
/// started.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Starts capturing `source_id` (or the primary screen) for
    /// `connection`, applies the remote `offer`, and returns the local
    /// answer.  Later candidates and state changes are reported on `events`.
    async fn start(
        &self,
        connection: ConnectionId,
        source_id: Option<String>,
        offer: SessionDescription,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<SessionDescription, PlatformError>;

    /// Applies a remote candidate; `None` signals end-of-candidates.
    async fn add_ice_candidate(
        &self,
        connection: ConnectionId,
        candidate: Option<IceCandidate>,
    ) -> Result<(), PlatformError>;

    /// Stops tracks and closes the peer connection for `connection`.
    async fn stop(&self, connection: ConnectionId);

    /// Lists shareable sources.
    fn sources(&self) -> Vec<ScreenSource>;
}

/// The resolved set of native collaborators.
#[derive(Clone)]
pub struct NativeBackends {
    pub keys: Arc<dyn KeyInjector>,
    pub launcher: Arc<dyn AppLauncher>,
    pub pointer: Arc<dyn PointerControl>,
    pub audio: Arc<dyn AudioControl>,
    pub media: Arc<dyn MediaSession>,
    pub capture: Arc<dyn ScreenCapture>,
}

impl NativeBackends {
    /// Resolves the collaborators available in this build.
    ///
    /// Process launch works everywhere.  Input injection, audio, media and
    /// capture have no in-tree backend; each is replaced by
    /// [`unavailable::Unavailable`] and a warning is logged so operators can
    /// see which features the phone will report as failed.
    pub fn detect() -> Self {
        let missing = ["key injection", "pointer control", "audio", "media", "screen capture"];
        for capability in missing {
            warn!("{capability} backend not available; requests will report failure");
        }

        Self {
            keys: Arc::new(unavailable::Unavailable::new("key injection")),
            launcher: Arc::new(process::ProcessLauncher),
            pointer: Arc::new(unavailable::Unavailable::new("pointer control")),
            audio: Arc::new(unavailable::Unavailable::new("audio")),
            media: Arc::new(unavailable::Unavailable::new("media")),
            capture: Arc::new(unavailable::Unavailable::new("screen capture")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_peer_states() {
        assert!(PeerConnectionState::Failed.is_terminal());
        assert!(PeerConnectionState::Disconnected.is_terminal());
        assert!(PeerConnectionState::Closed.is_terminal());
        assert!(!PeerConnectionState::Connected.is_terminal());
        assert!(!PeerConnectionState::Connecting.is_terminal());
    }

    #[test]
    fn test_detect_reports_unavailable_key_injection() {
        // Arrange
        let backends = NativeBackends::detect();

        // Act
        let result = backends.keys.send_keys(&["CONTROL".to_string(), "S".to_string()]);

        // Assert
        assert!(matches!(result, Err(PlatformError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_detect_capture_lists_no_sources_and_stop_is_safe() {
        let backends = NativeBackends::detect();
        assert!(backends.capture.sources().is_empty());
        backends.capture.stop(ConnectionId::new()).await;
    }

    #[test]
    fn test_platform_error_messages_name_the_path() {
        let err = PlatformError::AppNotFound {
            path: PathBuf::from("/opt/missing"),
        };
        assert!(err.to_string().contains("/opt/missing"));
    }
}
