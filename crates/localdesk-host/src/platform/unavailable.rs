//! Stand-in for capabilities that have no backend in this build.
//!
//! Every call returns [`PlatformError::Unavailable`] naming the capability,
//! except `ScreenCapture::stop` (nothing to stop) and `sources` (nothing to
//! share).

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use localdesk_core::protocol::{
    input::{MediaAction, MediaStatus, MouseButton, PointerPosition},
    session::{IceCandidate, SessionDescription},
};

use super::{
    AppLauncher, AudioControl, CaptureEvent, KeyInjector, MediaSession, PlatformError,
    PointerControl, ScreenCapture, ScreenSource,
};
use crate::application::connection::ConnectionId;

#[derive(Debug, Clone, Copy)]
pub struct Unavailable {
    capability: &'static str,
}

impl Unavailable {
    pub fn new(capability: &'static str) -> Self {
        Self { capability }
    }

    fn err<T>(&self) -> Result<T, PlatformError> {
        Err(PlatformError::Unavailable {
            capability: self.capability,
        })
    }
}

impl KeyInjector for Unavailable {
    fn send_keys(&self, _keys: &[String]) -> Result<(), PlatformError> {
        self.err()
    }

    fn type_text(&self, _text: &str) -> Result<(), PlatformError> {
        self.err()
    }
}

impl AppLauncher for Unavailable {
    fn launch(&self, _path: &Path) -> Result<(), PlatformError> {
        self.err()
    }
}

impl PointerControl for Unavailable {
    fn move_to(&self, _position: PointerPosition) -> Result<(), PlatformError> {
        self.err()
    }

    fn click(&self, _button: MouseButton, _position: PointerPosition) -> Result<(), PlatformError> {
        self.err()
    }

    fn button_down(
        &self,
        _button: MouseButton,
        _position: PointerPosition,
    ) -> Result<(), PlatformError> {
        self.err()
    }

    fn button_up(
        &self,
        _button: MouseButton,
        _position: PointerPosition,
    ) -> Result<(), PlatformError> {
        self.err()
    }

    fn scroll(&self, _delta_x: f64, _delta_y: f64) -> Result<(), PlatformError> {
        self.err()
    }
}

impl AudioControl for Unavailable {
    fn volume(&self) -> Result<u8, PlatformError> {
        self.err()
    }

    fn set_volume(&self, _level: u8) -> Result<(), PlatformError> {
        self.err()
    }

    fn set_mute(&self, _muted: bool) -> Result<(), PlatformError> {
        self.err()
    }
}

impl MediaSession for Unavailable {
    fn status(&self) -> Result<MediaStatus, PlatformError> {
        self.err()
    }

    fn control(&self, _action: MediaAction) -> Result<(), PlatformError> {
        self.err()
    }
}

#[async_trait]
impl ScreenCapture for Unavailable {
    async fn start(
        &self,
        _connection: ConnectionId,
        _source_id: Option<String>,
        _offer: SessionDescription,
        _events: mpsc::Sender<CaptureEvent>,
    ) -> Result<SessionDescription, PlatformError> {
        self.err()
    }

    async fn add_ice_candidate(
        &self,
        _connection: ConnectionId,
        _candidate: Option<IceCandidate>,
    ) -> Result<(), PlatformError> {
        self.err()
    }

    async fn stop(&self, _connection: ConnectionId) {}

    fn sources(&self) -> Vec<ScreenSource> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_error_names_capability() {
        let audio = Unavailable::new("audio");
        let err = audio.volume().unwrap_err();
        assert_eq!(err.to_string(), "audio is not available on this host");
    }

    #[tokio::test]
    async fn test_unavailable_capture_start_fails() {
        // Arrange
        let capture = Unavailable::new("screen capture");
        let (tx, _rx) = mpsc::channel(1);

        // Act
        let result = capture
            .start(
                ConnectionId::new(),
                None,
                SessionDescription {
                    sdp_type: "offer".to_string(),
                    sdp: "v=0".to_string(),
                },
                tx,
            )
            .await;

        // Assert
        assert!(matches!(result, Err(PlatformError::Unavailable { .. })));
    }
}
