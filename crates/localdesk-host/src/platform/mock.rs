//! Recording test doubles for every native collaborator.
//!
//! These let unit and integration tests observe exactly which native calls
//! the connectivity layer made, without touching the real desktop.
//! [`MockBackends`] bundles one of each and converts into a
//! [`NativeBackends`].

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use localdesk_core::protocol::{
    input::{MediaAction, MediaStatus, MouseButton, PointerPosition},
    session::{IceCandidate, SessionDescription},
};

use super::{
    AppLauncher, AudioControl, CaptureEvent, KeyInjector, MediaSession, NativeBackends,
    PlatformError, PointerControl, ScreenCapture, ScreenSource,
};
use crate::application::connection::ConnectionId;

fn backend_failure() -> PlatformError {
    PlatformError::Backend("injected failure".to_string())
}

// ── Keys ──────────────────────────────────────────────────────────────────────

/// Records every chord and text passed to it.
#[derive(Default)]
pub struct RecordingKeys {
    chords: Mutex<Vec<Vec<String>>>,
    texts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingKeys {
    pub fn chords(&self) -> Vec<Vec<String>> {
        self.chords.lock().expect("lock poisoned").clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("lock poisoned").clone()
    }

    /// Makes every later call fail with [`PlatformError::Backend`].
    pub fn fail_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl KeyInjector for RecordingKeys {
    fn send_keys(&self, keys: &[String]) -> Result<(), PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(backend_failure());
        }
        self.chords.lock().expect("lock poisoned").push(keys.to_vec());
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), PlatformError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(backend_failure());
        }
        self.texts.lock().expect("lock poisoned").push(text.to_string());
        Ok(())
    }
}

// ── Launcher ──────────────────────────────────────────────────────────────────

/// Records launched paths without starting anything.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<PathBuf>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().expect("lock poisoned").clone()
    }
}

impl AppLauncher for RecordingLauncher {
    fn launch(&self, path: &Path) -> Result<(), PlatformError> {
        self.launched
            .lock()
            .expect("lock poisoned")
            .push(path.to_path_buf());
        Ok(())
    }
}

// ── Pointer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PointerCall {
    Move(PointerPosition),
    Click(MouseButton, PointerPosition),
    Down(MouseButton, PointerPosition),
    Up(MouseButton, PointerPosition),
    Scroll(f64, f64),
}

#[derive(Default)]
pub struct RecordingPointer {
    calls: Mutex<Vec<PointerCall>>,
}

impl RecordingPointer {
    pub fn calls(&self) -> Vec<PointerCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    fn record(&self, call: PointerCall) -> Result<(), PlatformError> {
        self.calls.lock().expect("lock poisoned").push(call);
        Ok(())
    }
}

impl PointerControl for RecordingPointer {
    fn move_to(&self, position: PointerPosition) -> Result<(), PlatformError> {
        self.record(PointerCall::Move(position))
    }

    fn click(&self, button: MouseButton, position: PointerPosition) -> Result<(), PlatformError> {
        self.record(PointerCall::Click(button, position))
    }

    fn button_down(
        &self,
        button: MouseButton,
        position: PointerPosition,
    ) -> Result<(), PlatformError> {
        self.record(PointerCall::Down(button, position))
    }

    fn button_up(&self, button: MouseButton, position: PointerPosition) -> Result<(), PlatformError> {
        self.record(PointerCall::Up(button, position))
    }

    fn scroll(&self, delta_x: f64, delta_y: f64) -> Result<(), PlatformError> {
        self.record(PointerCall::Scroll(delta_x, delta_y))
    }
}

// ── Audio / media ─────────────────────────────────────────────────────────────

/// In-memory volume and mute state, starting at 50 and unmuted.
pub struct RecordingAudio {
    level: Mutex<u8>,
    muted: Mutex<bool>,
}

impl Default for RecordingAudio {
    fn default() -> Self {
        Self {
            level: Mutex::new(50),
            muted: Mutex::new(false),
        }
    }
}

impl RecordingAudio {
    pub fn is_muted(&self) -> bool {
        *self.muted.lock().expect("lock poisoned")
    }
}

impl AudioControl for RecordingAudio {
    fn volume(&self) -> Result<u8, PlatformError> {
        Ok(*self.level.lock().expect("lock poisoned"))
    }

    fn set_volume(&self, level: u8) -> Result<(), PlatformError> {
        *self.level.lock().expect("lock poisoned") = level;
        Ok(())
    }

    fn set_mute(&self, muted: bool) -> Result<(), PlatformError> {
        *self.muted.lock().expect("lock poisoned") = muted;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMedia {
    actions: Mutex<Vec<MediaAction>>,
}

impl RecordingMedia {
    pub fn actions(&self) -> Vec<MediaAction> {
        self.actions.lock().expect("lock poisoned").clone()
    }
}

impl MediaSession for RecordingMedia {
    fn status(&self) -> Result<MediaStatus, PlatformError> {
        Ok(MediaStatus {
            is_playing: true,
            title: "Test Track".to_string(),
            artist: "Test Artist".to_string(),
            duration: 180.0,
            position: 42.0,
            success: true,
        })
    }

    fn control(&self, action: MediaAction) -> Result<(), PlatformError> {
        self.actions.lock().expect("lock poisoned").push(action);
        Ok(())
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureCall {
    Start {
        connection: ConnectionId,
        source_id: Option<String>,
    },
    Candidate {
        connection: ConnectionId,
        candidate: Option<IceCandidate>,
    },
    Stop(ConnectionId),
}

/// A capture collaborator that answers every offer with a canned SDP.
///
/// Tests can make `start` fail, hold `start` until released, and push
/// [`CaptureEvent`]s as if the peer connection produced them.
#[derive(Default)]
pub struct ScriptedCapture {
    calls: Mutex<Vec<CaptureCall>>,
    fail_start: AtomicBool,
    hold: Mutex<Option<Arc<Notify>>>,
    events: Mutex<Option<mpsc::Sender<CaptureEvent>>>,
}

impl ScriptedCapture {
    /// The answer SDP returned for `connection`.
    pub fn answer_for(connection: ConnectionId) -> SessionDescription {
        SessionDescription::answer(format!("v=0 answer-for-{connection}"))
    }

    pub fn calls(&self) -> Vec<CaptureCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn stop_count(&self, connection: ConnectionId) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == CaptureCall::Stop(connection))
            .count()
    }

    pub fn fail_starts(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Makes the next `start` wait until the returned [`Notify`] fires.
    pub fn hold_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().expect("lock poisoned") = Some(Arc::clone(&gate));
        gate
    }

    /// Emits an event on the sender captured by the last `start`.
    pub async fn emit(&self, event: CaptureEvent) {
        let tx = self.events.lock().expect("lock poisoned").clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    fn record(&self, call: CaptureCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

#[async_trait]
impl ScreenCapture for ScriptedCapture {
    async fn start(
        &self,
        connection: ConnectionId,
        source_id: Option<String>,
        _offer: SessionDescription,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<SessionDescription, PlatformError> {
        self.record(CaptureCall::Start {
            connection,
            source_id,
        });
        *self.events.lock().expect("lock poisoned") = Some(events);

        let gate = self.hold.lock().expect("lock poisoned").take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_start.load(Ordering::SeqCst) {
            return Err(PlatformError::Backend("capture source vanished".to_string()));
        }
        Ok(Self::answer_for(connection))
    }

    async fn add_ice_candidate(
        &self,
        connection: ConnectionId,
        candidate: Option<IceCandidate>,
    ) -> Result<(), PlatformError> {
        self.record(CaptureCall::Candidate {
            connection,
            candidate,
        });
        Ok(())
    }

    async fn stop(&self, connection: ConnectionId) {
        self.record(CaptureCall::Stop(connection));
    }

    fn sources(&self) -> Vec<ScreenSource> {
        vec![ScreenSource {
            id: "screen:0".to_string(),
            name: "Primary Display".to_string(),
            width: 1920,
            height: 1080,
        }]
    }
}

// ── Bundle ────────────────────────────────────────────────────────────────────

/// One recording double per capability, with typed access for assertions.
#[derive(Clone, Default)]
pub struct MockBackends {
    pub keys: Arc<RecordingKeys>,
    pub launcher: Arc<RecordingLauncher>,
    pub pointer: Arc<RecordingPointer>,
    pub audio: Arc<RecordingAudio>,
    pub media: Arc<RecordingMedia>,
    pub capture: Arc<ScriptedCapture>,
}

impl MockBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backends(&self) -> NativeBackends {
        NativeBackends {
            keys: self.keys.clone(),
            launcher: self.launcher.clone(),
            pointer: self.pointer.clone(),
            audio: self.audio.clone(),
            media: self.media.clone(),
            capture: self.capture.clone(),
        }
    }
}
