//! Remote-control payloads relayed during a live screen-share session.
//!
//! Pointer coordinates are normalized to the shared screen: `0.0` is the
//! left/top edge and `1.0` the right/bottom edge.  Out-of-range values are
//! clamped on receipt rather than rejected, because touch gestures routinely
//! overshoot the video frame by a pixel or two.

use serde::{Deserialize, Serialize};

/// A mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// A normalized pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    /// Returns the position clamped to `0.0..=1.0` on both axes.
    ///
    /// `NaN` maps to `0.0`.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Payload of click, button-down and button-up events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    #[serde(default)]
    pub button: MouseButton,
    pub x: f64,
    pub y: f64,
}

impl MouseButtonEvent {
    pub fn position(&self) -> PointerPosition {
        PointerPosition {
            x: self.x,
            y: self.y,
        }
        .clamped()
    }
}

/// Wheel movement in client-reported units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseScroll {
    #[serde(default)]
    pub delta_x: f64,
    #[serde(default)]
    pub delta_y: f64,
}

/// Either literal text to type, a key chord, or both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyboardInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
}

/// Media transport commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaAction {
    #[serde(alias = "playpause", alias = "play")]
    PlayPause,
    Next,
    #[serde(alias = "prev")]
    Previous,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaControl {
    pub action: MediaAction,
}

/// Volume commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeAction {
    Up,
    Down,
    Mute,
    Unmute,
    /// Absolute level; requires a `value`.
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeControl {
    pub action: VolumeAction,
    /// Percentage for [`VolumeAction::Set`], ignored otherwise.
    #[serde(default)]
    pub value: Option<f64>,
}

impl VolumeControl {
    /// Returns the requested level clamped to `0..=100`, if any.
    pub fn level(&self) -> Option<u8> {
        self.value
            .filter(|v| !v.is_nan())
            .map(|v| v.clamp(0.0, 100.0).round() as u8)
    }
}

/// Snapshot of the system media session, served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    pub is_playing: bool,
    pub title: String,
    pub artist: String,
    /// Seconds.
    pub duration: f64,
    /// Seconds.
    pub position: f64,
    pub success: bool,
}

impl MediaStatus {
    /// Status reported when no media backend is available.
    pub fn unavailable() -> Self {
        Self {
            is_playing: false,
            title: "No media player found".to_string(),
            artist: String::new(),
            duration: 0.0,
            position: 0.0,
            success: false,
        }
    }
}
