//! HTTP bootstrap surface.
//!
//! Read-mostly endpoints the phone calls before (or alongside) the session
//! channel: identity, pages, shareable screens, volume and media status.
//! Nothing here changes connectivity state, so none of it requires a
//! paired session.  The routes share one listener with the session channel
//! (see [`super::server`]).
//!
//! | Route                       | Response                                   |
//! |-----------------------------|--------------------------------------------|
//! | `GET /device-info`          | `{id,name,type,version,platform}`          |
//! | `GET /pages`                | `Page[]`                                   |
//! | `GET /shortcuts`            | shortcuts of the first page                |
//! | `GET /screen-sources`       | `ScreenSource[]`                           |
//! | `GET /screen-info?sourceId` | one `ScreenSource`, or 404                 |
//! | `GET /volume`               | `{volume,success}`                         |
//! | `POST /volume {volume}`     | `{volume,success}`                         |
//! | `GET /media-status`         | `MediaStatus`                              |
//! | `GET /health`               | `{status:"ok",timestamp}`                  |

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use localdesk_core::{
    protocol::{discovery::PROTOCOL_VERSION, input::MediaStatus},
    DeviceKind, Page, Shortcut,
};

use crate::application::state::{now_ms, HostState};
use crate::platform::ScreenSource;

/// Reported when the audio backend cannot be read.
const FALLBACK_VOLUME: u8 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub version: String,
    pub platform: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeReply {
    pub volume: u8,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetVolume {
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScreenInfoQuery {
    #[serde(rename = "sourceId")]
    pub source_id: Option<String>,
}

/// Builds the router over the shared host state.
pub fn router(state: Arc<HostState>) -> Router {
    Router::new()
        .route("/device-info", get(device_info))
        .route("/pages", get(pages))
        .route("/shortcuts", get(shortcuts))
        .route("/screen-sources", get(screen_sources))
        .route("/screen-info", get(screen_info))
        .route("/volume", get(volume).post(set_volume))
        .route("/media-status", get(media_status))
        .route("/health", get(health))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn device_info(State(state): State<Arc<HostState>>) -> Json<DeviceInfo> {
    let identity = state.identity();
    Json(DeviceInfo {
        id: identity.device_id.to_string(),
        name: identity.device_name.clone(),
        kind: DeviceKind::Desktop,
        version: PROTOCOL_VERSION.to_string(),
        platform: std::env::consts::OS.to_string(),
    })
}

async fn pages(State(state): State<Arc<HostState>>) -> Json<Vec<Page>> {
    Json(state.pages().await)
}

async fn shortcuts(State(state): State<Arc<HostState>>) -> Json<Vec<Shortcut>> {
    let first = state
        .pages()
        .await
        .into_iter()
        .next()
        .map(|p| p.shortcuts)
        .unwrap_or_default();
    Json(first)
}

async fn screen_sources(State(state): State<Arc<HostState>>) -> Json<Vec<ScreenSource>> {
    Json(state.backends().capture.sources())
}

async fn screen_info(
    State(state): State<Arc<HostState>>,
    Query(query): Query<ScreenInfoQuery>,
) -> Response {
    let sources = state.backends().capture.sources();
    let found = match query.source_id.as_deref() {
        Some(id) => sources.into_iter().find(|s| s.id == id),
        None => sources.into_iter().next(),
    };
    match found {
        Some(source) => Json(source).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "screen source not found" })),
        )
            .into_response(),
    }
}

async fn volume(State(state): State<Arc<HostState>>) -> Json<VolumeReply> {
    Json(match state.backends().audio.volume() {
        Ok(volume) => VolumeReply {
            volume,
            success: true,
        },
        Err(e) => {
            debug!("volume read failed: {e}");
            VolumeReply {
                volume: FALLBACK_VOLUME,
                success: false,
            }
        }
    })
}

async fn set_volume(
    State(state): State<Arc<HostState>>,
    Json(body): Json<SetVolume>,
) -> Json<VolumeReply> {
    let level = if body.volume.is_nan() {
        0
    } else {
        body.volume.clamp(0.0, 100.0).round() as u8
    };
    let success = match state.backends().audio.set_volume(level) {
        Ok(()) => true,
        Err(e) => {
            warn!("set volume to {level} failed: {e}");
            false
        }
    };
    Json(VolumeReply {
        volume: level,
        success,
    })
}

async fn media_status(State(state): State<Arc<HostState>>) -> Json<MediaStatus> {
    Json(state.backends().media.status().unwrap_or_else(|e| {
        debug!("media status unavailable: {e}");
        MediaStatus::unavailable()
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": now_ms() }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::TestHost;
    use crate::platform::AudioControl;

    #[tokio::test]
    async fn test_device_info_reports_desktop_identity() {
        // Arrange
        let host = TestHost::new();

        // Act
        let Json(info) = device_info(State(host.state.clone())).await;

        // Assert
        assert_eq!(info.id, "host-under-test");
        assert_eq!(info.kind, DeviceKind::Desktop);
        assert_eq!(info.version, PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_shortcuts_returns_first_page() {
        let host = TestHost::new();

        let Json(list) = shortcuts(State(host.state.clone())).await;

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].label, "OBS Start/Stop");
    }

    #[tokio::test]
    async fn test_set_volume_clamps_and_applies() {
        // Arrange
        let host = TestHost::new();

        // Act
        let Json(reply) = set_volume(State(host.state.clone()), Json(SetVolume { volume: 140.0 })).await;

        // Assert
        assert_eq!(reply, VolumeReply { volume: 100, success: true });
        assert_eq!(host.backends.audio.volume().unwrap(), 100);
    }

    #[tokio::test]
    async fn test_screen_info_unknown_source_is_not_found() {
        let host = TestHost::new();

        let response = screen_info(
            State(host.state.clone()),
            Query(ScreenInfoQuery {
                source_id: Some("window:404".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_screen_info_without_id_returns_primary() {
        let host = TestHost::new();

        let response = screen_info(State(host.state.clone()), Query(ScreenInfoQuery { source_id: None })).await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}
