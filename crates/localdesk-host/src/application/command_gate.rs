//! Authorization gate in front of shortcut execution.
//!
//! `execute-shortcut` is the only way a client changes state on the host
//! outside a screen-share session, so every request is checked against the
//! session registry *and* the trust store at the moment it arrives.  A
//! device whose trust was revoked after connecting is rejected here even
//! though its session is still open.
//!
//! An authorized request is split into its two halves:
//!
//! - `keys` (for `actionType` `keys` or `both`) goes to the key injector,
//! - `appPath` (for `app` or `both`) goes to the application launcher.
//!
//! A missing half is skipped.  A collaborator failure makes the result
//! `success: false` but is not an authorization error.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use localdesk_core::{
    protocol::session::{ExecuteResult, ExecuteShortcut},
    ServerMessage,
};

use super::connection::ConnectionHandle;
use super::state::HostState;

/// Error type for gate decisions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Unauthorized")]
    Unauthorized,
}

pub struct CommandGate {
    state: Arc<HostState>,
}

impl CommandGate {
    pub fn new(state: Arc<HostState>) -> Self {
        Self { state }
    }

    /// Runs `request` for the client on `handle` and replies with
    /// `execute-result`.  Returns the reported success flag.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] (after sending
    /// `error{message:"Unauthorized"}` to the client) when the connection has
    /// no session or its device is no longer trusted.  No collaborator is
    /// invoked in that case.
    pub async fn execute(
        &self,
        handle: &ConnectionHandle,
        request: ExecuteShortcut,
    ) -> Result<bool, GateError> {
        let authorized = {
            let reg = self.state.registries().await;
            reg.sessions.is_authorized(handle.id(), &reg.trust)
        };
        if !authorized {
            warn!(
                "connection {}: execute-shortcut {} rejected (unauthorized)",
                handle.id(),
                request.shortcut_id
            );
            handle.send(ServerMessage::error(GateError::Unauthorized.to_string()));
            return Err(GateError::Unauthorized);
        }

        let success = self.run(&request);
        handle.send(ServerMessage::ExecuteResult(ExecuteResult {
            success,
            shortcut_id: request.shortcut_id,
        }));
        Ok(success)
    }

    fn run(&self, request: &ExecuteShortcut) -> bool {
        let backends = self.state.backends();
        let keys = request
            .keys
            .as_deref()
            .filter(|k| request.action_type.sends_keys() && !k.is_empty());
        let app = request
            .app_path
            .as_deref()
            .map(str::trim)
            .filter(|p| request.action_type.launches_app() && !p.is_empty());

        if keys.is_none() && app.is_none() {
            debug!(
                "shortcut {} has nothing to run for action {:?}",
                request.shortcut_id, request.action_type
            );
            return true;
        }

        let mut success = true;
        if let Some(keys) = keys {
            match backends.keys.send_keys(keys) {
                Ok(()) => info!("shortcut {}: sent {}", request.shortcut_id, keys.join("+")),
                Err(e) => {
                    warn!("shortcut {}: key injection failed: {e}", request.shortcut_id);
                    success = false;
                }
            }
        }
        if let Some(path) = app {
            if let Err(e) = backends.launcher.launch(Path::new(path)) {
                warn!("shortcut {}: {e}", request.shortcut_id);
                success = false;
            }
        }
        success
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
