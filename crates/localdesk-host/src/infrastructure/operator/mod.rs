//! Operator command surface.
//!
//! Every operation a desktop UI (or the built-in console) can perform on
//! the host lives here and delegates to the application layer.  The
//! presentation layer is the only consumer of this module.
//!
//! # `CommandResult<T>` wrapper
//!
//! All commands return `CommandResult<T>` rather than `Result<T, E>`, so
//! every response has the same JSON shape:
//! `{ success: bool, data: T | null, error: string | null }`.
//! A UI can always read `result.success` without special error handling.

pub mod console;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use localdesk_core::{DeviceId, Page, Shortcut, ShortcutId, TrustedDevice};

use crate::application::{
    pages::{PageEditor, ShortcutDraft},
    pairing::{ApprovalRequest, PairingCoordinator, Resolution},
    sessions::SessionSummary,
    state::HostState,
};

/// Unified response wrapper for operator commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl<T: Serialize, E: std::fmt::Display> From<Result<T, E>> for CommandResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// DTO describing the running host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoDto {
    pub device_id: String,
    pub device_name: String,
    pub session_port: u16,
    pub connected_clients: usize,
    pub trusted_devices: usize,
    pub pending_pairings: usize,
}

/// The operator's handle on a running host.
pub struct OperatorApi {
    state: Arc<HostState>,
    pairing: PairingCoordinator,
    pages: PageEditor,
}

impl OperatorApi {
    pub fn new(state: Arc<HostState>) -> Self {
        Self {
            pairing: PairingCoordinator::new(Arc::clone(&state)),
            pages: PageEditor::new(Arc::clone(&state)),
            state,
        }
    }

    // ── Pairing and trust ─────────────────────────────────────────────────

    /// Approves or rejects the pending request of `device_id`.  `data` is
    /// `true` when the decision reached a still-connected device.
    pub async fn approve_pairing(&self, device_id: &str, approved: bool) -> CommandResult<bool> {
        self.pairing
            .resolve_claim(&DeviceId::new(device_id), approved)
            .await
            .map(|resolution| match resolution {
                Resolution::Approved { delivered } | Resolution::Rejected { delivered } => delivered,
            })
            .into()
    }

    pub async fn pending_pairings(&self) -> CommandResult<Vec<ApprovalRequest>> {
        CommandResult::ok(self.pairing.pending().await)
    }

    pub async fn trusted_devices(&self) -> CommandResult<Vec<TrustedDevice>> {
        CommandResult::ok(self.state.trusted_devices().await)
    }

    /// Removes a device from the trust store.  A live session of that
    /// device stays open, but its next command is rejected.
    pub async fn remove_trusted_device(&self, device_id: &str) -> CommandResult<TrustedDevice> {
        match self.state.revoke(&DeviceId::new(device_id)).await {
            Some(removed) => CommandResult::ok(removed),
            None => CommandResult::err(format!("device {device_id} is not trusted")),
        }
    }

    pub async fn connected_clients(&self) -> CommandResult<Vec<SessionSummary>> {
        CommandResult::ok(self.state.connected_clients().await)
    }

    pub async fn server_info(&self) -> CommandResult<ServerInfoDto> {
        let identity = self.state.identity();
        let reg = self.state.registries().await;
        CommandResult::ok(ServerInfoDto {
            device_id: identity.device_id.to_string(),
            device_name: identity.device_name.clone(),
            session_port: identity.session_port,
            connected_clients: reg.sessions.len(),
            trusted_devices: reg.trust.len(),
            pending_pairings: reg.pending.len(),
        })
    }

    // ── Pages ─────────────────────────────────────────────────────────────

    pub async fn pages(&self) -> CommandResult<Vec<Page>> {
        CommandResult::ok(self.state.pages().await)
    }

    pub async fn set_pages(&self, pages: Vec<Page>) -> CommandResult<Vec<Page>> {
        self.pages.set_pages(pages).await.into()
    }

    pub async fn add_page(
        &self,
        name: &str,
        icon: Option<String>,
        target_app: Option<String>,
    ) -> CommandResult<Page> {
        if name.trim().is_empty() {
            return CommandResult::err("page name must not be empty");
        }
        self.pages.add_page(name, icon, target_app).await.into()
    }

    pub async fn rename_page(&self, page_id: &str, name: &str) -> CommandResult<Vec<Page>> {
        if name.trim().is_empty() {
            return CommandResult::err("page name must not be empty");
        }
        self.pages.rename_page(page_id, name).await.into()
    }

    pub async fn set_page_target_app(
        &self,
        page_id: &str,
        target_app: Option<String>,
    ) -> CommandResult<Vec<Page>> {
        self.pages.set_target_app(page_id, target_app).await.into()
    }

    pub async fn delete_page(&self, page_id: &str) -> CommandResult<Vec<Page>> {
        self.pages.delete_page(page_id).await.into()
    }

    pub async fn add_shortcut(&self, page_id: &str, draft: ShortcutDraft) -> CommandResult<Shortcut> {
        self.pages.add_shortcut(page_id, draft).await.into()
    }

    pub async fn update_shortcut(
        &self,
        page_id: &str,
        shortcut_id: ShortcutId,
        draft: ShortcutDraft,
    ) -> CommandResult<Vec<Page>> {
        self.pages
            .update_shortcut(page_id, &shortcut_id, draft)
            .await
            .into()
    }

    pub async fn reorder_shortcuts(
        &self,
        page_id: &str,
        shortcut_ids: Vec<ShortcutId>,
    ) -> CommandResult<Vec<Page>> {
        self.pages.reorder_shortcuts(page_id, &shortcut_ids).await.into()
    }

    pub async fn delete_shortcut(
        &self,
        page_id: &str,
        shortcut_id: ShortcutId,
    ) -> CommandResult<Vec<Page>> {
        self.pages.delete_shortcut(page_id, &shortcut_id).await.into()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{drain, TestHost};
    use localdesk_core::{protocol::session::PairRequest, DeviceKind, ServerMessage};

    #[test]
    fn test_command_result_ok_shape() {
        // Arrange / Act
        let json = serde_json::to_value(CommandResult::ok(3u32)).unwrap();

        // Assert
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 3);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_command_result_from_error() {
        let result: CommandResult<u8> = Err::<u8, _>("boom").into();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_approve_unknown_device_is_soft_failure() {
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());

        let result = api.approve_pairing("ghost", true).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_approve_pending_device_reports_delivery() {
        // Arrange
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());
        let (handle, mut queue) = host.connect();
        PairingCoordinator::new(host.state.clone())
            .submit_claim(
                PairRequest {
                    device_id: DeviceId::new("phone"),
                    device_name: "Phone".to_string(),
                    device_type: DeviceKind::Mobile,
                },
                &handle,
            )
            .await;

        // Act
        let pending = api.pending_pairings().await;
        let result = api.approve_pairing("phone", true).await;

        // Assert
        assert_eq!(pending.data.unwrap().len(), 1);
        assert_eq!(result.data, Some(true));
        assert!(matches!(drain(&mut queue)[0], ServerMessage::PairResponse(_)));
        assert_eq!(api.trusted_devices().await.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_trusted_device_fails() {
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());

        assert!(!api.remove_trusted_device("nobody").await.success);
    }

    #[tokio::test]
    async fn test_server_info_counts() {
        let host = TestHost::with_trusted(&["a", "b"]);
        let api = OperatorApi::new(host.state.clone());

        let info = api.server_info().await.data.unwrap();

        assert_eq!(info.trusted_devices, 2);
        assert_eq!(info.connected_clients, 0);
        assert_eq!(info.session_port, 3100);
    }

    #[tokio::test]
    async fn test_reorder_shortcuts_command() {
        // Arrange
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());
        let order = vec![
            ShortcutId::Number(2),
            ShortcutId::Number(3),
            ShortcutId::Number(1),
        ];

        // Act
        let ok = api.reorder_shortcuts("default", order.clone()).await;
        let bad = api.reorder_shortcuts("default", vec![ShortcutId::Number(2)]).await;

        // Assert
        let ids: Vec<ShortcutId> = ok.data.unwrap()[0]
            .shortcuts
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, order);
        assert!(!bad.success);
        assert_eq!(host.page_snapshots.count(), 1);
    }

    #[tokio::test]
    async fn test_set_page_target_app_command() {
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());

        let result = api
            .set_page_target_app("default", Some("code".to_string()))
            .await;
        let missing = api.set_page_target_app("nope", None).await;

        assert_eq!(result.data.unwrap()[0].target_app.as_deref(), Some("code"));
        assert!(missing.error.unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_add_page_rejects_blank_name() {
        let host = TestHost::new();
        let api = OperatorApi::new(host.state.clone());

        assert!(!api.add_page("  ", None, None).await.success);
        assert_eq!(host.state.pages().await.len(), 1);
    }
}
