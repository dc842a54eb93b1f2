//! Editing the page book.
//!
//! Every mutation follows the same sequence under the registries lock:
//! change the in-memory book, schedule a snapshot for persistence, then push
//! `pages-update` and `shortcuts-update` to every session whose device is
//! still trusted.  The book always keeps at least one page.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use localdesk_core::{ActionType, Page, ServerMessage, Shortcut, ShortcutId};

use super::state::{HostState, Registries};

/// Error type for page book edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page not found: {page_id}")]
    PageNotFound { page_id: String },

    #[error("shortcut {shortcut_id} not found on page {page_id}")]
    ShortcutNotFound {
        page_id: String,
        shortcut_id: ShortcutId,
    },

    /// A reorder must list every shortcut of the page exactly once.
    #[error("new order for page {page_id} must list each of its shortcuts exactly once")]
    InvalidOrder { page_id: String },

    /// The edit would leave the book without pages.
    #[error("at least one page is required")]
    LastPage,
}

/// The editable fields of a shortcut; the id is assigned by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutDraft {
    pub label: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub app_path: Option<String>,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

impl ShortcutDraft {
    fn into_shortcut(self, id: ShortcutId) -> Shortcut {
        Shortcut {
            id,
            label: self.label,
            keys: self.keys,
            app_path: self.app_path.filter(|p| !p.trim().is_empty()),
            action_type: self.action_type,
            color: self.color,
            icon: self.icon,
        }
    }
}

pub struct PageEditor {
    state: Arc<HostState>,
}

impl PageEditor {
    pub fn new(state: Arc<HostState>) -> Self {
        Self { state }
    }

    /// Replaces the whole book.
    pub async fn set_pages(&self, pages: Vec<Page>) -> Result<Vec<Page>, PageError> {
        if pages.is_empty() {
            return Err(PageError::LastPage);
        }
        self.edit(|reg| {
            reg.pages = pages;
            Ok(())
        })
        .await
    }

    /// Appends an empty page and returns it.
    pub async fn add_page(
        &self,
        name: &str,
        icon: Option<String>,
        target_app: Option<String>,
    ) -> Result<Page, PageError> {
        let mut page = Page::new(Uuid::new_v4().to_string(), name.trim());
        page.icon = icon;
        page.target_app = target_app;
        let created = page.clone();
        self.edit(|reg| {
            reg.pages.push(page);
            Ok(())
        })
        .await?;
        info!("page '{}' added ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn rename_page(&self, page_id: &str, name: &str) -> Result<Vec<Page>, PageError> {
        self.edit(|reg| {
            page_mut(reg, page_id)?.name = name.trim().to_string();
            Ok(())
        })
        .await
    }

    /// Sets the application a page belongs to.  `None` or a blank name
    /// clears it.
    pub async fn set_target_app(
        &self,
        page_id: &str,
        target_app: Option<String>,
    ) -> Result<Vec<Page>, PageError> {
        let target_app = target_app
            .map(|app| app.trim().to_string())
            .filter(|app| !app.is_empty());
        self.edit(|reg| {
            page_mut(reg, page_id)?.target_app = target_app;
            Ok(())
        })
        .await
    }

    /// Deletes a page.  The last remaining page cannot be deleted.
    pub async fn delete_page(&self, page_id: &str) -> Result<Vec<Page>, PageError> {
        self.edit(|reg| {
            let index = reg
                .pages
                .iter()
                .position(|p| p.id == page_id)
                .ok_or_else(|| PageError::PageNotFound {
                    page_id: page_id.to_string(),
                })?;
            if reg.pages.len() == 1 {
                return Err(PageError::LastPage);
            }
            reg.pages.remove(index);
            Ok(())
        })
        .await
    }

    /// Adds a shortcut with the next free numeric id on its page.
    pub async fn add_shortcut(
        &self,
        page_id: &str,
        draft: ShortcutDraft,
    ) -> Result<Shortcut, PageError> {
        let mut created = None;
        self.edit(|reg| {
            let page = page_mut(reg, page_id)?;
            let shortcut = draft.into_shortcut(page.next_shortcut_id());
            created = Some(shortcut.clone());
            page.shortcuts.push(shortcut);
            Ok(())
        })
        .await?;
        created.ok_or_else(|| PageError::PageNotFound {
            page_id: page_id.to_string(),
        })
    }

    /// Replaces the editable fields of a shortcut, keeping its id.
    pub async fn update_shortcut(
        &self,
        page_id: &str,
        shortcut_id: &ShortcutId,
        draft: ShortcutDraft,
    ) -> Result<Vec<Page>, PageError> {
        self.edit(|reg| {
            let page = page_mut(reg, page_id)?;
            let slot = page
                .shortcuts
                .iter_mut()
                .find(|s| &s.id == shortcut_id)
                .ok_or_else(|| PageError::ShortcutNotFound {
                    page_id: page_id.to_string(),
                    shortcut_id: shortcut_id.clone(),
                })?;
            *slot = draft.into_shortcut(shortcut_id.clone());
            Ok(())
        })
        .await
    }

    /// Puts the shortcuts of a page in the order of `order`, which must be
    /// a permutation of the page's shortcut ids.
    pub async fn reorder_shortcuts(
        &self,
        page_id: &str,
        order: &[ShortcutId],
    ) -> Result<Vec<Page>, PageError> {
        self.edit(|reg| {
            let page = page_mut(reg, page_id)?;
            let invalid = || PageError::InvalidOrder {
                page_id: page_id.to_string(),
            };
            let unique: HashSet<&ShortcutId> = order.iter().collect();
            if unique.len() != order.len() || order.len() != page.shortcuts.len() {
                return Err(invalid());
            }
            let mut reordered = Vec::with_capacity(order.len());
            for id in order {
                let shortcut = page.shortcut(id).ok_or_else(invalid)?;
                reordered.push(shortcut.clone());
            }
            page.shortcuts = reordered;
            Ok(())
        })
        .await
    }

    pub async fn delete_shortcut(
        &self,
        page_id: &str,
        shortcut_id: &ShortcutId,
    ) -> Result<Vec<Page>, PageError> {
        self.edit(|reg| {
            let page = page_mut(reg, page_id)?;
            let before = page.shortcuts.len();
            page.shortcuts.retain(|s| &s.id != shortcut_id);
            if page.shortcuts.len() == before {
                return Err(PageError::ShortcutNotFound {
                    page_id: page_id.to_string(),
                    shortcut_id: shortcut_id.clone(),
                });
            }
            Ok(())
        })
        .await
    }

    /// Applies `change`; on success persists and broadcasts the new book.
    async fn edit<F>(&self, change: F) -> Result<Vec<Page>, PageError>
    where
        F: FnOnce(&mut Registries) -> Result<(), PageError>,
    {
        let mut reg = self.state.registries().await;
        change(&mut reg)?;
        self.state.persist_pages(&reg.pages);
        let mut reached = 0;
        for msg in ServerMessage::page_updates(&reg.pages) {
            reached = reg.sessions.broadcast(&msg, &reg.trust);
        }
        info!(
            "page book updated: {} page(s), pushed to {reached} session(s)",
            reg.pages.len()
        );
        Ok(reg.pages.clone())
    }
}

fn page_mut<'a>(reg: &'a mut Registries, page_id: &str) -> Result<&'a mut Page, PageError> {
    reg.pages
        .iter_mut()
        .find(|p| p.id == page_id)
        .ok_or_else(|| PageError::PageNotFound {
            page_id: page_id.to_string(),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
