//! Pages of shortcut buttons.
//!
//! The host stores pages and pushes them to authorized sessions; the phone
//! renders each page as a grid of buttons.  A [`Shortcut`] describes either a
//! key chord to inject, an application to launch, or both.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a shortcut.
///
/// Older configurations use small integers, newer clients may send strings.
/// Both forms are accepted and echoed back unchanged in `execute-result`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShortcutId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ShortcutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ShortcutId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ShortcutId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// What pressing a shortcut does on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    #[default]
    Keys,
    App,
    Both,
}

impl ActionType {
    /// Returns `true` if this action injects a key chord.
    pub fn sends_keys(self) -> bool {
        matches!(self, Self::Keys | Self::Both)
    }

    /// Returns `true` if this action launches an application.
    pub fn launches_app(self) -> bool {
        matches!(self, Self::App | Self::Both)
    }
}

/// A single button on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortcut {
    pub id: ShortcutId,
    pub label: String,
    /// Key names in press order, e.g. `["CONTROL", "S"]`.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

/// A named group of shortcuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Application the page is meant for; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_app: Option<String>,
    #[serde(default)]
    pub shortcuts: Vec<Shortcut>,
}

impl Page {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            target_app: None,
            shortcuts: Vec::new(),
        }
    }

    pub fn shortcut(&self, id: &ShortcutId) -> Option<&Shortcut> {
        self.shortcuts.iter().find(|s| &s.id == id)
    }

    /// Returns the next free numeric shortcut id on this page.
    pub fn next_shortcut_id(&self) -> ShortcutId {
        let max = self
            .shortcuts
            .iter()
            .filter_map(|s| match s.id {
                ShortcutId::Number(n) => Some(n),
                ShortcutId::Text(_) => None,
            })
            .max()
            .unwrap_or(0);
        ShortcutId::Number(max + 1)
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|k| k.to_string()).collect()
}

/// The page set written on first run.
pub fn default_pages() -> Vec<Page> {
    let mut page = Page::new("default", "General");
    page.shortcuts = vec![
        Shortcut {
            id: ShortcutId::Number(1),
            label: "OBS Start/Stop".to_string(),
            keys: keys(&["CONTROL", "ALT", "O"]),
            app_path: None,
            action_type: ActionType::Keys,
            color: "#1F6FEB".to_string(),
            icon: "obs.png".to_string(),
        },
        Shortcut {
            id: ShortcutId::Number(2),
            label: "Save".to_string(),
            keys: keys(&["CONTROL", "S"]),
            app_path: None,
            action_type: ActionType::Keys,
            color: "#00C853".to_string(),
            icon: "save.png".to_string(),
        },
        Shortcut {
            id: ShortcutId::Number(3),
            label: "Copy".to_string(),
            keys: keys(&["CONTROL", "C"]),
            app_path: None,
            action_type: ActionType::Keys,
            color: "#FF9800".to_string(),
            icon: "copy.png".to_string(),
        },
    ];
    vec![page]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
