//! TOML-based configuration for the desktop host.
//!
//! Reads and writes [`HostConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\LocalDesk\config.toml`
//! - Linux:    `~/.config/localdesk/config.toml`
//! - macOS:    `~/Library/Application Support/LocalDesk/config.toml`
//!
//! The same directory holds `trusted.json` and `pages.json` unless
//! `host.data_dir` points elsewhere.
//!
//! ```toml
//! [host]
//! device_id = "6f1c2a4e-..."
//! device_name = "studio-pc"
//! log_level = "info"
//!
//! [network]
//! session_port = 3100
//! discovery_port = 45454
//! bind_address = "0.0.0.0"
//! advertise_mdns = true
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "..")]` function, so a missing file,
//! a missing section or a missing key all fall back to the same defaults.
//! The device id is the exception: it is generated once by
//! [`ensure_identity`] and written back so the host keeps the same identity
//! across restarts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use localdesk_core::DISCOVERY_PORT;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub network: NetworkSection,
}

/// Identity and housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// Stable host identity; empty until [`ensure_identity`] fills it.
    #[serde(default)]
    pub device_id: String,
    /// Name shown on phones; empty means the machine host name.
    #[serde(default)]
    pub device_name: String,
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for `trusted.json` and `pages.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Ports and bind address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// WebSocket session channel and HTTP surface, on one listener.
    #[serde(default = "default_session_port")]
    pub session_port: u16,
    /// UDP discovery responder.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_true")]
    pub advertise_mdns: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_session_port() -> u16 {
    3100
}
fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_name: String::new(),
            log_level: default_log_level(),
            data_dir: None,
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            session_port: default_session_port(),
            discovery_port: default_discovery_port(),
            bind_address: default_bind_address(),
            advertise_mdns: default_true(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the directory if needed.
pub fn save_config(path: &Path, config: &HostConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Fills a missing device id and device name.  Returns `true` if the config
/// changed and should be saved.
pub fn ensure_identity(config: &mut HostConfig) -> bool {
    let mut changed = false;
    if config.host.device_id.trim().is_empty() {
        config.host.device_id = Uuid::new_v4().to_string();
        changed = true;
    }
    if config.host.device_name.trim().is_empty() {
        config.host.device_name = machine_name();
        changed = true;
    }
    changed
}

/// The directory holding the JSON stores for `config`.
pub fn data_dir(config: &HostConfig) -> Result<PathBuf, ConfigError> {
    match &config.host.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => config_dir(),
    }
}

/// Best-effort host name of this machine.
pub fn machine_name() -> String {
    let from_env = ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|n| !n.trim().is_empty());
    if let Some(name) = from_env {
        return name.trim().to_string();
    }

    etc_hostname().unwrap_or_else(|| "LocalDesk Host".to_string())
}

#[cfg(unix)]
fn etc_hostname() -> Option<String> {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

#[cfg(not(unix))]
fn etc_hostname() -> Option<String> {
    None
}

/// Resolves the platform config directory including the `LocalDesk`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LocalDesk"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("localdesk"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LocalDesk")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("localdesk-config-{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults_match_documented_ports() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.network.session_port, 3100);
        assert_eq!(cfg.network.discovery_port, 45454);
        assert!(cfg.network.advertise_mdns);
        assert_eq!(cfg.host.log_level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults_for_missing_fields() {
        // Arrange
        let toml_str = "[network]\nsession_port = 4000\n";

        // Act
        let cfg: HostConfig = toml::from_str(toml_str).expect("parse");

        // Assert
        assert_eq!(cfg.network.session_port, 4000);
        assert_eq!(cfg.network.discovery_port, 45454);
        assert_eq!(cfg.host, HostSection::default());
    }

    #[test]
    fn test_separate_http_port_key_is_ignored() {
        // Older configs carried a second port for HTTP.
        let toml_str = "[network]\nsession_port = 4000\nhttp_port = 4001\n";

        let cfg: HostConfig = toml::from_str(toml_str).expect("unknown keys are tolerated");

        assert_eq!(cfg.network.session_port, 4000);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config(&temp_path("config.toml")).expect("missing file is not an error");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_identity() {
        // Arrange
        let path = temp_path("config.toml");
        let mut cfg = HostConfig::default();
        assert!(ensure_identity(&mut cfg));

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded.host.device_id, cfg.host.device_id);
        assert!(!loaded.host.device_name.is_empty());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_ensure_identity_keeps_existing_values() {
        let mut cfg = HostConfig::default();
        cfg.host.device_id = "fixed".to_string();
        cfg.host.device_name = "Desk".to_string();

        assert!(!ensure_identity(&mut cfg));
        assert_eq!(cfg.host.device_id, "fixed");
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        // Arrange
        let path = temp_path("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[network\nsession_port = ").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_data_dir_override() {
        let mut cfg = HostConfig::default();
        cfg.host.data_dir = Some(PathBuf::from("/srv/localdesk"));
        assert_eq!(data_dir(&cfg).unwrap(), PathBuf::from("/srv/localdesk"));
    }
}
