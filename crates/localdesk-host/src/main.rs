//! LocalDesk desktop host: entry point.
//!
//! Runs the connectivity layer a phone needs to drive this desktop:
//!
//! - UDP discovery responder and mDNS advertisement, so phones can find it.
//! - WebSocket session channel for pairing, shortcut execution and WebRTC
//!   signaling.
//! - HTTP bootstrap surface for identity, pages, volume and media status,
//!   served on the same port as the session channel.
//! - A terminal console where the operator approves pairing requests.
//!
//! # Usage
//!
//! ```text
//! localdesk-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: platform config dir]
//!   --session-port <PORT>    Session channel and HTTP port [default: 3100]
//!   --discovery-port <PORT>  UDP discovery port [default: 45454]
//!   --device-name <NAME>     Name shown on phones
//!   --no-mdns                Do not advertise over mDNS
//! ```
//!
//! Flags override `config.toml` for this run only; they are not saved.
//!
//! | Variable                    | Flag               |
//! |-----------------------------|--------------------|
//! | `LOCALDESK_CONFIG`          | `--config`         |
//! | `LOCALDESK_SESSION_PORT`    | `--session-port`   |
//! | `LOCALDESK_DISCOVERY_PORT`  | `--discovery-port` |
//! | `LOCALDESK_DEVICE_NAME`     | `--device-name`    |
//!
//! `RUST_LOG` takes precedence over `host.log_level`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use localdesk_core::{default_pages, Device, DeviceId, DeviceKind, Page, TrustedDevice};
use localdesk_host::application::{
    dispatch::SessionDispatcher,
    state::{HostIdentity, HostParts, HostState, SnapshotSink},
};
use localdesk_host::infrastructure::{
    network::{
        advertise::MdnsAdvertiser, discovery::start_discovery_responder, server::HostServer,
    },
    operator::{
        console::{run_console, ChannelApprovalSink},
        OperatorApi,
    },
    storage::{
        config::{config_file_path, ensure_identity, load_config, save_config, HostConfig},
        records::{load_or_else, JsonFileStore, RecordStore, SnapshotFlusher},
    },
};
use localdesk_host::platform::NativeBackends;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LocalDesk desktop host.
#[derive(Debug, Parser)]
#[command(
    name = "localdesk-host",
    about = "Desktop host for the LocalDesk phone remote",
    version
)]
struct Cli {
    /// Path to `config.toml`.
    #[arg(long, env = "LOCALDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Port of the session channel and the HTTP surface.
    #[arg(long, env = "LOCALDESK_SESSION_PORT")]
    session_port: Option<u16>,

    /// UDP discovery responder port.
    #[arg(long, env = "LOCALDESK_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// Name shown on phones.
    #[arg(long, env = "LOCALDESK_DEVICE_NAME")]
    device_name: Option<String>,

    /// Disable mDNS advertisement.
    #[arg(long)]
    no_mdns: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut HostConfig) {
        if let Some(port) = self.session_port {
            config.network.session_port = port;
        }
        if let Some(port) = self.discovery_port {
            config.network.discovery_port = port;
        }
        if let Some(name) = self.device_name.as_ref().filter(|n| !n.trim().is_empty()) {
            config.host.device_name = name.trim().to_string();
        }
        if self.no_mdns {
            config.network.advertise_mdns = false;
        }
    }
}

/// Socket addresses derived from `[network]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListenAddrs {
    session: SocketAddr,
    discovery: SocketAddr,
}

impl ListenAddrs {
    fn from_config(config: &HostConfig) -> anyhow::Result<Self> {
        let net = &config.network;
        let addr = |port: u16| -> anyhow::Result<SocketAddr> {
            format!("{}:{port}", net.bind_address)
                .parse()
                .with_context(|| format!("invalid bind address: '{}:{port}'", net.bind_address))
        };
        Ok(Self {
            session: addr(net.session_port)?,
            discovery: addr(net.discovery_port)?,
        })
    }
}

/// Upper bound on waiting for queued store writes at shutdown.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path().context("cannot locate the config directory")?,
    };
    let loaded = load_config(&config_path);

    // ── Logging setup ─────────────────────────────────────────────────────────
    let level = loaded
        .as_ref()
        .map(|c| c.host.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = loaded.unwrap_or_else(|e| {
        warn!("{e}; using default configuration");
        HostConfig::default()
    });
    if ensure_identity(&mut config) {
        match save_config(&config_path, &config) {
            Ok(()) => info!("host identity written to {}", config_path.display()),
            Err(e) => warn!("failed to save host identity: {e}"),
        }
    }
    cli.apply(&mut config);
    let addrs = ListenAddrs::from_config(&config)?;

    let data_dir = config
        .host
        .data_dir
        .clone()
        .or_else(|| config_path.parent().map(PathBuf::from))
        .context("cannot determine the data directory")?;

    info!(
        "LocalDesk host '{}' ({}) starting; data in {}",
        config.host.device_name,
        config.host.device_id,
        data_dir.display()
    );

    // ── Stores ────────────────────────────────────────────────────────────────
    let trust_store: Arc<dyn RecordStore<Vec<TrustedDevice>>> =
        Arc::new(JsonFileStore::new(data_dir.join("trusted.json")));
    let page_store: Arc<dyn RecordStore<Vec<Page>>> =
        Arc::new(JsonFileStore::new(data_dir.join("pages.json")));

    let trusted = load_or_else(trust_store.as_ref(), "trusted devices", Vec::new);
    let first_run_pages = matches!(page_store.load(), Ok(None));
    let pages = load_or_else(page_store.as_ref(), "pages", default_pages);

    let (trust_flusher, _) = SnapshotFlusher::spawn(trust_store, "trusted devices");
    let (page_flusher, _) = SnapshotFlusher::spawn(page_store, "pages");
    if first_run_pages {
        page_flusher.schedule(pages.clone());
    }

    // ── Host state ────────────────────────────────────────────────────────────
    let (approvals, approval_rx) = ChannelApprovalSink::new();
    let (state, capture_rx) = HostState::new(HostParts {
        identity: HostIdentity {
            device_id: DeviceId::new(config.host.device_id.clone()),
            device_name: config.host.device_name.clone(),
            session_port: addrs.session.port(),
        },
        trusted,
        pages,
        backends: NativeBackends::detect(),
        approvals: Arc::new(approvals),
        trust_sink: Arc::new(trust_flusher.clone()),
        page_sink: Arc::new(page_flusher.clone()),
    });

    let dispatcher = Arc::new(SessionDispatcher::new(Arc::clone(&state)));
    let relay = dispatcher.relay();
    tokio::spawn(async move { relay.run_capture_events(capture_rx).await });

    // ── Session channel and HTTP surface (the only fatal bind) ───────────────
    let server = HostServer::bind(addrs.session, Arc::clone(&state), Arc::clone(&dispatcher))
        .await
        .context("cannot start the host listener")?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Discovery ─────────────────────────────────────────────────────────────
    let host = Device {
        id: DeviceId::new(config.host.device_id.clone()),
        name: config.host.device_name.clone(),
        kind: DeviceKind::Desktop,
        host: config.network.bind_address.clone(),
        port: server.local_addr().port(),
    };
    if let Err(e) = start_discovery_responder(addrs.discovery, host.clone(), Arc::clone(&running)) {
        warn!("{e}; UDP discovery disabled");
    }
    let advertiser = if config.network.advertise_mdns {
        MdnsAdvertiser::register(&host)
            .map_err(|e| warn!("{e}; mDNS advertisement disabled"))
            .ok()
    } else {
        None
    };

    // ── Operator console ──────────────────────────────────────────────────────
    tokio::spawn(run_console(
        OperatorApi::new(Arc::clone(&state)),
        approval_rx,
        Arc::clone(&running),
    ));
    println!("LocalDesk host ready; type 'help' for operator commands");

    // ── Main loop ─────────────────────────────────────────────────────────────
    if let Err(e) = server.run(running).await {
        error!("{e}");
    }

    if let Some(advertiser) = advertiser {
        advertiser.shutdown();
    }

    // Writes still queued must reach disk before the process exits.
    let flushed = tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, async {
        tokio::join!(trust_flusher.flush(), page_flusher.flush())
    })
    .await;
    if flushed.is_err() {
        warn!("timed out saving trusted devices and pages on shutdown");
    }
    info!("LocalDesk host stopped");

    // The console's blocking stdin read cannot be cancelled; exit instead of
    // waiting for the runtime to join it.
    std::process::exit(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_flags_overrides_nothing() {
        // Arrange
        let cli = Cli::parse_from(["localdesk-host"]);
        let mut config = HostConfig::default();

        // Act
        cli.apply(&mut config);

        // Assert
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_cli_port_and_name_overrides() {
        let cli = Cli::parse_from([
            "localdesk-host",
            "--session-port",
            "4100",
            "--device-name",
            "Studio",
            "--no-mdns",
        ]);
        let mut config = HostConfig::default();

        cli.apply(&mut config);

        assert_eq!(config.network.session_port, 4100);
        assert_eq!(config.host.device_name, "Studio");
        assert!(!config.network.advertise_mdns);
    }

    #[test]
    fn test_listen_addrs_from_defaults() {
        let addrs = ListenAddrs::from_config(&HostConfig::default()).unwrap();

        assert_eq!(addrs.session.to_string(), "0.0.0.0:3100");
        assert_eq!(addrs.discovery.port(), 45454);
    }

    #[test]
    fn test_listen_addrs_invalid_bind_returns_error() {
        // Arrange
        let mut config = HostConfig::default();
        config.network.bind_address = "not.an.ip".to_string();

        // Act
        let result = ListenAddrs::from_config(&config);

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }
}
