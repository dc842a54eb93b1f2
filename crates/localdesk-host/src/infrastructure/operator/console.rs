//! Line-based operator console on stdin/stdout.
//!
//! The headless host has no window, so approval requests are printed to the
//! terminal and the operator answers with commands:
//!
//! ```text
//! approve <deviceId>   reject <deviceId>   pending
//! trusted              revoke <deviceId>   clients
//! pages                info                help
//! ```
//!
//! Approval requests arrive on a channel fed by [`ChannelApprovalSink`], so
//! the pairing coordinator never waits for the terminal.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CommandResult, OperatorApi};
use crate::application::pairing::{ApprovalRequest, ApprovalSink};

/// Forwards approval requests to the console task.
pub struct ChannelApprovalSink {
    tx: mpsc::UnboundedSender<ApprovalRequest>,
}

impl ChannelApprovalSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ApprovalSink for ChannelApprovalSink {
    fn request_approval(&self, request: ApprovalRequest) {
        if self.tx.send(request).is_err() {
            warn!("operator console is not running; pairing request left pending");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Approve(String),
    Reject(String),
    Trusted,
    Revoke(String),
    Clients,
    Pending,
    Pages,
    Info,
    Help,
}

impl ConsoleCommand {
    /// Parses one input line.  Returns `Err` with a usage hint for unknown
    /// commands or missing arguments.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next().map(str::to_string);

        let needs_id = |arg: Option<String>, make: fn(String) -> Self| {
            arg.map(make)
                .ok_or_else(|| format!("usage: {verb} <deviceId>"))
        };

        match verb.as_str() {
            "approve" => needs_id(arg, Self::Approve),
            "reject" => needs_id(arg, Self::Reject),
            "revoke" => needs_id(arg, Self::Revoke),
            "trusted" => Ok(Self::Trusted),
            "clients" => Ok(Self::Clients),
            "pending" => Ok(Self::Pending),
            "pages" => Ok(Self::Pages),
            "info" => Ok(Self::Info),
            "help" | "?" => Ok(Self::Help),
            other => Err(format!("unknown command '{other}'; type 'help'")),
        }
    }
}

const HELP: &str = "\
commands:
  approve <deviceId>   trust the device and grant its session
  reject <deviceId>    refuse a pending pairing
  pending              list pending pairing requests
  trusted              list trusted devices
  revoke <deviceId>    remove a device from the trust store
  clients              list connected sessions
  pages                show the page book
  info                 show host identity and counters";

/// Runs one command and renders its result as text.
pub async fn execute(api: &OperatorApi, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Approve(id) => render(api.approve_pairing(&id, true).await),
        ConsoleCommand::Reject(id) => render(api.approve_pairing(&id, false).await),
        ConsoleCommand::Trusted => render(api.trusted_devices().await),
        ConsoleCommand::Revoke(id) => render(api.remove_trusted_device(&id).await),
        ConsoleCommand::Clients => render(api.connected_clients().await),
        ConsoleCommand::Pending => render(api.pending_pairings().await),
        ConsoleCommand::Pages => render(api.pages().await),
        ConsoleCommand::Info => render(api.server_info().await),
        ConsoleCommand::Help => HELP.to_string(),
    }
}

fn render<T: Serialize>(result: CommandResult<T>) -> String {
    if !result.success {
        return format!("error: {}", result.error.unwrap_or_default());
    }
    match result.data {
        Some(data) => serde_json::to_string_pretty(&data).unwrap_or_else(|e| format!("error: {e}")),
        None => "ok".to_string(),
    }
}

fn announce(request: &ApprovalRequest) -> String {
    format!(
        "pairing request from '{}' ({}, {}); type 'approve {}' or 'reject {}'",
        request.device_name,
        request.device_id,
        request.device_type,
        request.device_id,
        request.device_id
    )
}

/// Reads commands from stdin and prints approval requests until `running`
/// is cleared or stdin closes.
pub async fn run_console(
    api: OperatorApi,
    mut approvals: mpsc::UnboundedReceiver<ApprovalRequest>,
    running: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            Some(request) = approvals.recv() => println!("{}", announce(&request)),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Ok(command) => println!("{}", execute(&api, command).await),
                    Err(usage) => println!("{usage}"),
                },
                Ok(None) => {
                    debug!("stdin closed; console keeps printing approval requests");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("failed to read console input: {e}");
                    stdin_open = false;
                }
            },
            _ = ticker.tick() => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
