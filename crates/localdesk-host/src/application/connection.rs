//! Connection identity and the outbound handle shared with the registries.
//!
//! The registries never touch sockets.  Each live session channel is
//! represented by a [`ConnectionHandle`]: a bounded sender for outbound
//! [`ServerMessage`]s plus a close signal.  The transport task that owns the
//! socket holds the matching [`OutboundQueue`] and drains it.
//!
//! Sending never blocks.  A full queue drops the message with a warning,
//! which keeps every registry operation free of I/O while the registries
//! lock is held.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::{mpsc, Notify};
use tracing::warn;
use uuid::Uuid;

use localdesk_core::ServerMessage;

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Host-assigned identity of one session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first group is plenty to tell connections apart in logs.
        let s = self.0.to_string();
        f.write_str(&s[..8])
    }
}

/// Cloneable handle to one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
    close: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

/// Receiving side owned by the transport task.
#[derive(Debug)]
pub struct OutboundQueue {
    pub rx: mpsc::Receiver<ServerMessage>,
    pub close: Arc<Notify>,
}

impl ConnectionHandle {
    /// Creates a handle and the queue the transport drains.
    pub fn channel(id: ConnectionId) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let close = Arc::new(Notify::new());
        let handle = Self {
            id,
            tx,
            close: Arc::clone(&close),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (handle, OutboundQueue { rx, close })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `msg` for delivery.  Returns `false` if it was not queued.
    pub fn send(&self, msg: ServerMessage) -> bool {
        if !self.is_live() {
            return false;
        }
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("connection {}: outbound queue full; message dropped", self.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Asks the transport to close the connection.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close.notify_one();
    }

    /// Returns `true` until the connection is closed from either side.
    pub fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}
