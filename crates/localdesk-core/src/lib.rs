//! # localdesk-core
//!
//! Shared library for the LocalDesk desktop host containing the wire protocol
//! spoken with mobile clients and the domain entities that protocol carries.
//!
//! This crate has zero dependencies on OS APIs, network sockets, or the
//! filesystem.  It is used by the host crate and by its integration tests.
//!
//! # Architecture overview (for beginners)
//!
//! LocalDesk turns a phone into a remote control for a desktop machine.  The
//! phone discovers the desktop on the LAN, asks to be trusted, and then fires
//! keyboard shortcuts or opens a live screen-share session.
//!
//! This crate (`localdesk-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – What travels over the network.  Discovery datagrams are
//!   a fixed ASCII token answered with a JSON document; the session channel
//!   carries JSON frames of the shape `{"event": "...", "data": ...}` that are
//!   validated into closed Rust enums at the boundary.
//!
//! - **`domain`** – Plain data with no I/O: devices, trusted devices, and the
//!   pages of shortcuts the phone renders as buttons.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `localdesk_core::TrustedDevice` instead of the full module path.
pub use domain::device::{Device, DeviceId, DeviceKind, TrustedDevice};
pub use domain::page::{default_pages, ActionType, Page, Shortcut, ShortcutId};
pub use protocol::discovery::{
    DiscoverResponse, DISCOVERY_PORT, DISCOVER_REQUEST_TOKEN, DISCOVER_RESPONSE_TYPE,
    MDNS_SERVICE_TYPE,
};
pub use protocol::session::{
    decode_client_message, encode_server_message, ClientMessage, ProtocolError, ServerMessage,
};
