//! Application layer use cases for the desktop host.
//!
//! # What lives here? (for beginners)
//!
//! This layer holds the connectivity rules: who may connect, who may run a
//! shortcut, and when a screen-share session may carry remote input.  It
//! talks to sockets only through [`connection::ConnectionHandle`] and to the
//! operating system only through the traits in [`crate::platform`], so every
//! rule here can be tested with in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`state`**        – The shared registries lock and host identity.
//! - **`connection`**   – Per-connection outbound queue handle.
//! - **`trust`**        – The set of approved devices.
//! - **`sessions`**     – Authorized connections, one per device.
//! - **`pairing`**      – Pair-request handling and operator approval.
//! - **`command_gate`** – Authorization check in front of shortcut execution.
//! - **`signaling`**    – WebRTC offer/answer/ICE relay and input forwarding.
//! - **`pages`**        – Edits to the page book and their broadcast.
//! - **`dispatch`**     – Routes decoded client messages to the above.
//! - **`testing`**      – A fully wired state over recording doubles.

pub mod command_gate;
pub mod connection;
pub mod dispatch;
pub mod pages;
pub mod pairing;
pub mod sessions;
pub mod signaling;
pub mod state;
pub mod testing;
pub mod trust;
