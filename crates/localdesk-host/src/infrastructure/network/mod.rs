//! Network infrastructure for the desktop host.
//!
//! # Sub-modules
//!
//! - **`server`** – The host's one TCP listener.  Serves the HTTP routes
//!   and the session upgrade route side by side.
//!
//! - **`session_server`** – WebSocket upgrade handler; one reader and one
//!   writer task per connection, feeding the application dispatcher.
//!
//! - **`http_api`** – The axum routes for the HTTP bootstrap surface.
//!
//! - **`discovery`** – Answers UDP broadcast discovery requests from phones on the LAN.
//!
//! - **`advertise`** – Publishes the host over mDNS / DNS-SD.  Best effort.

pub mod advertise;
pub mod discovery;
pub mod http_api;
pub mod server;
pub mod session_server;
