//! Infrastructure layer for the desktop host.
//!
//! Contains the OS-facing adapters: sockets, file storage and the operator
//! surface.
//!
//! **Dependency rule**: this layer may depend on `application`, `platform`
//! and `localdesk_core`, but MUST NOT be imported by the `application`
//! layer.

pub mod network;
pub mod operator;
pub mod storage;
