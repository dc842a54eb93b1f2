//! Domain entities for LocalDesk.
//!
//! This module contains pure data definitions with no infrastructure
//! dependencies.  Everything here can be compiled and tested on any platform
//! without sockets, files, or native input APIs.
//!
//! # What lives here? (for beginners)
//!
//! - [`device`] – Who is talking to the host: the device identity a phone
//!   claims, and the durable record the operator creates when approving it.
//! - [`page`] – What the phone shows: named pages of shortcut buttons.  The
//!   connectivity layer never interprets a page; it stores them and pushes
//!   them to authorized sessions verbatim.

pub mod device;
pub mod page;
