//! Wire protocol spoken between the desktop host and mobile clients.
//!
//! - [`discovery`] – UDP request token, response document, and the
//!   zero-config service type.
//! - [`session`] – The closed set of JSON events exchanged over a session
//!   channel, with boundary validation.
//! - [`input`] – Payloads of the remote-control events relayed during a live
//!   screen-share session.

pub mod discovery;
pub mod input;
pub mod session;

pub use discovery::*;
pub use input::*;
pub use session::{
    decode_client_message, encode_server_message, ClientMessage, IceCandidate, ProtocolError,
    ServerMessage, SessionDescription,
};
