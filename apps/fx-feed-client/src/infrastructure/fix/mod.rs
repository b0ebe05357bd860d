//! Feed Protocol Adapters
//!
//! Implements the session-oriented wire protocol spoken to the upstream
//! price feed:
//!
//! - **messages**: typed wire message bodies and field tags
//! - **codec**: tag=value frame encoding with checksum verification
//! - **session**: the socket-free session state machine
//! - **reconnect**: backoff policies for session re-establishment
//! - **client**: the connection supervisor owning the TCP stream

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod session;

pub use client::FeedClient;
pub use codec::{CodecError, Decoded, FixCodec};
pub use messages::*;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use session::{
    DisconnectReason, SessionAction, SessionConfig, SessionMachine, SessionState,
};
