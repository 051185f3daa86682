//! Error kinds surfaced by the chat node.
//!
//! Callers branch on the variant, never on the message text. Duplicate-peer
//! rejections are an expected outcome, not an error
//! (see `network::listener::HandshakeOutcome`).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Outbound dial or handshake write failed
    #[error("connect to {peer} failed: {source}")]
    ConnectFailed {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// First line of an inbound stream was missing or not a valid handshake
    #[error("invalid handshake from {addr}: {reason}")]
    HandshakeInvalid { addr: String, reason: String },

    /// Stream ended (or the node shut down) before the operation completed
    #[error("stream closed: {0}")]
    StreamClosed(String),

    /// Listen socket could not be bound (fatal at startup)
    #[error("cannot bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Multicast socket setup failed
    #[error("discovery socket error: {0}")]
    Discovery(#[source] io::Error),

    /// Local interface addresses could not be enumerated
    #[error("interface enumeration failed: {0}")]
    Interfaces(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent history log I/O
    #[error("history error: {0}")]
    History(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
