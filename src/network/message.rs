// src/network/message.rs
// Line-oriented wire formats: presence datagram, handshake line, chat line.

use crate::constants::{DISCOVERY_TAG, HANDSHAKE_PREFIX};

/// Presence datagram payload: `CHAT_PEER_ANNOUNCE:<tcp-listen-port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announce {
    pub listen_port: u16,
}

impl Announce {
    pub fn new(listen_port: u16) -> Self {
        Self { listen_port }
    }

    pub fn to_payload(&self) -> String {
        format!("{}:{}", DISCOVERY_TAG, self.listen_port)
    }

    /// Parse a received datagram. Anything without the discovery tag, without a
    /// port field, or with a port that is not a non-zero `u16` yields `None`.
    /// Fields after the port are ignored.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?.trim();
        if !text.starts_with(DISCOVERY_TAG) {
            return None;
        }
        let port_field = text.split(':').nth(1)?;
        parse_port(port_field).map(Self::new)
    }
}

/// First line of every stream: `HELLO:<tcp-listen-port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub listen_port: u16,
}

/// Why a line was refused as a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeParseError {
    MissingPrefix,
    InvalidPort(String),
}

impl std::fmt::Display for HandshakeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeParseError::MissingPrefix => write!(f, "line does not start with {}", HANDSHAKE_PREFIX),
            HandshakeParseError::InvalidPort(raw) => write!(f, "invalid port '{}'", raw),
        }
    }
}

impl Handshake {
    pub fn new(listen_port: u16) -> Self {
        Self { listen_port }
    }

    /// Wire form including the terminating newline.
    pub fn to_line(&self) -> String {
        format!("{}{}\n", HANDSHAKE_PREFIX, self.listen_port)
    }

    pub fn parse(line: &str) -> Result<Self, HandshakeParseError> {
        let line = strip_line_ending(line);
        let rest = line
            .strip_prefix(HANDSHAKE_PREFIX)
            .ok_or(HandshakeParseError::MissingPrefix)?;
        parse_port(rest)
            .map(Self::new)
            .ok_or_else(|| HandshakeParseError::InvalidPort(rest.trim().to_string()))
    }
}

/// True for lines that look like a handshake. Readers drop these when they
/// arrive after the link is established.
pub fn is_handshake_line(line: &str) -> bool {
    line.starts_with(HANDSHAKE_PREFIX)
}

/// `<userName>: <message>`
pub fn format_chat_line(user_name: &str, message: &str) -> String {
    format!("{}: {}", user_name, message)
}

pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn parse_port(raw: &str) -> Option<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}
