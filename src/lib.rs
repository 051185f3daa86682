//! # peerchat
//!
//! Serverless chat for a local network. Every node is both client and server:
//!
//! * it announces its TCP listen port to a multicast group every few seconds;
//! * it dials every node it hears about, sending `HELLO:<own port>` first;
//! * it accepts inbound links and identifies the peer by `remote-ip:advertised-port`;
//! * typed lines are fanned out to every linked peer as `<user>: <text>`.
//!
//! A peer identity is reserved (atomic add-if-absent) before any dial or
//! registration, so simultaneous triggers for the same peer collapse to at
//! most one live link. All seen and sent lines go to an append-only history.
//!
//! ## Key Modules
//! * `config` – TOML configuration & defaults.
//! * `network` – discovery, dialing, accepting, reading, broadcasting.
//! * `node` – shared context, shutdown signal, start/stop lifecycle.
//! * `history` – persistent append-only message log.
//! * `events` – structured logging/events dispatcher.
//! * `prompt` – interactive command loop.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod history;
pub mod network;
pub mod node;
pub mod prelude; // curated re-exports
pub mod prompt;

pub use error::{ChatError, Result};
pub use node::{ChatNode, NodeContext, NodeSettings};
