//! Central place for application-wide constants and default values.

use std::net::Ipv4Addr;

/// Default application name shown in banners and the prompt
pub const DEFAULT_APP_NAME: &str = "peerchat";

/// Left padding used to align log lines with those that include emoji prefixes.
/// Keep this to a fixed width matching the emoji prefix you use elsewhere.
pub const ICON_PLACEHOLDER: &str = "   "; // Three spaces for alignment

/// Tag that opens every presence datagram (`CHAT_PEER_ANNOUNCE:<port>`)
pub const DISCOVERY_TAG: &str = "CHAT_PEER_ANNOUNCE";
/// Prefix of the single handshake line sent on every new stream (`HELLO:<port>`)
pub const HANDSHAKE_PREFIX: &str = "HELLO:";

pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(230, 0, 0, 1);
pub const DEFAULT_MULTICAST_PORT: u16 = 9999;
pub const DEFAULT_ANNOUNCE_INTERVAL_MS: u64 = 3000;

pub const DEFAULT_LISTEN_PORT: u16 = 5000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.txt";
pub const DEFAULT_CONFIG_FILE: &str = "peerchat.toml";
pub const DEFAULT_EVENT_LOG: &str = "logs/peerchat.jsonl";

/// Receive buffer for presence datagrams; announce payloads are tiny.
pub const MAX_DATAGRAM_SIZE: usize = 256;

/// Application / crate version (populated from Cargo.toml via env! macro)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optional short git commit hash (set via build script or cargo:rustc-env). Falls back to "unknown".
pub fn git_commit() -> &'static str {
    option_env!("GIT_COMMIT").unwrap_or("unknown")
}

/// Human friendly composite version string used in prompts / logs.
pub fn full_version() -> String {
    format!("v{} (commit={})", APP_VERSION, git_commit())
}
