use crate::constants::{
    DEFAULT_ANNOUNCE_INTERVAL_MS, DEFAULT_BIND_ADDR, DEFAULT_EVENT_LOG, DEFAULT_HISTORY_FILE,
    DEFAULT_LISTEN_PORT, DEFAULT_MULTICAST_GROUP, DEFAULT_MULTICAST_PORT,
};
use crate::error::{ChatError, Result};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name prefixed to every message this node authors
    pub user_name: Option<String>,
    /// TCP listen port advertised in announces and handshakes (0 = ephemeral)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Multicast peer discovery
    pub discovery: Option<DiscoveryConfig>,
    /// Persistent chat history
    pub history: Option<HistoryConfig>,
    /// Socket-level knobs (bind address, optional timeouts)
    pub network: Option<NetworkConfig>,
    /// Logging / events configuration
    pub logging: Option<LoggingConfig>,
}

fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_name: None,
            port: DEFAULT_LISTEN_PORT,
            discovery: Some(DiscoveryConfig::default()),
            history: Some(HistoryConfig::default()),
            network: Some(NetworkConfig::default()),
            logging: None,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<Config>(content).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Load from a file. `Ok(None)` when the file does not exist so callers can
    /// fall back to defaults; a file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChatError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn discovery_enabled(&self) -> bool {
        self.discovery.as_ref().map(|d| d.enabled).unwrap_or(true)
    }

    pub fn history_path(&self) -> PathBuf {
        self.history
            .as_ref()
            .and_then(|h| h.path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE))
    }

    /// Listen address from `[network].bind_addr` (IPv4 or IPv6 host) and `port`.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self
            .network
            .as_ref()
            .and_then(|n| n.bind_addr.as_deref())
            .unwrap_or(DEFAULT_BIND_ADDR);
        let ip = host
            .parse::<IpAddr>()
            .map_err(|e| ChatError::Config(format!("bind_addr '{}': {}", host, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.network
            .as_ref()
            .and_then(|n| n.connect_timeout_ms)
            .map(Duration::from_millis)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.network
            .as_ref()
            .and_then(|n| n.handshake_timeout_ms)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// IPv4 multicast group announces are sent to (default 230.0.0.1)
    pub multicast_group: Option<String>,
    /// UDP port of the multicast group (default 9999)
    pub multicast_port: Option<u16>,
    /// Delay between two presence announces (default 3000)
    pub announce_interval_ms: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            multicast_group: Some(DEFAULT_MULTICAST_GROUP.to_string()),
            multicast_port: Some(DEFAULT_MULTICAST_PORT),
            announce_interval_ms: Some(DEFAULT_ANNOUNCE_INTERVAL_MS),
        }
    }
}

impl DiscoveryConfig {
    /// Resolve the multicast group/port pair, rejecting non-multicast addresses.
    pub fn group_addr(&self) -> Result<SocketAddrV4> {
        let group = match &self.multicast_group {
            Some(raw) => raw
                .parse::<Ipv4Addr>()
                .map_err(|e| ChatError::Config(format!("multicast_group '{}': {}", raw, e)))?,
            None => DEFAULT_MULTICAST_GROUP,
        };
        if !group.is_multicast() {
            return Err(ChatError::Config(format!(
                "multicast_group '{}' is not a multicast address",
                group
            )));
        }
        let port = self.multicast_port.unwrap_or(DEFAULT_MULTICAST_PORT);
        Ok(SocketAddrV4::new(group, port))
    }

    pub fn announce_interval(&self) -> Duration {
        // A zero interval would turn the announcer into a busy loop.
        Duration::from_millis(
            self.announce_interval_ms
                .unwrap_or(DEFAULT_ANNOUNCE_INTERVAL_MS)
                .max(1),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryConfig {
    /// Plain-text log, one formatted message per line (default chat_history.txt)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NetworkConfig {
    /// Interface the TCP listener binds to (default 0.0.0.0)
    pub bind_addr: Option<String>,
    /// Outbound dial timeout. Unset means wait indefinitely.
    pub connect_timeout_ms: Option<u64>,
    /// Time allowed for an inbound peer to send its handshake line. Unset means wait indefinitely.
    pub handshake_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Path to JSON line event log (rotated). If unset, defaults to logs/peerchat.jsonl
    pub json_path: Option<String>,
    /// Max size in bytes before rotation (default 5MB)
    pub json_max_bytes: Option<usize>,
    /// Number of rotated files to retain (default 3)
    pub json_rotate: Option<u32>,
    /// Disable console sink (default false)
    pub disable_console: Option<bool>,
    /// Minimum level printed on the console: trace | debug | info | warn | error (default info)
    pub console_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_path: Some(DEFAULT_EVENT_LOG.to_string()),
            json_max_bytes: Some(5 * 1024 * 1024),
            json_rotate: Some(3),
            disable_console: Some(false),
            console_level: Some("info".to_string()),
        }
    }
}
