// src/node/mod.rs
// Shared node state and the start/shutdown lifecycle.

pub mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{Config, DiscoveryConfig};
use crate::emit_system_event;
use crate::error::{ChatError, Result};
use crate::events::dispatcher;
use crate::events::model::LogLevel;
use crate::history::HistoryStore;
use crate::network::discovery::{spawn_discovery, LocalInterfaces, SystemInterfaces};
use crate::network::listener::{bind_listener, run_acceptor};
use crate::network::registry::ConnectionRegistry;

pub use shutdown::ShutdownSignal;

/// Per-node values every task needs.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub user_name: String,
    /// Port advertised in announces and handshakes (the bound port)
    pub listen_port: u16,
    pub connect_timeout: Option<Duration>,
    pub handshake_timeout: Option<Duration>,
}

impl NodeSettings {
    pub fn new(user_name: impl Into<String>, listen_port: u16) -> Self {
        Self {
            user_name: user_name.into(),
            listen_port,
            connect_timeout: None,
            handshake_timeout: None,
        }
    }
}

/// Cheap-to-clone handle shared by every task of one node.
#[derive(Clone)]
pub struct NodeContext {
    settings: Arc<NodeSettings>,
    registry: ConnectionRegistry,
    shutdown: ShutdownSignal,
    interfaces: Arc<dyn LocalInterfaces>,
}

impl NodeContext {
    /// Context backed by the host's real interface list.
    pub fn new(settings: NodeSettings, history: HistoryStore) -> Self {
        Self::with_interfaces(settings, history, Arc::new(SystemInterfaces))
    }

    pub fn with_interfaces(
        settings: NodeSettings,
        history: HistoryStore,
        interfaces: Arc<dyn LocalInterfaces>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            registry: ConnectionRegistry::new(history),
            shutdown: ShutdownSignal::new(),
            interfaces,
        }
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn user_name(&self) -> &str {
        &self.settings.user_name
    }

    pub fn listen_port(&self) -> u16 {
        self.settings.listen_port
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn interfaces(&self) -> &dyn LocalInterfaces {
        self.interfaces.as_ref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

/// A running node: its context plus the long-lived loop tasks.
pub struct ChatNode {
    ctx: NodeContext,
    listen_addr: SocketAddr,
    discovery_active: bool,
    history_loaded: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatNode {
    /// Bind, load history and spawn the acceptor (and discovery when enabled).
    ///
    /// Only a bad bind address or a listener bind failure is returned as an
    /// error. `config.user_name` must already be resolved; an absent name
    /// falls back to "anonymous".
    pub async fn start(config: &Config) -> Result<ChatNode> {
        Self::start_with_interfaces(config, Arc::new(SystemInterfaces)).await
    }

    pub async fn start_with_interfaces(
        config: &Config,
        interfaces: Arc<dyn LocalInterfaces>,
    ) -> Result<ChatNode> {
        let bind_addr = config.bind_addr()?;
        let listener = bind_listener(bind_addr).await?;
        let listen_addr = listener.local_addr().map_err(|e| ChatError::BindFailed {
            addr: bind_addr.to_string(),
            source: e,
        })?;

        let history_path = config.history_path();
        let history = match HistoryStore::load(&history_path).await {
            Ok(h) => h,
            Err(e) => {
                emit_system_event!(
                    "node",
                    LogLevel::Warn,
                    "history_unreadable",
                    Some(format!("{}: {}", history_path.display(), e))
                );
                HistoryStore::empty_at(&history_path)
            }
        };
        let loaded = history.len();

        let settings = NodeSettings {
            user_name: config
                .user_name
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
            listen_port: listen_addr.port(),
            connect_timeout: config.connect_timeout(),
            handshake_timeout: config.handshake_timeout(),
        };
        let ctx = NodeContext::with_interfaces(settings, history, interfaces);
        emit_system_event!(
            "node",
            LogLevel::Info,
            "node_started",
            Some(format!(
                "user={} listen={} history_loaded={}",
                ctx.user_name(),
                listen_addr,
                loaded
            ))
        );

        let mut tasks = vec![tokio::spawn(run_acceptor(ctx.clone(), listener))];

        let mut discovery_active = false;
        if config.discovery_enabled() {
            let discovery_cfg = config.discovery.clone().unwrap_or_else(DiscoveryConfig::default);
            match spawn_discovery(&ctx, &discovery_cfg) {
                Ok(handles) => {
                    tasks.extend(handles);
                    discovery_active = true;
                }
                Err(e) => emit_system_event!(
                    "node",
                    LogLevel::Error,
                    "discovery_disabled",
                    Some(e.to_string())
                ),
            }
        }

        Ok(ChatNode {
            ctx,
            listen_addr,
            discovery_active,
            history_loaded: loaded,
            tasks,
        })
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn discovery_active(&self) -> bool {
        self.discovery_active
    }

    /// Number of lines read from the history log at startup.
    pub fn history_loaded(&self) -> usize {
        self.history_loaded
    }

    /// Stop every loop, close every connection, flush history and event sinks.
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let first = self.ctx.shutdown().trigger();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        let closed = self.ctx.registry().drain().await;
        if let Err(e) = self.ctx.registry().flush_history().await {
            emit_system_event!(
                "node",
                LogLevel::Warn,
                "history_flush_failed",
                Some(e.to_string())
            );
        }
        if first {
            emit_system_event!(
                "node",
                LogLevel::Info,
                "node_stopped",
                Some(format!("closed_connections={}", closed.len()))
            );
        }
        dispatcher::flush().await;
    }
}
