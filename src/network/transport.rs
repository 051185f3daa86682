// src/network/transport.rs

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{ChatError, Result};
use crate::events::model::{ConnectionRole, LogLevel};
use crate::network::events::emit_network_event;
use crate::network::message::Handshake;
use crate::network::peer::PeerIdentity;
use crate::network::reader::run_reader;
use crate::network::registry::ConnectionHandle;
use crate::node::NodeContext;

fn log_transport_event(level: LogLevel, action: &str, addr: Option<String>, detail: Option<String>) {
    emit_network_event("transport", level, action, addr, detail);
}

/// Dial a peer the caller already reserved, send `HELLO:<own port>`, register
/// the link and start its reader.
///
/// The reservation is NOT released here on failure; see [`dial_reserved`].
pub async fn connect_to_peer(ctx: &NodeContext, identity: &PeerIdentity) -> Result<ConnectionHandle> {
    let target = identity.socket_addr();
    log_transport_event(
        LogLevel::Debug,
        "dial_start",
        Some(identity.to_string()),
        Some(format!("local_port={}", ctx.listen_port())),
    );

    let connect = TcpStream::connect(target);
    let shutdown = ctx.shutdown().clone();
    let connected = tokio::select! {
        _ = shutdown.wait() => {
            return Err(ChatError::StreamClosed("node shutting down".into()));
        }
        res = async {
            match ctx.settings().connect_timeout {
                Some(limit) => tokio::time::timeout(limit, connect)
                    .await
                    .unwrap_or_else(|_| Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ))),
                None => connect.await,
            }
        } => res,
    };
    let stream = connected.map_err(|e| ChatError::ConnectFailed {
        peer: identity.to_string(),
        source: e,
    })?;
    let remote_addr = stream.peer_addr().unwrap_or(target);

    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(Handshake::new(ctx.listen_port()).to_line().as_bytes())
        .await
        .map_err(|e| ChatError::ConnectFailed {
            peer: identity.to_string(),
            source: e,
        })?;
    write_half.flush().await.map_err(|e| ChatError::ConnectFailed {
        peer: identity.to_string(),
        source: e,
    })?;

    let handle = ctx
        .registry()
        .register(
            identity.clone(),
            ConnectionRole::Outbound,
            remote_addr,
            Box::new(write_half),
        )
        .await;
    log_transport_event(
        LogLevel::Info,
        "peer_connected",
        Some(identity.to_string()),
        Some(format!("{} role=outbound", handle.id)),
    );
    tokio::spawn(run_reader(ctx.clone(), handle.clone(), BufReader::new(read_half)));
    Ok(handle)
}

/// Task body spawned by discovery: dial and, on any failure, hand the
/// reservation back so a later announce can retry.
pub async fn dial_reserved(ctx: NodeContext, identity: PeerIdentity) {
    if let Err(e) = connect_to_peer(&ctx, &identity).await {
        ctx.registry().release(&identity);
        if !ctx.is_shutting_down() {
            log_transport_event(
                LogLevel::Warn,
                "dial_failed",
                Some(identity.to_string()),
                Some(e.to_string()),
            );
        }
    }
}
