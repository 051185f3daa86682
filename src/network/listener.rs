// src/network/listener.rs

use std::net::SocketAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ChatError, Result};
use crate::events::model::{ConnectionRole, LogLevel};
use crate::network::events::emit_network_event;
use crate::network::message::Handshake;
use crate::network::peer::PeerIdentity;
use crate::network::reader::run_reader;
use crate::network::registry::{ConnectionHandle, PeerWriter};
use crate::node::NodeContext;

fn log_network_event(level: LogLevel, action: &str, addr: Option<String>, detail: Option<String>) {
    emit_network_event("listener", level, action, addr, detail);
}

pub async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ChatError::BindFailed {
            addr: addr.to_string(),
            source: e,
        })?;
    log_network_event(LogLevel::Info, "listener_bind", Some(addr.to_string()), None);
    Ok(listener)
}

/// Accept until shutdown; each stream gets its own handshake task.
pub async fn run_acceptor(ctx: NodeContext, listener: TcpListener) {
    let shutdown = ctx.shutdown().clone();
    loop {
        let accepted = tokio::select! {
            _ = shutdown.wait() => break,
            res = listener.accept() => res,
        };
        match accepted {
            Ok((stream, peer_addr)) => {
                log_network_event(
                    LogLevel::Debug,
                    "incoming_connection",
                    Some(peer_addr.to_string()),
                    None,
                );
                tokio::spawn(handle_inbound(ctx.clone(), stream, peer_addr));
            }
            Err(e) => {
                if shutdown.is_triggered() {
                    break;
                }
                log_network_event(LogLevel::Error, "accept_failed", None, Some(e.to_string()));
            }
        }
    }
}

/// Result of a well-formed inbound handshake.
pub enum HandshakeOutcome<R> {
    /// Reserved and registered; the reader half is returned for the read loop
    Accepted {
        handle: ConnectionHandle,
        reader: R,
    },
    /// Identity already connected or being connected to; stream should be closed
    Duplicate(PeerIdentity),
}

/// Read the first line of an inbound stream and admit or reject the peer.
///
/// The identity is the remote address paired with the port from `HELLO:<port>`,
/// so two processes on one host stay distinct. A `HandshakeInvalid` error means
/// no reservation was touched.
pub async fn accept_handshake<R>(
    ctx: &NodeContext,
    mut reader: R,
    mut writer: PeerWriter,
    remote_addr: SocketAddr,
) -> Result<HandshakeOutcome<R>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let shutdown = ctx.shutdown().clone();
    let read = async {
        let res = match ctx.settings().handshake_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.read_line(&mut line)).await {
                Ok(res) => res,
                Err(_) => {
                    return Err(ChatError::HandshakeInvalid {
                        addr: remote_addr.to_string(),
                        reason: "timed out waiting for handshake".into(),
                    })
                }
            },
            None => reader.read_line(&mut line).await,
        };
        res.map_err(|e| ChatError::StreamClosed(e.to_string()))
    };
    let n = tokio::select! {
        _ = shutdown.wait() => return Err(ChatError::StreamClosed("node shutting down".into())),
        res = read => res?,
    };
    if n == 0 {
        return Err(ChatError::HandshakeInvalid {
            addr: remote_addr.to_string(),
            reason: "stream closed before handshake".into(),
        });
    }
    let hello = Handshake::parse(&line).map_err(|e| ChatError::HandshakeInvalid {
        addr: remote_addr.to_string(),
        reason: e.to_string(),
    })?;

    let identity = PeerIdentity::new(remote_addr.ip(), hello.listen_port);
    if !ctx.registry().try_reserve(&identity) {
        let _ = writer.shutdown().await;
        return Ok(HandshakeOutcome::Duplicate(identity));
    }
    let handle = ctx
        .registry()
        .register(identity, ConnectionRole::Inbound, remote_addr, writer)
        .await;
    Ok(HandshakeOutcome::Accepted { handle, reader })
}

/// Handshake task for one accepted stream.
pub async fn handle_inbound(ctx: NodeContext, stream: TcpStream, remote_addr: SocketAddr) {
    let (read_half, write_half) = stream.into_split();
    let reader: BufReader<OwnedReadHalf> = BufReader::new(read_half);
    match accept_handshake(&ctx, reader, Box::new(write_half), remote_addr).await {
        Ok(HandshakeOutcome::Accepted { handle, reader }) => {
            log_network_event(
                LogLevel::Info,
                "peer_accepted",
                Some(handle.identity.to_string()),
                Some(format!("{} role=inbound remote={}", handle.id, remote_addr)),
            );
            run_reader(ctx, handle, reader).await;
        }
        Ok(HandshakeOutcome::Duplicate(identity)) => {
            log_network_event(
                LogLevel::Info,
                "duplicate_rejected",
                Some(identity.to_string()),
                Some(format!("remote={}", remote_addr)),
            );
        }
        Err(e) => {
            if ctx.is_shutting_down() {
                return;
            }
            let level = match e {
                ChatError::HandshakeInvalid { .. } => LogLevel::Warn,
                _ => LogLevel::Debug,
            };
            log_network_event(
                level,
                "handshake_rejected",
                Some(remote_addr.to_string()),
                Some(e.to_string()),
            );
        }
    }
}

