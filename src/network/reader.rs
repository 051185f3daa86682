// src/network/reader.rs

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::events::model::LogLevel;
use crate::network::events::{emit_chat_event, emit_network_event};
use crate::network::message::{is_handshake_line, strip_line_ending};
use crate::network::registry::ConnectionHandle;
use crate::node::NodeContext;

/// Why a read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    Eof,
    Error(String),
    /// Registry removed the connection (broadcast pruning or drain)
    Closed,
    Shutdown,
}

/// Read lines from one registered connection until EOF, error, removal or
/// shutdown, recording and printing each chat line. Always ends by removing
/// the connection from the registry.
pub async fn run_reader<R>(ctx: NodeContext, handle: ConnectionHandle, mut reader: R) -> ReadEnd
where
    R: AsyncBufRead + Unpin,
{
    let shutdown = ctx.shutdown().clone();
    let peer = handle.identity.to_string();
    let mut buf = Vec::new();
    let end = loop {
        buf.clear();
        let read = tokio::select! {
            _ = handle.closed() => break ReadEnd::Closed,
            _ = shutdown.wait() => break ReadEnd::Shutdown,
            res = reader.read_until(b'\n', &mut buf) => res,
        };
        match read {
            Ok(0) => break ReadEnd::Eof,
            Ok(_) => {
                // Undecodable bytes become U+FFFD; the link stays up.
                let line = String::from_utf8_lossy(&buf);
                let text = strip_line_ending(&line);
                if is_handshake_line(text) {
                    emit_network_event(
                        "reader",
                        LogLevel::Debug,
                        "stray_handshake_dropped",
                        Some(peer.clone()),
                        None,
                    );
                    continue;
                }
                if let Err(e) = ctx.registry().record_line(text).await {
                    emit_network_event(
                        "reader",
                        LogLevel::Warn,
                        "history_append_failed",
                        Some(peer.clone()),
                        Some(e.to_string()),
                    );
                }
                println!("{}", text);
                emit_chat_event("reader", Some(peer.clone()), text);
            }
            Err(e) => break ReadEnd::Error(e.to_string()),
        }
    };

    if ctx.registry().remove(handle.id).await.is_some() && end != ReadEnd::Shutdown {
        emit_network_event(
            "reader",
            LogLevel::Info,
            "peer_disconnected",
            Some(peer),
            Some(format!("{} reason={:?}", handle.id, end)),
        );
    }
    end
}
