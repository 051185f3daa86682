// src/network/discovery.rs
// LAN presence: periodic multicast announce + listener that dials newly seen peers.

use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::config::DiscoveryConfig;
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::{ChatError, Result};
use crate::events::model::LogLevel;
use crate::network::events::emit_network_event;
use crate::network::message::Announce;
use crate::network::peer::PeerIdentity;
use crate::network::transport::dial_reserved;
use crate::node::NodeContext;

fn log_discovery_event(level: LogLevel, action: &str, addr: Option<String>, detail: Option<String>) {
    emit_network_event("discovery", level, action, addr, detail);
}

/// Source of this host's interface addresses, consulted on every self check.
pub trait LocalInterfaces: Send + Sync {
    fn addresses(&self) -> Result<Vec<IpAddr>>;
}

/// Enumerates the host's IPv4/IPv6 interface addresses at call time.
pub struct SystemInterfaces;

impl LocalInterfaces for SystemInterfaces {
    fn addresses(&self) -> Result<Vec<IpAddr>> {
        local_ip_address::list_afinet_netifas()
            .map(|ifas| ifas.into_iter().map(|(_name, ip)| ip).collect())
            .map_err(|e| ChatError::Interfaces(e.to_string()))
    }
}

/// Fixed address list.
pub struct StaticInterfaces(pub Vec<IpAddr>);

impl LocalInterfaces for StaticInterfaces {
    fn addresses(&self) -> Result<Vec<IpAddr>> {
        Ok(self.0.clone())
    }
}

/// True iff `port` is our own listen port AND `host` is one of our interface
/// addresses. If the interfaces cannot be listed the answer is "not self".
pub fn is_self(host: IpAddr, port: u16, own_port: u16, interfaces: &dyn LocalInterfaces) -> bool {
    if port != own_port {
        return false;
    }
    match interfaces.addresses() {
        Ok(addrs) => {
            let host = host.to_canonical();
            addrs.iter().any(|a| a.to_canonical() == host)
        }
        Err(e) => {
            log_discovery_event(
                LogLevel::Warn,
                "self_check_unavailable",
                Some(host.to_string()),
                Some(e.to_string()),
            );
            false
        }
    }
}

/// What the listener does with one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceDecision {
    /// Not an announce, or the port did not parse
    Ignored,
    /// Our own announce looped back
    SelfAnnounce,
    /// Connected or already connecting
    AlreadyReserved(PeerIdentity),
    /// Reservation taken; the caller must dial this peer
    Dial(PeerIdentity),
}

/// Classify one datagram from `sender`. A `Dial` result means the identity was
/// reserved by this call and the caller now owns that reservation.
pub fn classify_announce(ctx: &NodeContext, sender: IpAddr, payload: &[u8]) -> AnnounceDecision {
    let Some(announce) = Announce::parse(payload) else {
        return AnnounceDecision::Ignored;
    };
    if is_self(
        sender,
        announce.listen_port,
        ctx.listen_port(),
        ctx.interfaces(),
    ) {
        return AnnounceDecision::SelfAnnounce;
    }
    let identity = PeerIdentity::new(sender, announce.listen_port);
    if ctx.registry().try_reserve(&identity) {
        AnnounceDecision::Dial(identity)
    } else {
        AnnounceDecision::AlreadyReserved(identity)
    }
}

/// Socket the announcer sends from (ephemeral port, loopback enabled so nodes
/// on the same host hear each other).
pub fn bind_announce_socket() -> Result<UdpSocket> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(ChatError::Discovery)?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(ChatError::Discovery)?;
    socket.set_nonblocking(true).map_err(ChatError::Discovery)?;
    UdpSocket::from_std(socket).map_err(ChatError::Discovery)
}

/// Socket joined to `group`. Address/port reuse lets several nodes on one host
/// listen on the same multicast port.
pub fn bind_multicast_listener(group: SocketAddrV4) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(ChatError::Discovery)?;
    socket.set_reuse_address(true).map_err(ChatError::Discovery)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(ChatError::Discovery)?;
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port());
    socket
        .bind(&SockAddr::from(bind_addr))
        .map_err(ChatError::Discovery)?;
    socket
        .join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)
        .map_err(ChatError::Discovery)?;
    socket.set_nonblocking(true).map_err(ChatError::Discovery)?;
    UdpSocket::from_std(socket.into()).map_err(ChatError::Discovery)
}

/// Send `CHAT_PEER_ANNOUNCE:<port>` to `group` every `interval` until shutdown.
pub async fn run_announcer(ctx: NodeContext, socket: UdpSocket, group: SocketAddrV4, interval: Duration) {
    let shutdown = ctx.shutdown().clone();
    let payload = Announce::new(ctx.listen_port()).to_payload();
    loop {
        let sent = tokio::select! {
            _ = shutdown.wait() => break,
            res = socket.send_to(payload.as_bytes(), group) => res,
        };
        match sent {
            Ok(_) => log_discovery_event(
                LogLevel::Trace,
                "announce_sent",
                Some(group.to_string()),
                None,
            ),
            Err(e) => {
                if shutdown.is_triggered() {
                    break;
                }
                log_discovery_event(
                    LogLevel::Warn,
                    "announce_failed",
                    Some(group.to_string()),
                    Some(e.to_string()),
                );
            }
        }
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Receive announces until shutdown; every newly reserved peer gets its own dial task.
pub async fn run_discovery_listener(ctx: NodeContext, socket: UdpSocket) {
    let shutdown = ctx.shutdown().clone();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        let received = tokio::select! {
            _ = shutdown.wait() => break,
            res = socket.recv_from(&mut buf) => res,
        };
        match received {
            Ok((len, src)) => match classify_announce(&ctx, src.ip(), &buf[..len]) {
                AnnounceDecision::Dial(identity) => {
                    log_discovery_event(
                        LogLevel::Info,
                        "peer_discovered",
                        Some(identity.to_string()),
                        Some("connecting".to_string()),
                    );
                    tokio::spawn(dial_reserved(ctx.clone(), identity));
                }
                AnnounceDecision::AlreadyReserved(_) | AnnounceDecision::SelfAnnounce => {}
                AnnounceDecision::Ignored => log_discovery_event(
                    LogLevel::Debug,
                    "datagram_ignored",
                    Some(src.to_string()),
                    Some(format!("len={}", len)),
                ),
            },
            Err(e) => {
                if shutdown.is_triggered() {
                    break;
                }
                log_discovery_event(LogLevel::Warn, "receive_failed", None, Some(e.to_string()));
            }
        }
    }
}

/// Bind both discovery sockets and spawn the announcer and listener tasks.
pub fn spawn_discovery(ctx: &NodeContext, cfg: &DiscoveryConfig) -> Result<Vec<JoinHandle<()>>> {
    let group = cfg.group_addr()?;
    let listen_socket = bind_multicast_listener(group)?;
    let announce_socket = bind_announce_socket()?;
    log_discovery_event(
        LogLevel::Info,
        "discovery_started",
        Some(group.to_string()),
        Some(format!("advertised_port={}", ctx.listen_port())),
    );
    Ok(vec![
        tokio::spawn(run_announcer(
            ctx.clone(),
            announce_socket,
            group,
            cfg.announce_interval(),
        )),
        tokio::spawn(run_discovery_listener(ctx.clone(), listen_socket)),
    ])
}
