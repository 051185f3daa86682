// src/network/peer.rs

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Canonical `host:listen-port` key of a remote chat node.
///
/// The port is the peer's advertised *listen* port, never the ephemeral source
/// port of a stream, so the inbound and outbound sides of a link to the same
/// node agree on the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIdentity {
    addr: SocketAddr,
}

impl PeerIdentity {
    pub fn new(host: IpAddr, listen_port: u16) -> Self {
        Self {
            addr: SocketAddr::new(host.to_canonical(), listen_port),
        }
    }

    pub fn host(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn listen_port(&self) -> u16 {
        self.addr.port()
    }

    /// Address to dial to reach this peer's listener.
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl FromStr for PeerIdentity {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddr = s.trim().parse()?;
        Ok(Self::new(addr.ip(), addr.port()))
    }
}

impl From<SocketAddr> for PeerIdentity {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}
