use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use peerchat::network::message::{
    format_chat_line, is_handshake_line, Announce, Handshake, HandshakeParseError,
};
use peerchat::network::peer::PeerIdentity;

#[test]
fn announce_payload_uses_discovery_tag() {
    assert_eq!(Announce::new(5001).to_payload(), "CHAT_PEER_ANNOUNCE:5001");
}

#[test]
fn announce_parse_accepts_whitespace_and_extra_fields() {
    assert_eq!(
        Announce::parse(b"  CHAT_PEER_ANNOUNCE:5002\n"),
        Some(Announce::new(5002))
    );
    assert_eq!(
        Announce::parse(b"CHAT_PEER_ANNOUNCE:5003:extra:stuff"),
        Some(Announce::new(5003))
    );
}

#[test]
fn announce_parse_rejects_malformed() {
    assert_eq!(Announce::parse(b"HELLO:5000"), None);
    assert_eq!(Announce::parse(b"CHAT_PEER_ANNOUNCE"), None);
    assert_eq!(Announce::parse(b"CHAT_PEER_ANNOUNCE:"), None);
    assert_eq!(Announce::parse(b"CHAT_PEER_ANNOUNCE:abc"), None);
    assert_eq!(Announce::parse(b"CHAT_PEER_ANNOUNCE:70000"), None);
    assert_eq!(Announce::parse(b"CHAT_PEER_ANNOUNCE:0"), None);
    assert_eq!(Announce::parse(&[0xff, 0xfe, 0x00]), None);
}

#[test]
fn handshake_line_round_trip() {
    let line = Handshake::new(5002).to_line();
    assert_eq!(line, "HELLO:5002\n");
    assert_eq!(Handshake::parse(&line), Ok(Handshake::new(5002)));
    assert_eq!(Handshake::parse("HELLO:5002\r\n"), Ok(Handshake::new(5002)));
}

#[test]
fn handshake_parse_errors_are_distinguished() {
    assert_eq!(
        Handshake::parse("hi there"),
        Err(HandshakeParseError::MissingPrefix)
    );
    assert_eq!(
        Handshake::parse("HELLO:port"),
        Err(HandshakeParseError::InvalidPort("port".into()))
    );
    assert!(matches!(
        Handshake::parse("HELLO:0"),
        Err(HandshakeParseError::InvalidPort(_))
    ));
}

#[test]
fn stray_handshake_lines_are_recognised() {
    assert!(is_handshake_line("HELLO:5000"));
    assert!(!is_handshake_line("alice: HELLO:5000"));
}

#[test]
fn chat_line_format() {
    assert_eq!(format_chat_line("X", "hi"), "X: hi");
}

#[test]
fn peer_identity_display_and_parse() {
    let id = PeerIdentity::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)), 5002);
    assert_eq!(id.to_string(), "192.168.1.7:5002");
    assert_eq!("192.168.1.7:5002".parse::<PeerIdentity>().unwrap(), id);

    let v6 = PeerIdentity::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 5003);
    assert_eq!(v6.to_string(), "[::1]:5003");
}

#[test]
fn ipv4_mapped_addresses_share_identity_with_ipv4() {
    let mapped = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 2).to_ipv6_mapped());
    let plain = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    assert_eq!(PeerIdentity::new(mapped, 5000), PeerIdentity::new(plain, 5000));
}

#[test]
fn same_host_different_ports_are_distinct_peers() {
    let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    assert_ne!(PeerIdentity::new(host, 5001), PeerIdentity::new(host, 5002));
}
