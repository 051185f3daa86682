use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use peerchat::events::model::ConnectionRole;
use peerchat::history::HistoryStore;
use peerchat::network::peer::PeerIdentity;
use peerchat::network::registry::{ConnectionRegistry, ReservationSet};

fn peer(port: u16) -> PeerIdentity {
    PeerIdentity::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), port)
}

fn remote(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), port)
}

#[test]
fn try_reserve_is_add_if_absent() {
    let set = ReservationSet::new();
    assert!(set.try_reserve(&peer(5000)));
    assert!(!set.try_reserve(&peer(5000)));
    assert!(set.try_reserve(&peer(5001)));
    assert_eq!(set.len(), 2);
    assert!(set.release(&peer(5000)));
    assert!(!set.release(&peer(5000)));
    assert!(set.try_reserve(&peer(5000)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_have_exactly_one_winner() {
    let set = ReservationSet::new();
    let id = peer(6000);
    let mut tasks = Vec::new();
    for _ in 0..64 {
        let set = set.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move { set.try_reserve(&id) }));
    }
    let mut winners = 0;
    for t in tasks {
        if t.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(set.snapshot(), vec![id]);
}

#[tokio::test]
async fn remove_releases_reservation_once() {
    let registry = ConnectionRegistry::new(HistoryStore::in_memory());
    let id = peer(7000);
    assert!(registry.try_reserve(&id));
    let (writer, _far) = tokio::io::duplex(64);
    let handle = registry
        .register(id.clone(), ConnectionRole::Inbound, remote(40000), Box::new(writer))
        .await;
    assert_eq!(registry.connection_count().await, 1);
    assert_eq!(registry.count_for(&id).await, 1);

    assert_eq!(registry.remove(handle.id).await, Some(id.clone()));
    assert!(!registry.is_reserved(&id));
    assert_eq!(registry.connection_count().await, 0);

    // A fresh reservation for the same identity must survive a late second removal.
    assert!(registry.try_reserve(&id));
    assert_eq!(registry.remove(handle.id).await, None);
    assert!(registry.is_reserved(&id));
}

#[tokio::test]
async fn removal_wakes_the_reader_latch() {
    let registry = ConnectionRegistry::new(HistoryStore::in_memory());
    let id = peer(7001);
    registry.try_reserve(&id);
    let (writer, _far) = tokio::io::duplex(64);
    let handle = registry
        .register(id, ConnectionRole::Outbound, remote(7001), Box::new(writer))
        .await;
    registry.remove(handle.id).await;
    tokio::time::timeout(std::time::Duration::from_secs(1), handle.closed())
        .await
        .expect("closed latch should fire after removal");
}

#[tokio::test]
async fn drain_closes_everything_and_clears_reservations() {
    let registry = ConnectionRegistry::new(HistoryStore::in_memory());
    let mut fars = Vec::new();
    for port in [8001u16, 8002, 8003] {
        let id = peer(port);
        assert!(registry.try_reserve(&id));
        let (writer, far) = tokio::io::duplex(64);
        fars.push(far);
        registry
            .register(id, ConnectionRole::Inbound, remote(port), Box::new(writer))
            .await;
    }
    // An in-flight dial: reserved, not registered.
    assert!(registry.try_reserve(&peer(8004)));

    let drained = registry.drain().await;
    assert_eq!(drained.len(), 3);
    assert_eq!(registry.connection_count().await, 0);
    assert!(registry.reservations().is_empty());

    // The far ends observe EOF once the writers were shut down.
    use tokio::io::AsyncReadExt;
    for mut far in fars {
        let mut buf = Vec::new();
        let n = far.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}

#[tokio::test]
async fn connections_snapshot_reports_role_and_identity() {
    let registry = Arc::new(ConnectionRegistry::new(HistoryStore::in_memory()));
    let id = peer(9001);
    registry.try_reserve(&id);
    let (writer, _far) = tokio::io::duplex(64);
    registry
        .register(id.clone(), ConnectionRole::Outbound, remote(9001), Box::new(writer))
        .await;
    let infos = registry.connections().await;
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].identity, id);
    assert_eq!(infos[0].role, ConnectionRole::Outbound);
    assert_eq!(registry.reserved_peers(), vec![id]);
}
