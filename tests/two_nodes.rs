use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use peerchat::config::Config;
use peerchat::network::broadcast::broadcast_message;
use peerchat::network::discovery::{classify_announce, AnnounceDecision};
use peerchat::network::peer::PeerIdentity;
use peerchat::network::transport::dial_reserved;
use peerchat::node::{ChatNode, NodeContext};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn history_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_history.txt", name))
}

async fn start_node(dir: &Path, name: &str) -> ChatNode {
    let toml = format!(
        r#"
user_name = "{name}"
port = 0

[discovery]
enabled = false

[history]
path = '{path}'

[network]
bind_addr = "127.0.0.1"
connect_timeout_ms = 2000
"#,
        name = name,
        path = history_file(dir, name).display()
    );
    ChatNode::start(&Config::from_toml_str(&toml).unwrap())
        .await
        .unwrap()
}

async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..150 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn announce_of(ctx: &NodeContext) -> Vec<u8> {
    format!("CHAT_PEER_ANNOUNCE:{}", ctx.listen_port()).into_bytes()
}

async fn connections(ctx: &NodeContext) -> usize {
    ctx.registry().connection_count().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn announce_dial_and_chat_between_two_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let mut x = start_node(dir.path(), "X").await;
    let mut y = start_node(dir.path(), "Y").await;
    let xc = x.context().clone();
    let yc = y.context().clone();

    // Y hears X's announce and dials it.
    let decision = classify_announce(&yc, LOCALHOST, &announce_of(&xc));
    let x_id = PeerIdentity::new(LOCALHOST, xc.listen_port());
    assert_eq!(decision, AnnounceDecision::Dial(x_id.clone()));
    dial_reserved(yc.clone(), x_id.clone()).await;

    let y_id = PeerIdentity::new(LOCALHOST, yc.listen_port());
    assert!(
        eventually(|| {
            let xc = xc.clone();
            async move { connections(&xc).await == 1 }
        })
        .await
    );
    assert_eq!(xc.registry().reserved_peers(), vec![y_id.clone()]);
    assert_eq!(yc.registry().reserved_peers(), vec![x_id.clone()]);

    // Further announces from X are absorbed by the reservation.
    assert_eq!(
        classify_announce(&yc, LOCALHOST, &announce_of(&xc)),
        AnnounceDecision::AlreadyReserved(x_id)
    );

    let report = broadcast_message(&xc, "hi").await;
    assert_eq!(report.delivered, vec![y_id]);
    assert!(
        eventually(|| {
            let yc = yc.clone();
            async move { yc.registry().history().await == vec!["X: hi".to_string()] }
        })
        .await
    );
    let y_log = std::fs::read_to_string(history_file(dir.path(), "Y")).unwrap();
    assert_eq!(y_log, "X: hi\n");

    // And the other direction over the same link.
    broadcast_message(&yc, "hey").await;
    assert!(
        eventually(|| {
            let xc = xc.clone();
            async move {
                let lines = xc.registry().history().await;
                lines.last().map(String::as_str) == Some("Y: hey")
            }
        })
        .await
    );

    y.shutdown().await;
    assert!(
        eventually(|| {
            let xc = xc.clone();
            async move { xc.registry().reservations().is_empty() }
        })
        .await,
        "X must release Y once the link drops"
    );
    x.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_dial_releases_reservation() {
    let dir = tempfile::tempdir().unwrap();
    let mut y = start_node(dir.path(), "Y").await;
    let yc = y.context().clone();

    // A port nobody listens on any more.
    let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_port = scratch.local_addr().unwrap().port();
    drop(scratch);

    let payload = format!("CHAT_PEER_ANNOUNCE:{}", dead_port);
    let AnnounceDecision::Dial(id) = classify_announce(&yc, LOCALHOST, payload.as_bytes()) else {
        panic!("expected a dial decision");
    };
    assert!(yc.registry().is_reserved(&id));
    dial_reserved(yc.clone(), id.clone()).await;
    assert!(!yc.registry().is_reserved(&id));
    assert_eq!(connections(&yc).await, 0);

    // The next announce may retry.
    assert!(matches!(
        classify_announce(&yc, LOCALHOST, payload.as_bytes()),
        AnnounceDecision::Dial(_)
    ));
    y.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_mutual_dial_collapses_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let mut x = start_node(dir.path(), "X").await;
    let mut y = start_node(dir.path(), "Y").await;
    let xc = x.context().clone();
    let yc = y.context().clone();

    // Both hear each other before either handshake lands.
    let AnnounceDecision::Dial(y_id) = classify_announce(&xc, LOCALHOST, &announce_of(&yc)) else {
        panic!("X should dial Y");
    };
    let AnnounceDecision::Dial(x_id) = classify_announce(&yc, LOCALHOST, &announce_of(&xc)) else {
        panic!("Y should dial X");
    };
    tokio::join!(
        dial_reserved(xc.clone(), y_id.clone()),
        dial_reserved(yc.clone(), x_id.clone())
    );

    // Each side rejects the other's inbound as a duplicate; the outbound links
    // then see EOF and everything is released.
    assert!(
        eventually(|| {
            let (xc, yc) = (xc.clone(), yc.clone());
            async move {
                xc.registry().reservations().is_empty()
                    && yc.registry().reservations().is_empty()
                    && connections(&xc).await == 0
                    && connections(&yc).await == 0
            }
        })
        .await
    );

    // One later announce links them exactly once.
    let AnnounceDecision::Dial(x_id) = classify_announce(&yc, LOCALHOST, &announce_of(&xc)) else {
        panic!("Y should retry X");
    };
    dial_reserved(yc.clone(), x_id.clone()).await;
    assert!(
        eventually(|| {
            let xc = xc.clone();
            async move { connections(&xc).await == 1 }
        })
        .await
    );
    assert_eq!(connections(&yc).await, 1);
    assert_eq!(xc.registry().count_for(&y_id).await, 1);
    assert_eq!(yc.registry().count_for(&x_id).await, 1);

    x.shutdown().await;
    y.shutdown().await;
}
