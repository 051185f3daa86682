use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use peerchat::config::Config;
use peerchat::network::peer::PeerIdentity;
use peerchat::node::ChatNode;

fn node_config(dir: &Path, extra_network: &str) -> Config {
    let toml = format!(
        r#"
user_name = "X"
port = 0

[discovery]
enabled = false

[history]
path = '{}'

[network]
bind_addr = "127.0.0.1"
{}
"#,
        dir.join("chat_history.txt").display(),
        extra_network
    );
    Config::from_toml_str(&toml).unwrap()
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

fn loopback(port: u16) -> PeerIdentity {
    PeerIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Read until the node closes the stream; returns what it sent.
async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut buf))
        .await
        .expect("node should close the stream")
        .unwrap_or_default();
    buf
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn valid_handshake_registers_and_records_lines() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = ChatNode::start(&node_config(dir.path(), "")).await.unwrap();
    let ctx = node.context().clone();

    let mut client = TcpStream::connect(node.listen_addr()).await.unwrap();
    client.write_all(b"HELLO:6500\n").await.unwrap();

    let id = loopback(6500);
    assert!(
        eventually(|| {
            let ctx = ctx.clone();
            async move { ctx.registry().connection_count().await == 1 }
        })
        .await
    );
    assert!(ctx.registry().is_reserved(&id));
    assert_eq!(ctx.registry().count_for(&id).await, 1);

    client.write_all(b"Y: hello\nHELLO:6500\nY: again\n").await.unwrap();
    assert!(
        eventually(|| {
            let ctx = ctx.clone();
            async move { ctx.registry().history_len().await == 2 }
        })
        .await
    );
    assert_eq!(
        ctx.registry().history().await,
        vec!["Y: hello".to_string(), "Y: again".to_string()]
    );

    drop(client);
    assert!(
        eventually(|| {
            let ctx = ctx.clone();
            let id = id.clone();
            async move { !ctx.registry().is_reserved(&id) }
        })
        .await,
        "dropped link must release its reservation"
    );
    assert_eq!(ctx.registry().connection_count().await, 0);
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_identity_is_rejected_and_existing_reservation_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = ChatNode::start(&node_config(dir.path(), "")).await.unwrap();
    let ctx = node.context().clone();

    let id = loopback(6600);
    assert!(ctx.registry().try_reserve(&id));

    let mut client = TcpStream::connect(node.listen_addr()).await.unwrap();
    client.write_all(b"HELLO:6600\n").await.unwrap();
    let sent = read_until_closed(&mut client).await;
    assert!(sent.is_empty());

    assert!(ctx.registry().is_reserved(&id));
    assert_eq!(ctx.registry().connection_count().await, 0);
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_handshakes_close_the_stream_without_reserving() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = ChatNode::start(&node_config(dir.path(), "")).await.unwrap();
    let ctx = node.context().clone();

    for first_line in [&b"hello there\n"[..], b"HELLO:abc\n", b"HELLO:0\n"] {
        let mut client = TcpStream::connect(node.listen_addr()).await.unwrap();
        client.write_all(first_line).await.unwrap();
        read_until_closed(&mut client).await;
    }
    // Closed before sending anything.
    drop(TcpStream::connect(node.listen_addr()).await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(ctx.registry().reservations().is_empty());
    assert_eq!(ctx.registry().connection_count().await, 0);
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_peer_is_dropped_after_handshake_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = ChatNode::start(&node_config(dir.path(), "handshake_timeout_ms = 100"))
        .await
        .unwrap();

    let mut client = TcpStream::connect(node.listen_addr()).await.unwrap();
    read_until_closed(&mut client).await;
    assert!(node.context().registry().reservations().is_empty());
    node.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_accepted_links() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = ChatNode::start(&node_config(dir.path(), "")).await.unwrap();
    let ctx = node.context().clone();

    let mut client = TcpStream::connect(node.listen_addr()).await.unwrap();
    client.write_all(b"HELLO:6700\n").await.unwrap();
    assert!(
        eventually(|| {
            let ctx = ctx.clone();
            async move { ctx.registry().connection_count().await == 1 }
        })
        .await
    );

    node.shutdown().await;
    read_until_closed(&mut client).await;
    assert!(ctx.registry().reservations().is_empty());
    assert!(ctx.is_shutting_down());
    // Listener is gone.
    assert!(TcpStream::connect(node.listen_addr()).await.is_err());
}
