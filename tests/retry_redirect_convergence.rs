// End-to-end MOVED redirect convergence: a request sent to the wrong
// node gets redirected once and completes against the node the
// server actually pointed it at, with no live cluster beyond two
// plain TCP listeners standing in for the two nodes.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use valkey_core::codec::Value;
use valkey_core::config::{
    Address, BackoffStrategy, ClientConfig, ProtocolVersion, PubSubSubscriptions, ReadFrom, TlsMode,
};
use valkey_core::pool::PoolRegistry;
use valkey_core::retry::{execute_with_retry, RefreshNotifier};

fn test_config(connect_to: u16) -> ClientConfig {
    ClientConfig {
        addresses: vec![Address { host: "127.0.0.1".into(), port: connect_to }],
        cluster_mode: true,
        tls_mode: TlsMode::NoTls,
        auth: None,
        database_id: 0,
        protocol: ProtocolVersion::Resp2,
        client_name: None,
        request_timeout: std::time::Duration::from_millis(2_000),
        connection_timeout: std::time::Duration::from_millis(250),
        read_from: ReadFrom::Primary,
        retry: BackoffStrategy {
            number_of_retries: 3,
            factor: 5,
            exponent_base: 2,
        },
        pubsub_subscriptions: PubSubSubscriptions::default(),
        connections_per_node: 1,
        health_check_interval: std::time::Duration::from_secs(30),
        topology_refresh_interval: std::time::Duration::from_secs(60),
        allow_non_covered_slots: false,
    }
}

/// Accepts one connection, reads whatever the client sends, and
/// writes back a fixed response. No RESP parsing needed on this side:
/// the client only cares that a complete reply frame arrives.
async fn serve_one(listener: TcpListener, reply: &'static [u8]) {
    let (mut sock, _) = listener.accept().await.expect("accept");
    let mut buf = [0u8; 256];
    let _ = sock.read(&mut buf).await.expect("read request");
    sock.write_all(reply).await.expect("write reply");
    sock.flush().await.expect("flush reply");
    // Hold the socket open briefly so the client's read completes
    // before this task (and the stream) drops.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[tokio::test]
async fn moved_redirect_completes_against_the_new_node() {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port_a = listener_a.local_addr().unwrap().port();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port_b = listener_b.local_addr().unwrap().port();

    let moved_reply = format!("-MOVED 7000 127.0.0.1:{port_b}\r\n").into_bytes();
    let server_a = tokio::spawn(async move {
        serve_one(listener_a, Box::leak(moved_reply.into_boxed_slice())).await;
    });
    let server_b = tokio::spawn(async move {
        serve_one(listener_b, b"+OK\r\n").await;
    });

    let config = test_config(port_a);
    let (push_tx, _push_rx) = mpsc::unbounded_channel();
    let pools = PoolRegistry::new(config.clone(), push_tx);
    let refresh = RefreshNotifier::new();

    let result = execute_with_retry(
        &pools,
        &config,
        &refresh,
        b"GET",
        &[b"{a}1".to_vec()],
        "127.0.0.1".to_string(),
        port_a,
        true,
    )
    .await;

    assert_eq!(result.unwrap(), Value::SimpleString(b"OK".to_vec()));

    server_a.await.unwrap();
    server_b.await.unwrap();
}

#[tokio::test]
async fn too_many_redirects_gives_up_with_a_typed_error() {
    // Every node in the loop redirects back to the same address, so
    // the engine must bail out once it exceeds the redirect cap
    // rather than looping forever.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        loop {
            let accepted = listener.accept().await;
            let (mut sock, _) = match accepted {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let mut buf = [0u8; 256];
            if sock.read(&mut buf).await.is_err() {
                return;
            }
            let reply = format!("-MOVED 7000 127.0.0.1:{port}\r\n");
            if sock.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
            let _ = sock.flush().await;
        }
    });

    let config = test_config(port);
    let (push_tx, _push_rx) = mpsc::unbounded_channel();
    let pools = PoolRegistry::new(config.clone(), push_tx);
    let refresh = RefreshNotifier::new();

    let result = execute_with_retry(
        &pools,
        &config,
        &refresh,
        b"GET",
        &[b"{a}1".to_vec()],
        "127.0.0.1".to_string(),
        port,
        true,
    )
    .await;

    match result {
        Err(valkey_core::error::CoreError::TooManyRedirects(n)) => {
            assert!(n > valkey_core::retry::MAX_REDIRECTS)
        }
        other => panic!("expected TooManyRedirects, got {other:?}"),
    }

    server.abort();
}
