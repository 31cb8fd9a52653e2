use std::{
    io::Read as _,
    net::{SocketAddr, TcpListener},
    time::Duration,
};

use carbon_client::{CarbonClient, CarbonClientBuilder, ClientError, LineMetadata};

fn test_client(flush_interval: Duration) -> CarbonClient {
    CarbonClientBuilder::new()
        .with_flush_interval(flush_interval)
        .with_connect_timeout(Duration::from_millis(250))
        .with_telemetry(false)
        .build()
        .unwrap_or_else(|e| panic!("failed to build client: {:?}", e))
}

fn read_all(listener: &TcpListener) -> String {
    let (mut socket, _) = listener.accept().unwrap();
    let mut received = String::new();
    socket.read_to_string(&mut received).unwrap();
    received
}

fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[test]
fn buffered_lines_are_written_on_deinit() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut client = test_client(Duration::from_secs(3600));
    client.init("127.0.0.1", addr.port()).unwrap();
    assert!(client.is_connected());

    client.send("systems.web01.cpu.0.idle.", 42, Some(LineMetadata::with_timestamp(1000))).unwrap();
    client.send("systems.web01.requests.", 100, Some(LineMetadata::with_timestamp(1001))).unwrap();
    client.send("systems.web01.requests.", 5, Some(LineMetadata::with_timestamp(1001))).unwrap();
    client.deinit().unwrap();
    assert!(!client.is_connected());

    assert_eq!(
        read_all(&listener),
        "systems.web01.cpu.0.idle. 42 1000\nsystems.web01.requests. 100 1001\nsystems.web01.requests. 5 1001\n"
    );
}

#[test]
fn lines_without_timestamp_are_stamped_with_current_time() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut client = test_client(Duration::ZERO);
    client.init("127.0.0.1", addr.port()).unwrap();
    client.send("a.b", 7, None).unwrap();
    client.deinit().unwrap();

    let received = read_all(&listener);
    let mut parts = received.trim_end().split(' ');
    assert_eq!(parts.next(), Some("a.b"));
    assert_eq!(parts.next(), Some("7"));
    let timestamp: u64 = parts.next().unwrap().parse().unwrap();
    assert!(timestamp > 1_600_000_000);
    assert_eq!(parts.next(), None);
}

#[test]
fn send_before_init_fails() {
    let mut client = test_client(Duration::ZERO);
    assert!(matches!(client.send("a.b", 1, None), Err(ClientError::NotInitialized)));
    assert!(matches!(client.flush(), Err(ClientError::NotInitialized)));

    // Shutting down a client that never started is harmless.
    assert!(client.deinit().is_ok());
}

#[test]
fn invalid_path_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut client = test_client(Duration::from_secs(3600));
    client.init("127.0.0.1", addr.port()).unwrap();

    let result = client.send("has space", 1, None);
    assert!(matches!(result, Err(ClientError::LineDropped { ref path }) if path == "has space"));

    client.send("ok", 1, Some(LineMetadata::with_timestamp(5))).unwrap();
    client.deinit().unwrap();

    assert_eq!(read_all(&listener), "ok 1 5\n");
}

#[test]
fn unreachable_server_drops_payloads() {
    let addr = unused_addr();

    let mut client = test_client(Duration::ZERO);

    // Initialization only resolves the address, so an unreachable server is not an error yet.
    client.init("127.0.0.1", addr.port()).unwrap();
    assert!(!client.is_connected());

    let result = client.send("a.b", 1, None);
    assert!(matches!(result, Err(ClientError::Io(_))));

    // The failed payload was dropped rather than kept around.
    assert!(client.deinit().is_ok());
}
