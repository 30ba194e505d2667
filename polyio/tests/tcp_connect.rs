use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use polyio::{
    api::{OsSocketApi, SocketApi},
    net::{Ipv4TcpSocket, TcpClient},
    Ipv4Address, Ipv4Endpoint, Timeout,
};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn connect_to_absent_server_does_not_hang() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let port = free_port();
    let endpoint = Ipv4Endpoint::new(Ipv4Address::LOCALHOST, port);
    let mut client = TcpClient::new(Arc::clone(&api), endpoint).unwrap();

    let started = Instant::now();
    let result = client.connect(Timeout::Finite(Duration::from_millis(500)));
    let elapsed = started.elapsed();

    // Loopback rejects immediately (refused) or the budget runs out;
    // either way the call is bounded and the client stays disconnected.
    assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    if let Ok(connected) = result {
        assert!(!connected);
    }
    assert!(!client.is_connected());
}

#[test]
fn connect_to_listening_socket_succeeds_within_timeout() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let endpoint = Ipv4Endpoint::new(Ipv4Address::LOCALHOST, port);
    let mut client = TcpClient::new(Arc::clone(&api), endpoint).unwrap();
    assert!(client
        .connect(Timeout::Finite(Duration::from_secs(5)))
        .unwrap());
    assert!(client.is_connected());
    assert_eq!(client.remote_endpoint().unwrap(), endpoint);

    let (peer, peer_addr) = listener.accept().unwrap();
    assert_eq!(
        peer_addr.port(),
        client.local_endpoint().unwrap().port()
    );
    drop(peer);
    client.disconnect();
}

#[test]
fn accepted_socket_talks_to_the_accepting_side() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let listen_socket = Ipv4TcpSocket::new(Arc::clone(&api)).unwrap();
    listen_socket.set_reuse_address(true).unwrap();
    listen_socket
        .bind(&Ipv4Endpoint::new(Ipv4Address::LOCALHOST, 0))
        .unwrap();
    listen_socket.listen(1).unwrap();
    let server_endpoint = listen_socket.local_endpoint().unwrap();

    let mut peer = std::net::TcpStream::connect(("127.0.0.1", server_endpoint.port())).unwrap();

    let (accepted, peer_endpoint) = listen_socket
        .accept(Timeout::Finite(Duration::from_secs(5)))
        .unwrap()
        .expect("no connection within the accept timeout");
    assert_eq!(peer_endpoint.address(), Ipv4Address::LOCALHOST);
    assert_eq!(
        peer_endpoint.port(),
        peer.local_addr().unwrap().port()
    );

    use std::io::{Read, Write};
    peer.write_all(b"over-the-wire").unwrap();
    let mut received = Vec::new();
    assert!(accepted
        .receive_block(&mut received, 13, 0)
        .unwrap());
    assert_eq!(received, b"over-the-wire");

    assert!(accepted.send_all(b"and-back", 0).unwrap());
    let mut reply = [0u8; 8];
    peer.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"and-back");
}

#[test]
fn accept_without_client_times_out() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let listen_socket = Ipv4TcpSocket::new(Arc::clone(&api)).unwrap();
    listen_socket
        .bind(&Ipv4Endpoint::new(Ipv4Address::LOCALHOST, 0))
        .unwrap();
    listen_socket.listen(1).unwrap();

    let started = Instant::now();
    let accepted = listen_socket
        .accept(Timeout::Finite(Duration::from_millis(100)))
        .unwrap();
    let elapsed = started.elapsed();
    assert!(accepted.is_none());
    assert!(elapsed >= Duration::from_millis(90), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "returned after {elapsed:?}");
    // The operation restored blocking mode on its way out.
    assert!(listen_socket.blocking_mode().unwrap());
}
