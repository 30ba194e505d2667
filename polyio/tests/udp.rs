use std::sync::Arc;

use polyio::{
    api::{OsSocketApi, SocketApi},
    net::Ipv4UdpSocket,
    Ipv4Address, Ipv4Endpoint,
};

#[test]
fn udp_echo_loopback() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());

    let server = Ipv4UdpSocket::new(Arc::clone(&api)).unwrap();
    server
        .bind(&Ipv4Endpoint::new(Ipv4Address::LOCALHOST, 0))
        .unwrap();
    let server_endpoint = server.local_endpoint().unwrap();
    assert_ne!(server_endpoint.port(), 0);

    let echo = std::thread::spawn(move || {
        let mut buffer = [0u8; 64];
        let (count, peer) = server.receive_from(&mut buffer, 0).unwrap();
        assert!(count > 0);
        server.send_to(&peer, &buffer[..count], 0).unwrap();
    });

    let client = Ipv4UdpSocket::new(Arc::clone(&api)).unwrap();
    client
        .bind(&Ipv4Endpoint::new(Ipv4Address::LOCALHOST, 0))
        .unwrap();
    let sent = client.send_to(&server_endpoint, b"HelloWorld", 0).unwrap();
    assert_eq!(sent, 10);

    let mut buffer = [0u8; 64];
    let (count, peer) = client.receive_from(&mut buffer, 0).unwrap();
    assert_eq!(count, 10);
    assert_eq!(&buffer[..count], b"HelloWorld");
    // The datagram came back from the server endpoint itself.
    assert_eq!(peer, server_endpoint);

    echo.join().unwrap();
}

#[test]
fn wildcard_bound_socket_reports_its_port() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let socket = Ipv4UdpSocket::new(Arc::clone(&api)).unwrap();
    socket.bind(&Ipv4Endpoint::any(0)).unwrap();
    let endpoint = socket.local_endpoint().unwrap();
    assert_eq!(endpoint.address(), Ipv4Address::ANY);
    assert_ne!(endpoint.port(), 0);
}

#[test]
fn broadcast_requires_the_socket_option() {
    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let socket = Ipv4UdpSocket::new(Arc::clone(&api)).unwrap();
    assert!(!socket.broadcast().unwrap());
    socket.set_broadcast(true).unwrap();
    assert!(socket.broadcast().unwrap());
}
