use std::{sync::Arc, time::Duration};

use polyio::{
    api::{OsSocketApi, SocketApi},
    net::{Ipv4TcpSocket, Ipv4UdpSocket},
    Linger,
};

fn api() -> Arc<dyn SocketApi> {
    Arc::new(OsSocketApi::new())
}

#[test]
fn reuse_address_round_trips() {
    let socket = Ipv4TcpSocket::new(api()).unwrap();
    assert!(!socket.reuse_address().unwrap());
    socket.set_reuse_address(true).unwrap();
    assert!(socket.reuse_address().unwrap());
    socket.set_reuse_address(false).unwrap();
    assert!(!socket.reuse_address().unwrap());
}

#[test]
fn keepalive_round_trips() {
    let socket = Ipv4TcpSocket::new(api()).unwrap();
    assert!(!socket.keepalive().unwrap());
    socket.set_keepalive(true).unwrap();
    assert!(socket.keepalive().unwrap());
}

#[test]
fn linger_round_trips() {
    let socket = Ipv4TcpSocket::new(api()).unwrap();
    let configured = Linger {
        enabled: true,
        seconds: 5,
    };
    socket.set_linger(configured).unwrap();
    assert_eq!(socket.linger().unwrap(), configured);

    socket
        .set_linger(Linger {
            enabled: false,
            seconds: 0,
        })
        .unwrap();
    assert!(!socket.linger().unwrap().enabled);
}

#[test]
fn receive_and_send_timeouts_round_trip() {
    let socket = Ipv4UdpSocket::new(api()).unwrap();
    assert_eq!(socket.receive_timeout().unwrap(), Duration::ZERO);

    socket
        .set_receive_timeout(Duration::from_millis(1500))
        .unwrap();
    let timeout = socket.receive_timeout().unwrap();
    // Kernels may round to their own granularity.
    assert!(timeout >= Duration::from_millis(1400), "got {timeout:?}");
    assert!(timeout <= Duration::from_millis(1600), "got {timeout:?}");

    socket.set_send_timeout(Duration::from_secs(2)).unwrap();
    let timeout = socket.send_timeout().unwrap();
    assert!(timeout >= Duration::from_millis(1900), "got {timeout:?}");
}

#[test]
fn receive_timeout_bounds_a_blocking_receive() {
    let socket = Ipv4UdpSocket::new(api()).unwrap();
    socket
        .bind(&"127.0.0.1:0".parse().unwrap())
        .unwrap();
    socket
        .set_receive_timeout(Duration::from_millis(100))
        .unwrap();

    let started = std::time::Instant::now();
    let mut buffer = [0u8; 16];
    // Nobody sends; the bounded receive comes back empty.
    let count = socket.receive(&mut buffer, 0).unwrap();
    assert_eq!(count, 0);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(80), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
}

#[test]
fn blocking_mode_round_trips() {
    let socket = Ipv4TcpSocket::new(api()).unwrap();
    assert!(socket.blocking_mode().unwrap());
    socket.set_blocking_mode(false).unwrap();
    assert!(!socket.blocking_mode().unwrap());
    socket.set_blocking_mode(true).unwrap();
    assert!(socket.blocking_mode().unwrap());
}
