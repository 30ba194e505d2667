//! A UDP echo server: every datagram goes straight back to its sender.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use polyio::{
    api::{OsSocketApi, SocketApi},
    net::Ipv4UdpSocket,
    Ipv4Endpoint,
};

const DEFAULT_PORT: u16 = 7;

fn main() {
    tracing_subscriber::fmt().init();

    let port = match std::env::args().nth(1) {
        None => DEFAULT_PORT,
        Some(text) => text.parse().unwrap_or_else(|_| {
            tracing::error!(argument = %text, "cannot parse port, falling back to default");
            DEFAULT_PORT
        }),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let latch = interrupted.clone();
    ctrlc::set_handler(move || latch.store(true, Ordering::SeqCst))
        .expect("installing the interrupt handler failed");

    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let socket = match Ipv4UdpSocket::new(api) {
        Ok(socket) => socket,
        Err(error) => {
            tracing::error!(%error, "cannot open socket");
            std::process::exit(1);
        }
    };
    if let Err(error) = socket.bind(&Ipv4Endpoint::any(port)) {
        tracing::error!(%error, port, "cannot bind");
        std::process::exit(1);
    }
    if let Err(error) = socket.set_receive_timeout(Duration::from_millis(100)) {
        tracing::error!(%error, "cannot bound the receive");
        std::process::exit(1);
    }
    println!("udp echo listening on port {port}");

    let mut buffer = [0u8; 4096];
    while !interrupted.load(Ordering::SeqCst) {
        match socket.receive_from(&mut buffer, 0) {
            Ok((0, _)) => {}
            Ok((count, peer)) => {
                tracing::debug!(bytes = count, %peer, "datagram in");
                if let Err(error) = socket.send_to(&peer, &buffer[..count], 0) {
                    tracing::error!(%error, %peer, "echo failed");
                }
            }
            Err(error) => {
                tracing::error!(%error, "receive failed");
                break;
            }
        }
    }
    println!("stopping");
}
