//! A TCP echo server.
//!
//! Run the example and `nc 127.0.0.1 <port>` in another shell; all
//! your input will be echoed out. Stop with ctrl-c.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use polyio::{
    api::{OsSocketApi, SocketApi},
    server::TcpServer,
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
    let server = TcpServer::new(
        api,
        Arc::new(|received: &[u8], reply: &mut Vec<u8>| {
            tracing::debug!(bytes = received.len(), "data in");
            reply.extend_from_slice(received);
            true
        }),
    );
    if let Err(error) = server.start(port, 1, Duration::from_secs(2)) {
        tracing::error!(%error, port, "cannot start server");
        std::process::exit(1);
    }
    println!("echo server listening on port {port}");

    while !interrupted.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
    println!("stopping");
    server.stop();
}
