//! A TCP echo client: connects, sends one message, prints the echo.

use std::{sync::Arc, time::Duration};

use polyio::{
    api::{OsSocketApi, SocketApi},
    net::TcpClient,
    Ipv4Address, Ipv4Endpoint, Timeout,
};

const DEFAULT_PORT: u16 = 7;
const MESSAGE: &[u8] = b"HelloWorld";

fn main() {
    tracing_subscriber::fmt().init();

    let port = match std::env::args().nth(1) {
        None => DEFAULT_PORT,
        Some(text) => text.parse().unwrap_or_else(|_| {
            tracing::error!(argument = %text, "cannot parse port, falling back to default");
            DEFAULT_PORT
        }),
    };

    let api: Arc<dyn SocketApi> = Arc::new(OsSocketApi::new());
    let endpoint = Ipv4Endpoint::new(Ipv4Address::LOCALHOST, port);
    let mut client = match TcpClient::new(api, endpoint) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "cannot open client socket");
            std::process::exit(1);
        }
    };

    match client.connect(Timeout::Finite(Duration::from_secs(5))) {
        Ok(true) => println!("connected to {endpoint}"),
        Ok(false) => {
            tracing::error!(%endpoint, "connect timed out");
            std::process::exit(1);
        }
        Err(error) => {
            tracing::error!(%error, %endpoint, "connect failed");
            std::process::exit(1);
        }
    }

    if !client.send_buffer(MESSAGE, 0).unwrap_or(false) {
        tracing::error!("send failed");
        std::process::exit(1);
    }
    let mut reply = Vec::new();
    match client.receive_block(&mut reply, MESSAGE.len(), 0) {
        Ok(true) => println!("received: {}", String::from_utf8_lossy(&reply)),
        Ok(false) => tracing::error!("server closed before the full echo arrived"),
        Err(error) => tracing::error!(%error, "receive failed"),
    }
    client.disconnect();
}
