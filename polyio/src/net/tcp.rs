//! TCP-typed sockets, the listening server socket and the client.

use std::{io, ops::Deref, sync::Arc};

use super::{ipv4::Ipv4Socket, ipv6::Ipv6Socket};
use crate::{
    api::SocketApi,
    defs::{SocketProtocol, SocketType, Timeout},
    endpoint::{Ipv4Endpoint, Ipv6Endpoint},
};

const TRACE_TARGET: &str = "polyio::net";

/// An IPv4 stream socket. Construction opens the handle.
#[derive(Debug)]
pub struct Ipv4TcpSocket {
    inner: Ipv4Socket,
}

impl Ipv4TcpSocket {
    /// Open an IPv4 TCP socket.
    pub fn new(api: Arc<dyn SocketApi>) -> io::Result<Ipv4TcpSocket> {
        Ok(Ipv4TcpSocket {
            inner: Ipv4Socket::with_protocol(api, SocketType::Stream, SocketProtocol::Tcp)?,
        })
    }

    pub(crate) fn from_ipv4(inner: Ipv4Socket) -> Ipv4TcpSocket {
        Ipv4TcpSocket { inner }
    }

    /// Accept one connection within `timeout`.
    pub fn accept(&self, timeout: Timeout) -> io::Result<Option<(Ipv4TcpSocket, Ipv4Endpoint)>> {
        Ok(self
            .inner
            .accept(timeout)?
            .map(|(socket, peer)| (Ipv4TcpSocket::from_ipv4(socket), peer)))
    }
}

impl Deref for Ipv4TcpSocket {
    type Target = Ipv4Socket;

    fn deref(&self) -> &Ipv4Socket {
        &self.inner
    }
}

/// An IPv6 stream socket. Construction opens the handle.
#[derive(Debug)]
pub struct Ipv6TcpSocket {
    inner: Ipv6Socket,
}

impl Ipv6TcpSocket {
    /// Open an IPv6 TCP socket.
    pub fn new(api: Arc<dyn SocketApi>) -> io::Result<Ipv6TcpSocket> {
        Ok(Ipv6TcpSocket {
            inner: Ipv6Socket::with_protocol(api, SocketType::Stream, SocketProtocol::Tcp)?,
        })
    }

    pub(crate) fn from_ipv6(inner: Ipv6Socket) -> Ipv6TcpSocket {
        Ipv6TcpSocket { inner }
    }

    /// Accept one connection within `timeout`.
    pub fn accept(&self, timeout: Timeout) -> io::Result<Option<(Ipv6TcpSocket, Ipv6Endpoint)>> {
        Ok(self
            .inner
            .accept(timeout)?
            .map(|(socket, peer)| (Ipv6TcpSocket::from_ipv6(socket), peer)))
    }
}

impl Deref for Ipv6TcpSocket {
    type Target = Ipv6Socket;

    fn deref(&self) -> &Ipv6Socket {
        &self.inner
    }
}

/// The listening side of an IPv4 TCP server: a TCP socket bundled
/// with its port, backlog and accept timeout.
#[derive(Debug)]
pub struct Ipv4TcpServerSocket {
    socket: Ipv4TcpSocket,
    port: u16,
    backlog: i32,
    accept_timeout: Timeout,
    initialized: bool,
}

impl Ipv4TcpServerSocket {
    /// Open the listening socket; [`initialize`] binds and listens.
    ///
    /// [`initialize`]: Ipv4TcpServerSocket::initialize
    pub fn new(
        api: Arc<dyn SocketApi>,
        port: u16,
        backlog: i32,
        accept_timeout: Timeout,
    ) -> io::Result<Ipv4TcpServerSocket> {
        Ok(Ipv4TcpServerSocket {
            socket: Ipv4TcpSocket::new(api)?,
            port,
            backlog,
            accept_timeout,
            initialized: false,
        })
    }

    /// The configured accept timeout.
    pub fn accept_timeout(&self) -> Timeout {
        self.accept_timeout
    }

    /// Bind to the configured port and start listening. Initializing
    /// twice is reported but harmless.
    pub fn initialize(&mut self) -> io::Result<()> {
        if self.initialized {
            tracing::warn!(target: TRACE_TARGET, "already initialized");
            return Ok(());
        }
        if !self.socket.is_open() {
            self.socket.open()?;
        }
        self.socket.set_reuse_address(true)?;
        self.socket.bind_port(self.port)?;
        self.socket.listen(self.backlog)?;
        self.initialized = true;
        Ok(())
    }

    /// Stop listening and release the handle.
    pub fn uninitialize(&mut self) -> io::Result<()> {
        if self.initialized {
            self.initialized = false;
            self.socket.close()?;
        }
        Ok(())
    }

    /// Whether the socket is bound and listening.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Accept one connection within the configured timeout. Fails
    /// soft — `Ok(None)` — when not initialized.
    pub fn accept(&self) -> io::Result<Option<(Ipv4TcpSocket, Ipv4Endpoint)>> {
        if !self.initialized {
            return Ok(None);
        }
        self.socket.accept(self.accept_timeout)
    }

    /// The underlying listening socket.
    pub fn as_tcp_socket(&self) -> &Ipv4TcpSocket {
        &self.socket
    }
}

/// A connection-oriented IPv4 TCP client.
///
/// Lifecycle: `Disconnected` → [`connect`] → `Connected` →
/// [`disconnect`] (or a fatal I/O error) → `Disconnected`, with
/// reconnects allowed.
///
/// [`connect`]: TcpClient::connect
/// [`disconnect`]: TcpClient::disconnect
#[derive(Debug)]
pub struct TcpClient {
    socket: Ipv4TcpSocket,
    server_endpoint: Ipv4Endpoint,
    connected: bool,
}

impl TcpClient {
    /// Create a client for the given server endpoint. The socket is
    /// opened but not yet connected.
    pub fn new(api: Arc<dyn SocketApi>, server_endpoint: Ipv4Endpoint) -> io::Result<TcpClient> {
        Ok(TcpClient {
            socket: Ipv4TcpSocket::new(api)?,
            server_endpoint,
            connected: false,
        })
    }

    /// The server endpoint this client targets.
    pub fn server_endpoint(&self) -> Ipv4Endpoint {
        self.server_endpoint
    }

    /// Connect within `timeout`.
    ///
    /// Refuses — `Ok(false)`, no state change — when already
    /// connected. Reopens the socket when a previous session closed
    /// it.
    pub fn connect(&mut self, timeout: Timeout) -> io::Result<bool> {
        if self.connected {
            tracing::trace!(target: TRACE_TARGET, "connect refused: already connected");
            return Ok(false);
        }
        // A fresh handle per attempt; a failed connect leaves the old
        // one in an error state.
        self.socket.open()?;
        let connected = self.socket.connect(&self.server_endpoint, timeout)?;
        self.connected = connected;
        Ok(connected)
    }

    /// Close the connection and return to `Disconnected`.
    pub fn disconnect(&mut self) {
        if let Err(error) = self.socket.close() {
            tracing::error!(target: TRACE_TARGET, %error, "disconnect failed");
        }
        self.connected = false;
    }

    /// Whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The local endpoint of the connection.
    pub fn local_endpoint(&self) -> io::Result<Ipv4Endpoint> {
        self.socket.local_endpoint()
    }

    /// The server-side endpoint of the connection.
    pub fn remote_endpoint(&self) -> io::Result<Ipv4Endpoint> {
        self.socket.remote_endpoint()
    }

    /// Receive up to `buffer.len()` bytes.
    pub fn receive(&mut self, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        let count = self.socket.receive(buffer, flags)?;
        if count == 0 && !self.socket.is_open() {
            // The peer closed; receive() already released the handle.
            self.connected = false;
        }
        Ok(count)
    }

    /// Send up to `data.len()` bytes, returning how many the kernel
    /// accepted.
    pub fn send(&mut self, data: &[u8], flags: i32) -> io::Result<usize> {
        self.socket.api().send(self.socket.handle(), data, flags)
    }

    /// Receive exactly `count` bytes appended to `buffer`;
    /// `Ok(false)` when the stream ended first.
    pub fn receive_block(&mut self, buffer: &mut Vec<u8>, count: usize, flags: i32) -> io::Result<bool> {
        self.socket.receive_block(buffer, count, flags)
    }

    /// Receive up to `count` bytes appended to `buffer`.
    pub fn receive_buffer(&mut self, buffer: &mut Vec<u8>, count: usize, flags: i32) -> io::Result<usize> {
        self.socket.receive_buffer(buffer, count, flags)
    }

    /// Send the whole buffer; `Ok(false)` when the peer closed.
    pub fn send_buffer(&mut self, data: &[u8], flags: i32) -> io::Result<bool> {
        self.socket.send_buffer(data, flags)
    }

    /// The client socket, for option tuning.
    pub fn as_tcp_socket(&self) -> &Ipv4TcpSocket {
        &self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::MockSocketApi, sockaddr::SockAddr};

    fn endpoint() -> Ipv4Endpoint {
        "127.0.0.1:22222".parse().unwrap()
    }

    #[test]
    fn tcp_socket_is_open_after_construction() {
        let api = Arc::new(MockSocketApi::new());
        let socket = Ipv4TcpSocket::new(Arc::clone(&api) as _).unwrap();
        assert!(socket.is_open());
    }

    #[test]
    fn client_connects_and_refuses_a_second_connect() {
        let api = Arc::new(MockSocketApi::new());
        let mut client = TcpClient::new(Arc::clone(&api) as _, endpoint()).unwrap();
        assert!(!client.is_connected());

        assert!(client.connect(Timeout::Infinite).unwrap());
        assert!(client.is_connected());

        // Second connect refuses without touching the OS.
        assert!(!client.connect(Timeout::Infinite).unwrap());
        assert!(client.is_connected());
        assert_eq!(api.calls().connect, 1);
    }

    #[test]
    fn client_reconnects_after_disconnect() {
        let api = Arc::new(MockSocketApi::new());
        let mut client = TcpClient::new(Arc::clone(&api) as _, endpoint()).unwrap();

        assert!(client.connect(Timeout::Infinite).unwrap());
        client.disconnect();
        assert!(!client.is_connected());

        assert!(client.connect(Timeout::Infinite).unwrap());
        assert!(client.is_connected());
        // One open at construction plus one per connect attempt.
        assert_eq!(api.calls().open, 3);
    }

    #[test]
    fn failed_connect_leaves_client_disconnected() {
        let api = Arc::new(MockSocketApi::new());
        #[cfg(unix)]
        let code = libc::ECONNREFUSED;
        #[cfg(windows)]
        let code = windows_sys::Win32::Networking::WinSock::WSAECONNREFUSED;
        api.on_connect(move |_, _: &SockAddr| Err(io::Error::from_raw_os_error(code)));
        let mut client = TcpClient::new(Arc::clone(&api) as _, endpoint()).unwrap();
        assert!(client.connect(Timeout::Infinite).is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn server_socket_initializes_binds_and_listens() {
        let api = Arc::new(MockSocketApi::new());
        let mut server = Ipv4TcpServerSocket::new(
            Arc::clone(&api) as _,
            22222,
            1,
            Timeout::Finite(std::time::Duration::from_millis(50)),
        )
        .unwrap();
        assert!(!server.is_initialized());

        server.initialize().unwrap();
        assert!(server.is_initialized());
        let calls = api.calls();
        assert_eq!(calls.bind, 1);
        assert_eq!(calls.listen, 1);

        // A second initialize only warns.
        server.initialize().unwrap();
        assert_eq!(api.calls().bind, 1);

        server.uninitialize().unwrap();
        assert!(!server.is_initialized());
        // Accept on an uninitialized server fails soft.
        assert!(server.accept().unwrap().is_none());
    }
}
