//! The IPv4-typed socket.

use std::{io, ops::Deref, sync::Arc};

use crate::{
    api::SocketApi,
    defs::{SocketFamily, SocketProtocol, SocketType, Timeout},
    endpoint::Ipv4Endpoint,
    sockaddr::SockAddr,
    socket::Socket,
};

/// A socket restricted to the IPv4 family, speaking endpoints instead
/// of raw addresses.
#[derive(Debug)]
pub struct Ipv4Socket {
    socket: Socket,
}

impl Ipv4Socket {
    /// Open an IPv4 socket of the given type.
    pub fn new(api: Arc<dyn SocketApi>, socket_type: SocketType) -> io::Result<Ipv4Socket> {
        Self::with_protocol(api, socket_type, SocketProtocol::Ip)
    }

    /// Open an IPv4 socket of the given type and protocol.
    pub fn with_protocol(
        api: Arc<dyn SocketApi>,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<Ipv4Socket> {
        let socket = Socket::with_protocol(api, SocketFamily::InternetV4, socket_type, protocol);
        socket.open()?;
        Ok(Ipv4Socket { socket })
    }

    pub(crate) fn from_socket(socket: Socket) -> Ipv4Socket {
        Ipv4Socket { socket }
    }

    /// The underlying generic socket.
    pub fn as_socket(&self) -> &Socket {
        &self.socket
    }

    /// Bind to a local endpoint.
    pub fn bind(&self, endpoint: &Ipv4Endpoint) -> io::Result<()> {
        self.socket.bind_raw(&SockAddr::from_ipv4_endpoint(endpoint))
    }

    /// Bind to the wildcard address on `port`.
    pub fn bind_port(&self, port: u16) -> io::Result<()> {
        self.bind(&Ipv4Endpoint::any(port))
    }

    /// Connect to a remote endpoint within `timeout`; `Ok(false)`
    /// means the timeout elapsed.
    pub fn connect(&self, endpoint: &Ipv4Endpoint, timeout: Timeout) -> io::Result<bool> {
        self.socket
            .connect_raw(&SockAddr::from_ipv4_endpoint(endpoint), timeout)
    }

    /// Accept one connection within `timeout`, yielding the connected
    /// socket and the peer endpoint.
    pub fn accept(&self, timeout: Timeout) -> io::Result<Option<(Ipv4Socket, Ipv4Endpoint)>> {
        match self.socket.accept_raw(timeout)? {
            None => Ok(None),
            Some((socket, peer)) => {
                let endpoint = peer
                    .to_ipv4_endpoint()
                    .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
                Ok(Some((Ipv4Socket::from_socket(socket), endpoint)))
            }
        }
    }

    /// Send one datagram to `endpoint`.
    pub fn send_to(&self, endpoint: &Ipv4Endpoint, data: &[u8], flags: i32) -> io::Result<usize> {
        self.socket
            .send_to_raw(&SockAddr::from_ipv4_endpoint(endpoint), data, flags)
    }

    /// Receive one datagram and the endpoint it came from.
    pub fn receive_from(
        &self,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, Ipv4Endpoint)> {
        let (count, peer) = self.socket.receive_from_raw(buffer, flags)?;
        Ok((count, peer.to_ipv4_endpoint().unwrap_or_default()))
    }

    /// The endpoint the socket is bound to.
    pub fn local_endpoint(&self) -> io::Result<Ipv4Endpoint> {
        self.socket
            .local_address_raw()?
            .to_ipv4_endpoint()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }

    /// The endpoint of the connected peer.
    pub fn remote_endpoint(&self) -> io::Result<Ipv4Endpoint> {
        self.socket
            .remote_address_raw()?
            .to_ipv4_endpoint()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }
}

impl Deref for Ipv4Socket {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        &self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockSocketApi;

    #[test]
    fn construction_opens_the_socket() {
        let api = Arc::new(MockSocketApi::new());
        let socket = Ipv4Socket::new(Arc::clone(&api) as _, SocketType::Stream).unwrap();
        assert!(socket.is_open());
        assert_eq!(api.calls().open, 1);
    }

    #[test]
    fn bind_passes_the_endpoint_image() {
        let api = Arc::new(MockSocketApi::new());
        let expected = SockAddr::from_ipv4_endpoint(&"127.0.0.1:22222".parse().unwrap());
        api.on_bind(move |_, address: &SockAddr| {
            assert_eq!(*address, expected);
            Ok(())
        });
        let socket = Ipv4Socket::new(Arc::clone(&api) as _, SocketType::Stream).unwrap();
        socket.bind(&"127.0.0.1:22222".parse().unwrap()).unwrap();
        assert_eq!(api.calls().bind, 1);
    }

    #[test]
    fn accept_fills_the_peer_endpoint() {
        let api = Arc::new(MockSocketApi::new());
        let peer: Ipv4Endpoint = "10.0.0.1:4321".parse().unwrap();
        api.on_accept(move |_| Ok((7777, SockAddr::from_ipv4_endpoint(&peer))));
        let socket = Ipv4Socket::new(Arc::clone(&api) as _, SocketType::Stream).unwrap();

        let (client, endpoint) = socket.accept(Timeout::Infinite).unwrap().unwrap();
        assert_eq!(client.handle(), 7777);
        assert_eq!(endpoint, peer);
    }
}
