//! The IPv6-typed socket.

use std::{io, ops::Deref, sync::Arc};

use crate::{
    api::SocketApi,
    defs::{SocketFamily, SocketProtocol, SocketType, Timeout},
    endpoint::Ipv6Endpoint,
    sockaddr::SockAddr,
    socket::Socket,
};

/// A socket restricted to the IPv6 family, speaking endpoints —
/// including flow information and scope identifier — instead of raw
/// addresses.
#[derive(Debug)]
pub struct Ipv6Socket {
    socket: Socket,
}

impl Ipv6Socket {
    /// Open an IPv6 socket of the given type.
    pub fn new(api: Arc<dyn SocketApi>, socket_type: SocketType) -> io::Result<Ipv6Socket> {
        Self::with_protocol(api, socket_type, SocketProtocol::Ip)
    }

    /// Open an IPv6 socket of the given type and protocol.
    pub fn with_protocol(
        api: Arc<dyn SocketApi>,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<Ipv6Socket> {
        let socket = Socket::with_protocol(api, SocketFamily::InternetV6, socket_type, protocol);
        socket.open()?;
        Ok(Ipv6Socket { socket })
    }

    pub(crate) fn from_socket(socket: Socket) -> Ipv6Socket {
        Ipv6Socket { socket }
    }

    /// The underlying generic socket.
    pub fn as_socket(&self) -> &Socket {
        &self.socket
    }

    /// Bind to a local endpoint.
    pub fn bind(&self, endpoint: &Ipv6Endpoint) -> io::Result<()> {
        self.socket.bind_raw(&SockAddr::from_ipv6_endpoint(endpoint))
    }

    /// Bind to the wildcard address on `port`.
    pub fn bind_port(&self, port: u16) -> io::Result<()> {
        self.bind(&Ipv6Endpoint::any(port))
    }

    /// Connect to a remote endpoint within `timeout`; `Ok(false)`
    /// means the timeout elapsed.
    pub fn connect(&self, endpoint: &Ipv6Endpoint, timeout: Timeout) -> io::Result<bool> {
        self.socket
            .connect_raw(&SockAddr::from_ipv6_endpoint(endpoint), timeout)
    }

    /// Accept one connection within `timeout`, yielding the connected
    /// socket and the peer endpoint.
    pub fn accept(&self, timeout: Timeout) -> io::Result<Option<(Ipv6Socket, Ipv6Endpoint)>> {
        match self.socket.accept_raw(timeout)? {
            None => Ok(None),
            Some((socket, peer)) => {
                let endpoint = peer
                    .to_ipv6_endpoint()
                    .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
                Ok(Some((Ipv6Socket::from_socket(socket), endpoint)))
            }
        }
    }

    /// Send one datagram to `endpoint`.
    pub fn send_to(&self, endpoint: &Ipv6Endpoint, data: &[u8], flags: i32) -> io::Result<usize> {
        self.socket
            .send_to_raw(&SockAddr::from_ipv6_endpoint(endpoint), data, flags)
    }

    /// Receive one datagram and the endpoint it came from.
    pub fn receive_from(
        &self,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, Ipv6Endpoint)> {
        let (count, peer) = self.socket.receive_from_raw(buffer, flags)?;
        Ok((count, peer.to_ipv6_endpoint().unwrap_or_default()))
    }

    /// The endpoint the socket is bound to.
    pub fn local_endpoint(&self) -> io::Result<Ipv6Endpoint> {
        self.socket
            .local_address_raw()?
            .to_ipv6_endpoint()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }

    /// The endpoint of the connected peer.
    pub fn remote_endpoint(&self) -> io::Result<Ipv6Endpoint> {
        self.socket
            .remote_address_raw()?
            .to_ipv6_endpoint()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }
}

impl Deref for Ipv6Socket {
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
    fn bind_carries_flow_info_and_scope() {
        let api = Arc::new(MockSocketApi::new());
        let endpoint =
            Ipv6Endpoint::with_flow_and_scope("fe80::1".parse().unwrap(), 443, 0xABCD, 2);
        let expected = SockAddr::from_ipv6_endpoint(&endpoint);
        api.on_bind(move |_, address: &SockAddr| {
            assert_eq!(*address, expected);
            Ok(())
        });
        let socket = Ipv6Socket::new(Arc::clone(&api) as _, SocketType::Stream).unwrap();
        socket.bind(&endpoint).unwrap();
        assert_eq!(api.calls().bind, 1);
    }

    #[test]
    fn accept_fills_the_peer_endpoint() {
        let api = Arc::new(MockSocketApi::new());
        let peer = Ipv6Endpoint::new("::1".parse().unwrap(), 9999);
        api.on_accept(move |_| Ok((4242, SockAddr::from_ipv6_endpoint(&peer))));
        let socket = Ipv6Socket::new(Arc::clone(&api) as _, SocketType::Stream).unwrap();

        let (client, endpoint) = socket.accept(Timeout::Infinite).unwrap().unwrap();
        assert_eq!(client.handle(), 4242);
        assert_eq!(endpoint, peer);
    }
}
