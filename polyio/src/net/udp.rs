//! UDP-typed sockets.

use std::{io, ops::Deref, sync::Arc};

use super::{ipv4::Ipv4Socket, ipv6::Ipv6Socket};
use crate::{
    api::SocketApi,
    defs::{SocketProtocol, SocketType},
};

/// An IPv4 datagram socket. Construction opens the handle.
#[derive(Debug)]
pub struct Ipv4UdpSocket {
    inner: Ipv4Socket,
}

impl Ipv4UdpSocket {
    /// Open an IPv4 UDP socket.
    pub fn new(api: Arc<dyn SocketApi>) -> io::Result<Ipv4UdpSocket> {
        Ok(Ipv4UdpSocket {
            inner: Ipv4Socket::with_protocol(api, SocketType::Datagram, SocketProtocol::Udp)?,
        })
    }
}

impl Deref for Ipv4UdpSocket {
    type Target = Ipv4Socket;

    fn deref(&self) -> &Ipv4Socket {
        &self.inner
    }
}

/// An IPv6 datagram socket. Construction opens the handle.
#[derive(Debug)]
pub struct Ipv6UdpSocket {
    inner: Ipv6Socket,
}

impl Ipv6UdpSocket {
    /// Open an IPv6 UDP socket.
    pub fn new(api: Arc<dyn SocketApi>) -> io::Result<Ipv6UdpSocket> {
        Ok(Ipv6UdpSocket {
            inner: Ipv6Socket::with_protocol(api, SocketType::Datagram, SocketProtocol::Udp)?,
        })
    }
}

impl Deref for Ipv6UdpSocket {
    type Target = Ipv6Socket;

    fn deref(&self) -> &Ipv6Socket {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::MockSocketApi, defs::SocketFamily};

    #[test]
    fn udp_sockets_open_in_datagram_mode() {
        let api = Arc::new(MockSocketApi::new());
        api.on_open(|family, socket_type, protocol| {
            assert_eq!(socket_type, SocketType::Datagram);
            assert_eq!(protocol, SocketProtocol::Udp);
            assert!(matches!(
                family,
                SocketFamily::InternetV4 | SocketFamily::InternetV6
            ));
            Ok(99)
        });
        let v4 = Ipv4UdpSocket::new(Arc::clone(&api) as _).unwrap();
        let v6 = Ipv6UdpSocket::new(Arc::clone(&api) as _).unwrap();
        assert!(v4.is_open());
        assert!(v6.is_open());
        assert_eq!(api.calls().open, 2);
    }
}
