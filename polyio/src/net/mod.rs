//! Family-typed sockets and the TCP client.

mod ipv4;
mod ipv6;
mod tcp;
mod udp;

pub use ipv4::Ipv4Socket;
pub use ipv6::Ipv6Socket;
pub use tcp::{Ipv4TcpServerSocket, Ipv4TcpSocket, Ipv6TcpSocket, TcpClient};
pub use udp::{Ipv4UdpSocket, Ipv6UdpSocket};
