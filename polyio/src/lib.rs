#![doc = include_str!("../README.md")]
#![warn(missing_docs, unreachable_pub)]

#[macro_use]
mod macros;

pub mod addr;
pub mod api;
pub mod codec;
pub mod defs;
pub mod endian;
pub mod endpoint;
pub mod interfaces;
pub mod net;
pub mod observable;
pub mod server;
pub mod sockaddr;
pub mod socket;
pub mod worker;

pub use addr::{AddrParseError, AddressTuple, Ipv4Address, Ipv6Address, MacAddress, UnixPath};
pub use defs::{
    Linger, SocketFamily, SocketHandle, SocketOption, SocketOptionLevel, SocketProtocol,
    SocketType, Timeout, INVALID_SOCKET_HANDLE, TIME_WAIT_SLICE,
};
pub use endpoint::{Ipv4Endpoint, Ipv6Endpoint, ANY_PORT};
pub use sockaddr::SockAddr;
pub use socket::{Socket, SocketView};
