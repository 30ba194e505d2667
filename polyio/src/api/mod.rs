//! The socket capability interface.
//!
//! Every OS socket call the core performs goes through [`SocketApi`].
//! [`OsSocketApi`] is the real implementation; [`MockSocketApi`] is a
//! drop-in programmable fake for tests. Code above this boundary never
//! sees a raw `sockaddr` pointer or a platform socket type.

mod mock;
mod os;

use std::io;

pub use mock::{CallCounts, MockSocketApi};
pub use os::OsSocketApi;

use crate::{
    defs::{SocketFamily, SocketHandle, SocketOption, SocketOptionLevel, SocketProtocol, SocketType},
    sockaddr::SockAddr,
};

/// Everything the core needs from the OS socket layer.
///
/// Failures carry the platform error code and its textual rendering
/// through [`io::Error`]; `raw_os_error()` yields `errno` on POSIX and
/// the `WSAGetLastError` code on Windows.
pub trait SocketApi: Send + Sync {
    /// Create a socket. The returned handle is non-negative.
    fn open(
        &self,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<SocketHandle>;

    /// Close a socket handle.
    fn close(&self, handle: SocketHandle) -> io::Result<()>;

    /// Set a socket option from its raw byte image.
    fn set_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &[u8],
    ) -> io::Result<()>;

    /// Read a socket option into `value`; returns the number of bytes
    /// the kernel filled in.
    fn get_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &mut [u8],
    ) -> io::Result<usize>;

    /// Switch the handle between blocking and non-blocking mode.
    fn set_blocking_mode(&self, handle: SocketHandle, blocking: bool) -> io::Result<()>;

    /// Query the blocking mode. Windows has no kernel getter, so the
    /// OS implementation may fail there; wrappers must not depend on
    /// it.
    fn get_blocking_mode(&self, handle: SocketHandle) -> io::Result<bool>;

    /// Bind the socket to a local address.
    fn bind(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()>;

    /// Start connecting the socket to a remote address.
    fn connect(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()>;

    /// Mark the socket as accepting connections.
    fn listen(&self, handle: SocketHandle, backlog: i32) -> io::Result<()>;

    /// Accept one pending connection, yielding the connected handle
    /// and the peer address.
    fn accept(&self, handle: SocketHandle) -> io::Result<(SocketHandle, SockAddr)>;

    /// The address the socket is bound to.
    fn local_address(&self, handle: SocketHandle) -> io::Result<SockAddr>;

    /// The address of the connected peer.
    fn remote_address(&self, handle: SocketHandle) -> io::Result<SockAddr>;

    /// Receive bytes; zero means the peer performed an orderly close.
    fn receive(&self, handle: SocketHandle, buffer: &mut [u8], flags: i32) -> io::Result<usize>;

    /// Send bytes; returns how many were accepted by the kernel.
    fn send(&self, handle: SocketHandle, data: &[u8], flags: i32) -> io::Result<usize>;

    /// Receive one datagram and the address it came from.
    fn receive_from(
        &self,
        handle: SocketHandle,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, SockAddr)>;

    /// Send one datagram to the given address.
    fn send_to(
        &self,
        handle: SocketHandle,
        data: &[u8],
        flags: i32,
        address: &SockAddr,
    ) -> io::Result<usize>;
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        const ERR_WOULD_BLOCK: &[i32] = &[libc::EWOULDBLOCK, libc::EAGAIN];
        const ERR_CONNECT_PENDING: &[i32] =
            &[libc::EINPROGRESS, libc::EALREADY, libc::EWOULDBLOCK, libc::EAGAIN];
        const ERR_PEER_CLOSED: &[i32] = &[libc::EPIPE, libc::ECONNRESET];
        const ERR_CLOSED_UNDERNEATH: &[i32] = &[libc::EBADF];
    } else {
        use windows_sys::Win32::Networking::WinSock as ws;
        const ERR_WOULD_BLOCK: &[i32] = &[ws::WSAEWOULDBLOCK];
        const ERR_CONNECT_PENDING: &[i32] =
            &[ws::WSAEINPROGRESS, ws::WSAEALREADY, ws::WSAEWOULDBLOCK];
        const ERR_PEER_CLOSED: &[i32] = &[ws::WSAECONNRESET, ws::WSAECONNABORTED];
        const ERR_CLOSED_UNDERNEATH: &[i32] = &[ws::WSAEBADF, ws::WSAENOTSOCK];
    }
}

fn raw_matches(error: &io::Error, codes: &[i32]) -> bool {
    error.raw_os_error().is_some_and(|code| codes.contains(&code))
}

/// The operation would have blocked; retry later.
pub fn is_would_block(error: &io::Error) -> bool {
    raw_matches(error, ERR_WOULD_BLOCK)
}

/// A non-blocking connect is still in flight; wait for the handle to
/// become writable.
pub fn is_connect_pending(error: &io::Error) -> bool {
    raw_matches(error, ERR_CONNECT_PENDING)
}

/// The peer closed or reset the connection.
pub fn is_peer_closed(error: &io::Error) -> bool {
    raw_matches(error, ERR_PEER_CLOSED)
}

/// The handle was closed underneath the operation; the graceful
/// shutdown path.
pub fn is_closed_underneath(error: &io::Error) -> bool {
    raw_matches(error, ERR_CLOSED_UNDERNEATH)
}

/// The call was interrupted by a signal.
pub fn is_interrupted(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn classification_matches_errno() {
        let would_block = io::Error::from_raw_os_error(libc::EWOULDBLOCK);
        assert!(is_would_block(&would_block));
        assert!(is_connect_pending(&would_block));
        assert!(!is_peer_closed(&would_block));

        let in_progress = io::Error::from_raw_os_error(libc::EINPROGRESS);
        assert!(is_connect_pending(&in_progress));
        assert!(!is_would_block(&in_progress));

        let reset = io::Error::from_raw_os_error(libc::ECONNRESET);
        assert!(is_peer_closed(&reset));

        let bad_handle = io::Error::from_raw_os_error(libc::EBADF);
        assert!(is_closed_underneath(&bad_handle));

        let refused = io::Error::from_raw_os_error(libc::ECONNREFUSED);
        assert!(!is_would_block(&refused));
        assert!(!is_connect_pending(&refused));
        assert!(!is_peer_closed(&refused));
        assert!(!is_closed_underneath(&refused));
    }
}
