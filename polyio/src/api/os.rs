//! The real socket API, on both OS socket dialects.

use std::io;

use super::SocketApi;
use crate::{
    defs::{SocketFamily, SocketHandle, SocketOption, SocketOptionLevel, SocketProtocol, SocketType},
    sockaddr::SockAddr,
};

/// The operating system's socket API.
///
/// Construction runs the process-wide Winsock startup exactly once on
/// Windows and is a no-op on POSIX.
#[derive(Debug, Default)]
pub struct OsSocketApi {
    _private: (),
}

impl OsSocketApi {
    /// Create the API front-end.
    pub fn new() -> OsSocketApi {
        #[cfg(windows)]
        windows_impl::ensure_winsock();
        OsSocketApi { _private: () }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {

use std::os::unix::io::RawFd;

fn fd(handle: SocketHandle) -> RawFd {
    handle as RawFd
}

impl SocketApi for OsSocketApi {
    fn open(
        &self,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<SocketHandle> {
        let raw = syscall!(socket(family.raw(), socket_type.raw(), protocol.raw()))?;
        Ok(SocketHandle::from(raw))
    }

    fn close(&self, handle: SocketHandle) -> io::Result<()> {
        syscall!(close(fd(handle)))?;
        Ok(())
    }

    fn set_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &[u8],
    ) -> io::Result<()> {
        syscall!(setsockopt(
            fd(handle),
            level.raw(),
            option.raw(),
            value.as_ptr().cast(),
            value.len() as libc::socklen_t,
        ))?;
        Ok(())
    }

    fn get_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &mut [u8],
    ) -> io::Result<usize> {
        let mut length = value.len() as libc::socklen_t;
        syscall!(getsockopt(
            fd(handle),
            level.raw(),
            option.raw(),
            value.as_mut_ptr().cast(),
            &mut length,
        ))?;
        Ok(length as usize)
    }

    fn set_blocking_mode(&self, handle: SocketHandle, blocking: bool) -> io::Result<()> {
        let flags = syscall!(fcntl(fd(handle), libc::F_GETFL))?;
        let flags = if blocking {
            flags & !libc::O_NONBLOCK
        } else {
            flags | libc::O_NONBLOCK
        };
        syscall!(fcntl(fd(handle), libc::F_SETFL, flags))?;
        Ok(())
    }

    fn get_blocking_mode(&self, handle: SocketHandle) -> io::Result<bool> {
        let flags = syscall!(fcntl(fd(handle), libc::F_GETFL))?;
        Ok(flags & libc::O_NONBLOCK == 0)
    }

    fn bind(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        syscall!(bind(
            fd(handle),
            address.as_ptr() as *const libc::sockaddr,
            address.len() as libc::socklen_t,
        ))?;
        Ok(())
    }

    fn connect(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        syscall!(connect(
            fd(handle),
            address.as_ptr() as *const libc::sockaddr,
            address.len() as libc::socklen_t,
        ))?;
        Ok(())
    }

    fn listen(&self, handle: SocketHandle, backlog: i32) -> io::Result<()> {
        syscall!(listen(fd(handle), backlog))?;
        Ok(())
    }

    fn accept(&self, handle: SocketHandle) -> io::Result<(SocketHandle, SockAddr)> {
        let mut peer = SockAddr::zeroed();
        let mut length = peer.capacity() as libc::socklen_t;
        let raw = syscall!(accept(
            fd(handle),
            peer.as_mut_ptr() as *mut libc::sockaddr,
            &mut length,
        ))?;
        peer.set_len(length as usize);
        Ok((SocketHandle::from(raw), peer))
    }

    fn local_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        let mut address = SockAddr::zeroed();
        let mut length = address.capacity() as libc::socklen_t;
        syscall!(getsockname(
            fd(handle),
            address.as_mut_ptr() as *mut libc::sockaddr,
            &mut length,
        ))?;
        address.set_len(length as usize);
        Ok(address)
    }

    fn remote_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        let mut address = SockAddr::zeroed();
        let mut length = address.capacity() as libc::socklen_t;
        syscall!(getpeername(
            fd(handle),
            address.as_mut_ptr() as *mut libc::sockaddr,
            &mut length,
        ))?;
        address.set_len(length as usize);
        Ok(address)
    }

    fn receive(&self, handle: SocketHandle, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        let count = syscall!(recv(
            fd(handle),
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            flags,
        ))?;
        Ok(count as usize)
    }

    fn send(&self, handle: SocketHandle, data: &[u8], flags: i32) -> io::Result<usize> {
        let count = syscall!(send(
            fd(handle),
            data.as_ptr().cast(),
            data.len(),
            flags | no_sigpipe_flag(),
        ))?;
        Ok(count as usize)
    }

    fn receive_from(
        &self,
        handle: SocketHandle,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, SockAddr)> {
        let mut peer = SockAddr::zeroed();
        let mut length = peer.capacity() as libc::socklen_t;
        let count = syscall!(recvfrom(
            fd(handle),
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            flags,
            peer.as_mut_ptr() as *mut libc::sockaddr,
            &mut length,
        ))?;
        peer.set_len(length as usize);
        Ok((count as usize, peer))
    }

    fn send_to(
        &self,
        handle: SocketHandle,
        data: &[u8],
        flags: i32,
        address: &SockAddr,
    ) -> io::Result<usize> {
        let count = syscall!(sendto(
            fd(handle),
            data.as_ptr().cast(),
            data.len(),
            flags | no_sigpipe_flag(),
            address.as_ptr() as *const libc::sockaddr,
            address.len() as libc::socklen_t,
        ))?;
        Ok(count as usize)
    }
}

// Keep a dead peer an error instead of a process signal.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn no_sigpipe_flag() -> i32 {
    libc::MSG_NOSIGNAL
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn no_sigpipe_flag() -> i32 {
    0
}

    } else {

mod windows_impl {
    use once_cell::sync::Lazy;
    use windows_sys::Win32::Networking::WinSock as ws;

    static WINSOCK: Lazy<i32> = Lazy::new(|| unsafe {
        let mut data: ws::WSADATA = std::mem::zeroed();
        ws::WSAStartup(0x0202, &mut data)
    });

    pub(super) fn ensure_winsock() {
        let result = *WINSOCK;
        if result != 0 {
            tracing::error!(target: "polyio::api", code = result, "WSAStartup failed");
        }
    }
}

use windows_sys::Win32::Networking::WinSock as ws;

fn sock(handle: SocketHandle) -> ws::SOCKET {
    handle as ws::SOCKET
}

fn wsa_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { ws::WSAGetLastError() })
}

impl SocketApi for OsSocketApi {
    fn open(
        &self,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<SocketHandle> {
        let raw = unsafe { ws::socket(family.raw(), socket_type.raw(), protocol.raw()) };
        if raw == ws::INVALID_SOCKET {
            return Err(wsa_error());
        }
        Ok(raw as SocketHandle)
    }

    fn close(&self, handle: SocketHandle) -> io::Result<()> {
        wsa_syscall!(closesocket(sock(handle)))?;
        Ok(())
    }

    fn set_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &[u8],
    ) -> io::Result<()> {
        wsa_syscall!(setsockopt(
            sock(handle),
            level.raw(),
            option.raw(),
            value.as_ptr(),
            value.len() as i32,
        ))?;
        Ok(())
    }

    fn get_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &mut [u8],
    ) -> io::Result<usize> {
        let mut length = value.len() as i32;
        wsa_syscall!(getsockopt(
            sock(handle),
            level.raw(),
            option.raw(),
            value.as_mut_ptr(),
            &mut length,
        ))?;
        Ok(length as usize)
    }

    fn set_blocking_mode(&self, handle: SocketHandle, blocking: bool) -> io::Result<()> {
        let mut mode: u32 = if blocking { 0 } else { 1 };
        wsa_syscall!(ioctlsocket(sock(handle), ws::FIONBIO, &mut mode))?;
        Ok(())
    }

    fn get_blocking_mode(&self, _handle: SocketHandle) -> io::Result<bool> {
        // Winsock has no FIONBIO getter; callers keep their own cache.
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "blocking mode is write-only on Windows",
        ))
    }

    fn bind(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        wsa_syscall!(bind(
            sock(handle),
            address.as_ptr() as *const ws::SOCKADDR,
            address.len() as i32,
        ))?;
        Ok(())
    }

    fn connect(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        wsa_syscall!(connect(
            sock(handle),
            address.as_ptr() as *const ws::SOCKADDR,
            address.len() as i32,
        ))?;
        Ok(())
    }

    fn listen(&self, handle: SocketHandle, backlog: i32) -> io::Result<()> {
        wsa_syscall!(listen(sock(handle), backlog))?;
        Ok(())
    }

    fn accept(&self, handle: SocketHandle) -> io::Result<(SocketHandle, SockAddr)> {
        let mut peer = SockAddr::zeroed();
        let mut length = peer.capacity() as i32;
        let raw = unsafe {
            ws::accept(
                sock(handle),
                peer.as_mut_ptr() as *mut ws::SOCKADDR,
                &mut length,
            )
        };
        if raw == ws::INVALID_SOCKET {
            return Err(wsa_error());
        }
        peer.set_len(length as usize);
        Ok((raw as SocketHandle, peer))
    }

    fn local_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        let mut address = SockAddr::zeroed();
        let mut length = address.capacity() as i32;
        wsa_syscall!(getsockname(
            sock(handle),
            address.as_mut_ptr() as *mut ws::SOCKADDR,
            &mut length,
        ))?;
        address.set_len(length as usize);
        Ok(address)
    }

    fn remote_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        let mut address = SockAddr::zeroed();
        let mut length = address.capacity() as i32;
        wsa_syscall!(getpeername(
            sock(handle),
            address.as_mut_ptr() as *mut ws::SOCKADDR,
            &mut length,
        ))?;
        address.set_len(length as usize);
        Ok(address)
    }

    fn receive(&self, handle: SocketHandle, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        let count = wsa_syscall!(recv(
            sock(handle),
            buffer.as_mut_ptr(),
            buffer.len() as i32,
            flags,
        ))?;
        Ok(count as usize)
    }

    fn send(&self, handle: SocketHandle, data: &[u8], flags: i32) -> io::Result<usize> {
        let count = wsa_syscall!(send(sock(handle), data.as_ptr(), data.len() as i32, flags))?;
        Ok(count as usize)
    }

    fn receive_from(
        &self,
        handle: SocketHandle,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, SockAddr)> {
        let mut peer = SockAddr::zeroed();
        let mut length = peer.capacity() as i32;
        let count = wsa_syscall!(recvfrom(
            sock(handle),
            buffer.as_mut_ptr(),
            buffer.len() as i32,
            flags,
            peer.as_mut_ptr() as *mut ws::SOCKADDR,
            &mut length,
        ))?;
        peer.set_len(length as usize);
        Ok((count as usize, peer))
    }

    fn send_to(
        &self,
        handle: SocketHandle,
        data: &[u8],
        flags: i32,
        address: &SockAddr,
    ) -> io::Result<usize> {
        let count = wsa_syscall!(sendto(
            sock(handle),
            data.as_ptr(),
            data.len() as i32,
            flags,
            address.as_ptr() as *const ws::SOCKADDR,
            address.len() as i32,
        ))?;
        Ok(count as usize)
    }
}

    }
}
