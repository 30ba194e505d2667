//! The generic socket: one owned OS handle under the capability
//! interface, with timed non-blocking connect and accept.

use std::{
    io,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use crate::{
    api::{self, SocketApi},
    defs::{
        Linger, SocketFamily, SocketHandle, SocketOption, SocketOptionLevel, SocketProtocol,
        SocketType, Timeout, INVALID_SOCKET_HANDLE, TIME_WAIT_SLICE,
    },
    sockaddr::SockAddr,
};

const TRACE_TARGET: &str = "polyio::socket";

/// A socket owning one OS handle.
///
/// The socket is move-only: ownership of the handle transfers with the
/// value and the handle is closed exactly once, on [`close`] or drop.
/// A second, non-owning reference to the handle can be created with
/// [`dup_non_owning`] when the legacy accept-chain pattern calls for
/// it; default sharing is deliberately unrepresentable.
///
/// The internal mutex serializes handle lifecycle mutations only
/// (open, close, the blocking-mode flips around a timed accept); no
/// operation suspends while holding it, and I/O takes no lock.
///
/// [`close`]: Socket::close
/// [`dup_non_owning`]: Socket::dup_non_owning
pub struct Socket {
    api: Arc<dyn SocketApi>,
    handle: AtomicI64,
    family: SocketFamily,
    socket_type: SocketType,
    protocol: SocketProtocol,
    lifecycle: Mutex<()>,
    // Winsock has no FIONBIO getter; remember what we last wrote.
    // Authoritative only while no other code touches the handle.
    #[cfg(windows)]
    blocking: std::sync::atomic::AtomicBool,
}

impl Socket {
    /// Create a closed socket with the declared family and type.
    pub fn new(api: Arc<dyn SocketApi>, family: SocketFamily, socket_type: SocketType) -> Socket {
        Self::with_protocol(api, family, socket_type, SocketProtocol::Ip)
    }

    /// Create a closed socket with an explicit protocol.
    pub fn with_protocol(
        api: Arc<dyn SocketApi>,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> Socket {
        Socket {
            api,
            handle: AtomicI64::new(INVALID_SOCKET_HANDLE),
            family,
            socket_type,
            protocol,
            lifecycle: Mutex::new(()),
            #[cfg(windows)]
            blocking: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub(crate) fn from_parts(
        api: Arc<dyn SocketApi>,
        handle: SocketHandle,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> Socket {
        let socket = Self::with_protocol(api, family, socket_type, protocol);
        socket.handle.store(handle, Ordering::Release);
        socket
    }

    /// The capability interface this socket runs on.
    pub fn api(&self) -> &Arc<dyn SocketApi> {
        &self.api
    }

    /// The current handle, or [`INVALID_SOCKET_HANDLE`].
    #[inline]
    pub fn handle(&self) -> SocketHandle {
        self.handle.load(Ordering::Acquire)
    }

    /// The declared address family.
    pub fn family(&self) -> SocketFamily {
        self.family
    }

    /// The declared socket type.
    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// The declared protocol.
    pub fn protocol(&self) -> SocketProtocol {
        self.protocol
    }

    /// Whether the socket currently owns an open handle.
    pub fn is_open(&self) -> bool {
        self.handle() != INVALID_SOCKET_HANDLE
    }

    /// Open the socket with its declared family, type and protocol.
    /// An already open handle is closed first.
    pub fn open(&self) -> io::Result<()> {
        self.close()?;
        let _guard = self.lifecycle.lock().unwrap();
        match self.api.open(self.family, self.socket_type, self.protocol) {
            Ok(handle) => {
                self.handle.store(handle, Ordering::Release);
                #[cfg(windows)]
                self.blocking.store(true, Ordering::Release);
                Ok(())
            }
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "socket() failed");
                Err(error)
            }
        }
    }

    /// Close the handle, if open. Further calls are no-ops.
    pub fn close(&self) -> io::Result<()> {
        let _guard = self.lifecycle.lock().unwrap();
        let handle = self.handle.swap(INVALID_SOCKET_HANDLE, Ordering::AcqRel);
        if handle != INVALID_SOCKET_HANDLE {
            if let Err(error) = self.api.close(handle) {
                tracing::error!(target: TRACE_TARGET, %error, "close() failed");
                return Err(error);
            }
        }
        Ok(())
    }

    /// A non-owning duplicate for the legacy accept-chain pattern.
    ///
    /// The view can perform I/O and read options but can never close
    /// the handle, so a double close is a type error instead of a
    /// runtime bug.
    pub fn dup_non_owning(&self) -> SocketView {
        SocketView {
            api: Arc::clone(&self.api),
            handle: self.handle(),
        }
    }

    // ---- options ----

    /// Set an option from its raw byte image.
    pub fn set_socket_option(
        &self,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &[u8],
    ) -> io::Result<()> {
        self.api
            .set_socket_option(self.handle(), level, option, value)
    }

    /// Read an option into `value`, returning the filled length.
    pub fn get_socket_option(
        &self,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &mut [u8],
    ) -> io::Result<usize> {
        self.api
            .get_socket_option(self.handle(), level, option, value)
    }

    /// Set a boolean option; booleans are int-sized 0/1 on the wire.
    pub fn set_option_bool(&self, option: SocketOption, value: bool) -> io::Result<()> {
        self.set_option_int(option, i32::from(value))
    }

    /// Read a boolean option.
    pub fn option_bool(&self, option: SocketOption) -> io::Result<bool> {
        Ok(self.option_int(option)? != 0)
    }

    /// Set an int-sized option.
    pub fn set_option_int(&self, option: SocketOption, value: i32) -> io::Result<()> {
        self.set_socket_option(SocketOptionLevel::Socket, option, &value.to_ne_bytes())
    }

    /// Read an int-sized option.
    pub fn option_int(&self, option: SocketOption) -> io::Result<i32> {
        let mut value = [0u8; 4];
        self.get_socket_option(SocketOptionLevel::Socket, option, &mut value)?;
        Ok(i32::from_ne_bytes(value))
    }

    /// Allow binding to an address in `TIME_WAIT`.
    pub fn set_reuse_address(&self, value: bool) -> io::Result<()> {
        self.set_option_bool(SocketOption::ReuseAddress, value)
    }

    /// Whether address reuse is enabled.
    pub fn reuse_address(&self) -> io::Result<bool> {
        self.option_bool(SocketOption::ReuseAddress)
    }

    /// Allow sending to broadcast addresses.
    pub fn set_broadcast(&self, value: bool) -> io::Result<()> {
        self.set_option_bool(SocketOption::Broadcast, value)
    }

    /// Whether broadcast sends are enabled.
    pub fn broadcast(&self) -> io::Result<bool> {
        self.option_bool(SocketOption::Broadcast)
    }

    /// Enable TCP keepalive probes.
    pub fn set_keepalive(&self, value: bool) -> io::Result<()> {
        self.set_option_bool(SocketOption::KeepAlive, value)
    }

    /// Whether keepalive probes are enabled.
    pub fn keepalive(&self) -> io::Result<bool> {
        self.option_bool(SocketOption::KeepAlive)
    }

    /// Set the close-linger behavior.
    pub fn set_linger(&self, value: Linger) -> io::Result<()> {
        self.set_socket_option(
            SocketOptionLevel::Socket,
            SocketOption::Linger,
            &linger_bytes(value),
        )
    }

    /// Read the close-linger behavior.
    pub fn linger(&self) -> io::Result<Linger> {
        let mut value = [0u8; LINGER_SIZE];
        self.get_socket_option(SocketOptionLevel::Socket, SocketOption::Linger, &mut value)?;
        Ok(linger_from_bytes(&value))
    }

    /// Bound how long a blocking receive may wait. Zero disables the
    /// bound.
    pub fn set_receive_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_socket_option(
            SocketOptionLevel::Socket,
            SocketOption::ReceiveTimeout,
            &timeval_bytes(timeout),
        )
    }

    /// The configured receive timeout.
    pub fn receive_timeout(&self) -> io::Result<Duration> {
        let mut value = [0u8; TIMEVAL_SIZE];
        self.get_socket_option(
            SocketOptionLevel::Socket,
            SocketOption::ReceiveTimeout,
            &mut value,
        )?;
        Ok(duration_from_timeval(&value))
    }

    /// Bound how long a blocking send may wait. Zero disables the
    /// bound.
    pub fn set_send_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_socket_option(
            SocketOptionLevel::Socket,
            SocketOption::SendTimeout,
            &timeval_bytes(timeout),
        )
    }

    /// The configured send timeout.
    pub fn send_timeout(&self) -> io::Result<Duration> {
        let mut value = [0u8; TIMEVAL_SIZE];
        self.get_socket_option(
            SocketOptionLevel::Socket,
            SocketOption::SendTimeout,
            &mut value,
        )?;
        Ok(duration_from_timeval(&value))
    }

    /// Switch between blocking and non-blocking mode.
    pub fn set_blocking_mode(&self, blocking: bool) -> io::Result<()> {
        self.api.set_blocking_mode(self.handle(), blocking)?;
        #[cfg(windows)]
        self.blocking.store(blocking, Ordering::Release);
        Ok(())
    }

    /// The current blocking mode. On Windows this answers from the
    /// cached last written value, since the kernel offers no getter.
    pub fn blocking_mode(&self) -> io::Result<bool> {
        #[cfg(windows)]
        {
            Ok(self.blocking.load(Ordering::Acquire))
        }
        #[cfg(not(windows))]
        {
            self.api.get_blocking_mode(self.handle())
        }
    }

    // ---- connection management ----

    /// Bind to a local address.
    pub fn bind_raw(&self, address: &SockAddr) -> io::Result<()> {
        if let Err(error) = self.api.bind(self.handle(), address) {
            tracing::error!(target: TRACE_TARGET, %error, "bind() failed");
            return Err(error);
        }
        Ok(())
    }

    /// Mark the socket as accepting connections.
    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        if let Err(error) = self.api.listen(self.handle(), backlog) {
            tracing::error!(target: TRACE_TARGET, %error, "listen() failed");
            return Err(error);
        }
        Ok(())
    }

    /// Connect to a remote address within `timeout`.
    ///
    /// Returns `Ok(false)` when the timeout elapsed or the peer hung
    /// up during the handshake; blocking mode is restored either way.
    pub fn connect_raw(&self, address: &SockAddr, timeout: Timeout) -> io::Result<bool> {
        self.set_blocking_mode(timeout.is_infinite())?;
        let result = match self.api.connect(self.handle(), address) {
            Ok(()) => Ok(true),
            Err(error) if api::is_connect_pending(&error) => self.wait_for_connect(timeout),
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "connect() failed");
                Err(error)
            }
        };
        self.restore_blocking_mode();
        result
    }

    /// Accept one connection within `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout elapsed, or when the handle
    /// was closed underneath the call (the graceful shutdown path).
    ///
    /// The wait loop holds no lock, so a concurrent [`close`] releases
    /// a blocked accept immediately instead of waiting out the budget.
    ///
    /// [`close`]: Socket::close
    pub fn accept_raw(&self, timeout: Timeout) -> io::Result<Option<(Socket, SockAddr)>> {
        {
            let _guard = self.lifecycle.lock().unwrap();
            self.set_blocking_mode(timeout.is_infinite())?;
        }
        let mut remaining = timeout.duration().unwrap_or_default();
        let result = loop {
            match self.api.accept(self.handle()) {
                Ok((handle, peer)) => {
                    tracing::trace!(target: TRACE_TARGET, handle, "accept() success");
                    let accepted = Socket::from_parts(
                        Arc::clone(&self.api),
                        handle,
                        self.family,
                        self.socket_type,
                        self.protocol,
                    );
                    break Ok(Some((accepted, peer)));
                }
                Err(error) if api::is_would_block(&error) && !remaining.is_zero() => {
                    let nap = TIME_WAIT_SLICE.min(remaining);
                    thread::sleep(nap);
                    remaining = remaining.saturating_sub(TIME_WAIT_SLICE);
                }
                Err(error) if api::is_closed_underneath(&error) => break Ok(None),
                Err(error) if api::is_would_block(&error) => break Ok(None),
                Err(error) => {
                    tracing::error!(target: TRACE_TARGET, %error, "accept() failed");
                    break Err(error);
                }
            }
        };
        {
            let _guard = self.lifecycle.lock().unwrap();
            self.restore_blocking_mode();
        }
        result
    }

    /// The address the socket is bound to.
    pub fn local_address_raw(&self) -> io::Result<SockAddr> {
        self.api.local_address(self.handle())
    }

    /// The address of the connected peer.
    pub fn remote_address_raw(&self) -> io::Result<SockAddr> {
        self.api.remote_address(self.handle())
    }

    // ---- I/O ----

    /// Receive up to `buffer.len()` bytes.
    ///
    /// Returns zero when the peer performed an orderly close — the
    /// local handle is closed as a side effect so state machines can
    /// exit — and also when the call was interrupted, would block, or
    /// found the handle closed underneath it.
    pub fn receive(&self, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        match self.api.receive(self.handle(), buffer, flags) {
            Ok(0) => {
                let _ = self.close();
                Ok(0)
            }
            Ok(count) => Ok(count),
            Err(error)
                if api::is_would_block(&error)
                    || api::is_interrupted(&error)
                    || api::is_closed_underneath(&error) =>
            {
                tracing::trace!(target: TRACE_TARGET, %error, "recv() returned no data");
                Ok(0)
            }
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "recv() failed");
                Err(error)
            }
        }
    }

    /// Receive up to `count` bytes appended to `buffer`.
    pub fn receive_buffer(
        &self,
        buffer: &mut Vec<u8>,
        count: usize,
        flags: i32,
    ) -> io::Result<usize> {
        let start = buffer.len();
        buffer.resize(start + count, 0);
        match self.receive(&mut buffer[start..], flags) {
            Ok(received) => {
                buffer.truncate(start + received);
                Ok(received)
            }
            Err(error) => {
                buffer.truncate(start);
                Err(error)
            }
        }
    }

    /// Receive exactly `count` bytes appended to `buffer`; `Ok(false)`
    /// when the stream ended first.
    pub fn receive_block(
        &self,
        buffer: &mut Vec<u8>,
        count: usize,
        flags: i32,
    ) -> io::Result<bool> {
        let mut remaining = count;
        while remaining > 0 {
            let received = self.receive_buffer(buffer, remaining, flags)?;
            if received == 0 {
                return Ok(false);
            }
            remaining -= received;
        }
        Ok(true)
    }

    /// Send the whole buffer, looping until nothing remains.
    ///
    /// `Ok(false)` means the peer closed or reset the connection; the
    /// caller drives its state machine to disconnected.
    pub fn send_all(&self, data: &[u8], flags: i32) -> io::Result<bool> {
        let mut offset = 0;
        while offset < data.len() {
            match self.api.send(self.handle(), &data[offset..], flags) {
                Ok(count) => offset += count,
                Err(error) if api::is_peer_closed(&error) => {
                    tracing::trace!(target: TRACE_TARGET, %error, "send() peer closed");
                    return Ok(false);
                }
                Err(error) => {
                    tracing::error!(target: TRACE_TARGET, %error, "send() failed");
                    return Err(error);
                }
            }
        }
        Ok(true)
    }

    /// Alias of [`send_all`] for buffer-shaped call sites.
    ///
    /// [`send_all`]: Socket::send_all
    pub fn send_buffer(&self, data: &[u8], flags: i32) -> io::Result<bool> {
        self.send_all(data, flags)
    }

    /// Send one datagram to `address`.
    pub fn send_to_raw(&self, address: &SockAddr, data: &[u8], flags: i32) -> io::Result<usize> {
        match self.api.send_to(self.handle(), data, flags, address) {
            Ok(count) => Ok(count),
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "sendto() failed");
                Err(error)
            }
        }
    }

    /// Receive one datagram and its origin. Retryable conditions
    /// surface as a zero-length read.
    pub fn receive_from_raw(
        &self,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, SockAddr)> {
        match self.api.receive_from(self.handle(), buffer, flags) {
            Ok(result) => Ok(result),
            Err(error) if api::is_would_block(&error) || api::is_interrupted(&error) => {
                tracing::trace!(target: TRACE_TARGET, %error, "recvfrom() returned no data");
                Ok((0, SockAddr::zeroed()))
            }
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "recvfrom() failed");
                Err(error)
            }
        }
    }

    fn restore_blocking_mode(&self) {
        if self.is_open() {
            if let Err(error) = self.set_blocking_mode(true) {
                tracing::debug!(
                    target: TRACE_TARGET,
                    %error,
                    "failed to restore blocking mode"
                );
            }
        }
    }

    #[cfg(unix)]
    fn wait_for_connect(&self, timeout: Timeout) -> io::Result<bool> {
        let mut descriptor = libc::pollfd {
            fd: self.handle() as libc::c_int,
            events: libc::POLLIN | libc::POLLOUT,
            revents: 0,
        };
        let wait = match timeout {
            Timeout::Infinite => -1,
            Timeout::Finite(duration) => duration.as_millis().min(i32::MAX as u128) as i32,
        };
        let ready = unsafe { libc::poll(&mut descriptor, 1, wait) };
        if ready == -1 {
            let error = io::Error::last_os_error();
            tracing::trace!(target: TRACE_TARGET, %error, "poll() failed");
            return Ok(false);
        }
        if ready == 0 {
            // Timed out; the caller keeps the handle.
            return Ok(false);
        }
        if descriptor.revents & libc::POLLHUP != 0 {
            return Ok(false);
        }
        Ok(true)
    }

    #[cfg(windows)]
    fn wait_for_connect(&self, timeout: Timeout) -> io::Result<bool> {
        use windows_sys::Win32::Networking::WinSock as ws;

        let handle = self.handle() as ws::SOCKET;
        let mut remaining = match timeout {
            Timeout::Infinite => Duration::MAX,
            Timeout::Finite(duration) => duration,
        };
        while !remaining.is_zero() {
            let slice = TIME_WAIT_SLICE.min(remaining);
            let interval = ws::TIMEVAL {
                tv_sec: 0,
                tv_usec: slice.as_micros() as i32,
            };
            let mut write_set = make_fd_set(handle);
            let mut except_set = make_fd_set(handle);
            let ready = unsafe {
                ws::select(
                    0,
                    std::ptr::null_mut(),
                    &mut write_set,
                    &mut except_set,
                    &interval,
                )
            };
            remaining = remaining.saturating_sub(TIME_WAIT_SLICE);
            if ready == ws::SOCKET_ERROR {
                let error = io::Error::last_os_error();
                tracing::error!(target: TRACE_TARGET, %error, "select() failed");
                return Err(error);
            }
            if fd_set_contains(&except_set, handle) {
                return Ok(false);
            }
            if fd_set_contains(&write_set, handle) {
                tracing::trace!(target: TRACE_TARGET, "connect() success");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(windows)]
fn make_fd_set(handle: windows_sys::Win32::Networking::WinSock::SOCKET)
    -> windows_sys::Win32::Networking::WinSock::FD_SET {
    let mut fd_array = [0; 64];
    fd_array[0] = handle;
    windows_sys::Win32::Networking::WinSock::FD_SET {
        fd_count: 1,
        fd_array,
    }
}

#[cfg(windows)]
fn fd_set_contains(
    set: &windows_sys::Win32::Networking::WinSock::FD_SET,
    handle: windows_sys::Win32::Networking::WinSock::SOCKET,
) -> bool {
    set.fd_array[..set.fd_count.min(64) as usize].contains(&handle)
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!(target: TRACE_TARGET, %error, "close on drop failed");
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("handle", &self.handle())
            .field("family", &self.family)
            .field("socket_type", &self.socket_type)
            .finish()
    }
}

/// A non-owning view of a socket handle, created by
/// [`Socket::dup_non_owning`].
///
/// Views can perform I/O but can never close the handle; they become
/// dangling once the owning socket closes.
pub struct SocketView {
    api: Arc<dyn SocketApi>,
    handle: SocketHandle,
}

impl SocketView {
    /// The viewed handle value.
    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    /// Receive up to `buffer.len()` bytes. Unlike the owning socket, a
    /// peer close does not touch the handle.
    pub fn receive(&self, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        self.api.receive(self.handle, buffer, flags)
    }

    /// Send the whole buffer; `Ok(false)` when the peer closed.
    pub fn send_all(&self, data: &[u8], flags: i32) -> io::Result<bool> {
        let mut offset = 0;
        while offset < data.len() {
            match self.api.send(self.handle, &data[offset..], flags) {
                Ok(count) => offset += count,
                Err(error) if api::is_peer_closed(&error) => return Ok(false),
                Err(error) => return Err(error),
            }
        }
        Ok(true)
    }

    /// The address the viewed socket is bound to.
    pub fn local_address_raw(&self) -> io::Result<SockAddr> {
        self.api.local_address(self.handle)
    }

    /// The address of the viewed socket's peer.
    pub fn remote_address_raw(&self) -> io::Result<SockAddr> {
        self.api.remote_address(self.handle)
    }
}

impl std::fmt::Debug for SocketView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketView")
            .field("handle", &self.handle)
            .finish()
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        const TIMEVAL_SIZE: usize = std::mem::size_of::<libc::timeval>();
        const LINGER_SIZE: usize = std::mem::size_of::<libc::linger>();

        fn timeval_bytes(duration: Duration) -> [u8; TIMEVAL_SIZE] {
            let value = libc::timeval {
                tv_sec: duration.as_secs() as libc::time_t,
                tv_usec: duration.subsec_micros() as libc::suseconds_t,
            };
            unsafe { std::mem::transmute(value) }
        }

        fn duration_from_timeval(bytes: &[u8; TIMEVAL_SIZE]) -> Duration {
            let value: libc::timeval = unsafe { std::mem::transmute(*bytes) };
            Duration::new(value.tv_sec.max(0) as u64, (value.tv_usec.max(0) as u32) * 1000)
        }

        fn linger_bytes(value: Linger) -> [u8; LINGER_SIZE] {
            let raw = libc::linger {
                l_onoff: i32::from(value.enabled),
                l_linger: i32::from(value.seconds),
            };
            unsafe { std::mem::transmute(raw) }
        }

        fn linger_from_bytes(bytes: &[u8; LINGER_SIZE]) -> Linger {
            let raw: libc::linger = unsafe { std::mem::transmute(*bytes) };
            Linger {
                enabled: raw.l_onoff != 0,
                seconds: raw.l_linger.clamp(0, i32::from(u16::MAX)) as u16,
            }
        }
    } else {
        use windows_sys::Win32::Networking::WinSock as ws;

        const TIMEVAL_SIZE: usize = std::mem::size_of::<ws::TIMEVAL>();
        const LINGER_SIZE: usize = std::mem::size_of::<ws::LINGER>();

        fn timeval_bytes(duration: Duration) -> [u8; TIMEVAL_SIZE] {
            let value = ws::TIMEVAL {
                tv_sec: duration.as_secs().min(i32::MAX as u64) as i32,
                tv_usec: duration.subsec_micros() as i32,
            };
            unsafe { std::mem::transmute(value) }
        }

        fn duration_from_timeval(bytes: &[u8; TIMEVAL_SIZE]) -> Duration {
            let value: ws::TIMEVAL = unsafe { std::mem::transmute(*bytes) };
            Duration::new(value.tv_sec.max(0) as u64, (value.tv_usec.max(0) as u32) * 1000)
        }

        fn linger_bytes(value: Linger) -> [u8; LINGER_SIZE] {
            let raw = ws::LINGER {
                l_onoff: u16::from(value.enabled),
                l_linger: value.seconds,
            };
            unsafe { std::mem::transmute(raw) }
        }

        fn linger_from_bytes(bytes: &[u8; LINGER_SIZE]) -> Linger {
            let raw: ws::LINGER = unsafe { std::mem::transmute(*bytes) };
            Linger {
                enabled: raw.l_onoff != 0,
                seconds: raw.l_linger,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockSocketApi;

    fn mock_socket(api: &Arc<MockSocketApi>) -> Socket {
        Socket::with_protocol(
            Arc::clone(api) as Arc<dyn SocketApi>,
            SocketFamily::InternetV4,
            SocketType::Stream,
            SocketProtocol::Tcp,
        )
    }

    #[test]
    fn opens_and_closes_exactly_once() {
        let api = Arc::new(MockSocketApi::new());
        let socket = mock_socket(&api);
        assert!(!socket.is_open());

        socket.open().unwrap();
        assert!(socket.is_open());
        socket.close().unwrap();
        socket.close().unwrap();
        drop(socket);

        let calls = api.calls();
        assert_eq!(calls.open, 1);
        assert_eq!(calls.close, 1);
    }

    #[test]
    fn drop_closes_an_open_handle() {
        let api = Arc::new(MockSocketApi::new());
        {
            let socket = mock_socket(&api);
            socket.open().unwrap();
        }
        let calls = api.calls();
        assert_eq!(calls.open, 1);
        assert_eq!(calls.close, 1);
    }

    #[test]
    fn reopen_closes_the_previous_handle() {
        let api = Arc::new(MockSocketApi::new());
        let socket = mock_socket(&api);
        socket.open().unwrap();
        socket.open().unwrap();
        drop(socket);

        let calls = api.calls();
        assert_eq!(calls.open, 2);
        assert_eq!(calls.close, 2);
    }

    #[test]
    fn receive_zero_closes_the_handle() {
        let api = Arc::new(MockSocketApi::new());
        let socket = mock_socket(&api);
        socket.open().unwrap();

        let mut buffer = [0u8; 16];
        // Default mock receive reports end of stream.
        assert_eq!(socket.receive(&mut buffer, 0).unwrap(), 0);
        assert!(!socket.is_open());
        assert_eq!(api.calls().close, 1);
    }

    #[test]
    fn send_all_loops_over_partial_writes() {
        let api = Arc::new(MockSocketApi::new());
        api.on_send(|_, data: &[u8], _| Ok(data.len().min(3)));
        let socket = mock_socket(&api);
        socket.open().unwrap();

        assert!(socket.send_all(b"HelloWorld", 0).unwrap());
        // 10 bytes in chunks of 3 takes four sends.
        assert_eq!(api.calls().send, 4);
    }

    #[test]
    fn send_all_reports_peer_close_as_false() {
        let api = Arc::new(MockSocketApi::new());
        #[cfg(unix)]
        let code = libc::EPIPE;
        #[cfg(windows)]
        let code = ws::WSAECONNRESET;
        api.on_send(move |_, _: &[u8], _| Err(io::Error::from_raw_os_error(code)));
        let socket = mock_socket(&api);
        socket.open().unwrap();

        assert!(!socket.send_all(b"data", 0).unwrap());
    }

    #[test]
    fn accept_times_out_against_a_quiet_listener() {
        let api = Arc::new(MockSocketApi::new());
        let socket = mock_socket(&api);
        socket.open().unwrap();

        let started = std::time::Instant::now();
        let accepted = socket
            .accept_raw(Timeout::Finite(Duration::from_millis(50)))
            .unwrap();
        assert!(accepted.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "returned after {elapsed:?}");
        // Several 10 ms waits, not one big sleep.
        assert!(api.calls().accept >= 3);
    }

    #[test]
    fn close_releases_a_blocked_accept_without_waiting_out_the_budget() {
        let api = Arc::new(MockSocketApi::new());
        #[cfg(unix)]
        let bad_handle = libc::EBADF;
        #[cfg(windows)]
        let bad_handle = ws::WSAENOTSOCK;
        #[cfg(unix)]
        let would_block = libc::EWOULDBLOCK;
        #[cfg(windows)]
        let would_block = ws::WSAEWOULDBLOCK;
        // Report "would block" while the handle is live, "closed
        // underneath" afterwards, like a kernel whose listen socket
        // went away mid-accept.
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let closed_in_accept = Arc::clone(&closed);
        api.on_accept(move |_| {
            if closed_in_accept.load(Ordering::SeqCst) {
                Err(io::Error::from_raw_os_error(bad_handle))
            } else {
                Err(io::Error::from_raw_os_error(would_block))
            }
        });
        let closed_in_close = Arc::clone(&closed);
        api.on_close(move |_| {
            closed_in_close.store(true, Ordering::SeqCst);
            Ok(())
        });

        let socket = Arc::new(mock_socket(&api));
        socket.open().unwrap();

        let accepting = Arc::clone(&socket);
        let started = std::time::Instant::now();
        let worker = std::thread::spawn(move || {
            accepting.accept_raw(Timeout::Finite(Duration::from_secs(10)))
        });
        std::thread::sleep(Duration::from_millis(30));
        // close() must not block behind the polling loop and must end
        // the accept well before its ten second budget.
        socket.close().unwrap();
        let accepted = worker.join().unwrap().unwrap();
        assert!(accepted.is_none());
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "accept kept running after close"
        );
    }

    #[test]
    fn accept_breaks_out_when_handle_closed_underneath() {
        let api = Arc::new(MockSocketApi::new());
        #[cfg(unix)]
        let code = libc::EBADF;
        #[cfg(windows)]
        let code = ws::WSAENOTSOCK;
        api.on_accept(move |_| Err(io::Error::from_raw_os_error(code)));
        let socket = mock_socket(&api);
        socket.open().unwrap();

        let accepted = socket
            .accept_raw(Timeout::Finite(Duration::from_secs(5)))
            .unwrap();
        assert!(accepted.is_none());
        // One attempt; no retry loop against a dead handle.
        assert_eq!(api.calls().accept, 1);
    }

    #[test]
    fn connect_surfaces_fatal_errors() {
        let api = Arc::new(MockSocketApi::new());
        #[cfg(unix)]
        let code = libc::ECONNREFUSED;
        #[cfg(windows)]
        let code = ws::WSAECONNREFUSED;
        api.on_connect(move |_, _: &SockAddr| Err(io::Error::from_raw_os_error(code)));
        let socket = mock_socket(&api);
        socket.open().unwrap();

        let address = SockAddr::from_ipv4_endpoint(&"127.0.0.1:22222".parse().unwrap());
        let error = socket
            .connect_raw(&address, Timeout::Finite(Duration::from_millis(100)))
            .unwrap_err();
        assert_eq!(error.raw_os_error(), Some(code));
    }

    #[test]
    fn view_cannot_close_and_does_not_double_close() {
        let api = Arc::new(MockSocketApi::new());
        let socket = mock_socket(&api);
        socket.open().unwrap();

        let view = socket.dup_non_owning();
        assert_eq!(view.handle(), socket.handle());
        drop(view);
        assert!(socket.is_open());
        drop(socket);
        assert_eq!(api.calls().close, 1);
    }

    #[test]
    fn timeval_round_trip() {
        let duration = Duration::new(2, 500_000_000);
        let bytes = timeval_bytes(duration);
        assert_eq!(duration_from_timeval(&bytes), duration);
    }

    #[test]
    fn linger_round_trip() {
        let value = Linger {
            enabled: true,
            seconds: 7,
        };
        let bytes = linger_bytes(value);
        assert_eq!(linger_from_bytes(&bytes), value);
    }
}
