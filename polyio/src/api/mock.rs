//! A drop-in programmable socket API for tests.

use std::{
    io,
    sync::{
        atomic::{AtomicI64, Ordering},
        Mutex,
    },
};

use super::SocketApi;
use crate::{
    defs::{SocketFamily, SocketHandle, SocketOption, SocketOptionLevel, SocketProtocol, SocketType},
    endpoint::Ipv4Endpoint,
    sockaddr::SockAddr,
};

type OpenFn =
    dyn FnMut(SocketFamily, SocketType, SocketProtocol) -> io::Result<SocketHandle> + Send;
type CloseFn = dyn FnMut(SocketHandle) -> io::Result<()> + Send;
type SetOptionFn =
    dyn FnMut(SocketHandle, SocketOptionLevel, SocketOption, &[u8]) -> io::Result<()> + Send;
type GetOptionFn =
    dyn FnMut(SocketHandle, SocketOptionLevel, SocketOption, &mut [u8]) -> io::Result<usize> + Send;
type SetBlockingFn = dyn FnMut(SocketHandle, bool) -> io::Result<()> + Send;
type GetBlockingFn = dyn FnMut(SocketHandle) -> io::Result<bool> + Send;
type AddressArgFn = dyn FnMut(SocketHandle, &SockAddr) -> io::Result<()> + Send;
type ListenFn = dyn FnMut(SocketHandle, i32) -> io::Result<()> + Send;
type AcceptFn = dyn FnMut(SocketHandle) -> io::Result<(SocketHandle, SockAddr)> + Send;
type AddressResultFn = dyn FnMut(SocketHandle) -> io::Result<SockAddr> + Send;
type ReceiveFn = dyn FnMut(SocketHandle, &mut [u8], i32) -> io::Result<usize> + Send;
type SendFn = dyn FnMut(SocketHandle, &[u8], i32) -> io::Result<usize> + Send;
type ReceiveFromFn =
    dyn FnMut(SocketHandle, &mut [u8], i32) -> io::Result<(usize, SockAddr)> + Send;
type SendToFn = dyn FnMut(SocketHandle, &[u8], i32, &SockAddr) -> io::Result<usize> + Send;

/// How often each operation of a [`MockSocketApi`] has been invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CallCounts {
    pub open: usize,
    pub close: usize,
    pub set_socket_option: usize,
    pub get_socket_option: usize,
    pub set_blocking_mode: usize,
    pub get_blocking_mode: usize,
    pub bind: usize,
    pub connect: usize,
    pub listen: usize,
    pub accept: usize,
    pub local_address: usize,
    pub remote_address: usize,
    pub receive: usize,
    pub send: usize,
    pub receive_from: usize,
    pub send_to: usize,
}

/// A [`SocketApi`] where every operation is individually programmable:
/// return value, out-parameter content and side effects all come from
/// the installed handler.
///
/// Unprogrammed operations fall back to benign defaults (opens hand
/// out fresh handles, closes succeed, accepts report "would block",
/// receives report end of stream, sends accept everything), so the
/// mock is usable as-is wherever a real API would be.
///
/// Each operation keeps its own handler slot under its own lock, so a
/// handler that blocks — simulating a blocking receive, say — does not
/// wedge unrelated operations such as the close that is meant to
/// release it.
#[derive(Default)]
pub struct MockSocketApi {
    calls: Mutex<CallCounts>,
    next_handle: AtomicI64,
    open: Mutex<Option<Box<OpenFn>>>,
    close: Mutex<Option<Box<CloseFn>>>,
    set_socket_option: Mutex<Option<Box<SetOptionFn>>>,
    get_socket_option: Mutex<Option<Box<GetOptionFn>>>,
    set_blocking_mode: Mutex<Option<Box<SetBlockingFn>>>,
    get_blocking_mode: Mutex<Option<Box<GetBlockingFn>>>,
    bind: Mutex<Option<Box<AddressArgFn>>>,
    connect: Mutex<Option<Box<AddressArgFn>>>,
    listen: Mutex<Option<Box<ListenFn>>>,
    accept: Mutex<Option<Box<AcceptFn>>>,
    local_address: Mutex<Option<Box<AddressResultFn>>>,
    remote_address: Mutex<Option<Box<AddressResultFn>>>,
    receive: Mutex<Option<Box<ReceiveFn>>>,
    send: Mutex<Option<Box<SendFn>>>,
    receive_from: Mutex<Option<Box<ReceiveFromFn>>>,
    send_to: Mutex<Option<Box<SendToFn>>>,
}

impl MockSocketApi {
    /// Create a mock with default behavior everywhere.
    pub fn new() -> MockSocketApi {
        MockSocketApi {
            next_handle: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    /// A snapshot of the per-operation invocation counters.
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock().unwrap()
    }

    fn count(&self, bump: impl FnOnce(&mut CallCounts)) {
        bump(&mut self.calls.lock().unwrap());
    }

    /// Program the `open` operation.
    pub fn on_open<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketFamily, SocketType, SocketProtocol) -> io::Result<SocketHandle>
            + Send
            + 'static,
    {
        *self.open.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `close` operation.
    pub fn on_close<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle) -> io::Result<()> + Send + 'static,
    {
        *self.close.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `set_socket_option` operation.
    pub fn on_set_socket_option<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, SocketOptionLevel, SocketOption, &[u8]) -> io::Result<()>
            + Send
            + 'static,
    {
        *self.set_socket_option.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `get_socket_option` operation.
    pub fn on_get_socket_option<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, SocketOptionLevel, SocketOption, &mut [u8]) -> io::Result<usize>
            + Send
            + 'static,
    {
        *self.get_socket_option.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `set_blocking_mode` operation.
    pub fn on_set_blocking_mode<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, bool) -> io::Result<()> + Send + 'static,
    {
        *self.set_blocking_mode.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `get_blocking_mode` operation.
    pub fn on_get_blocking_mode<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle) -> io::Result<bool> + Send + 'static,
    {
        *self.get_blocking_mode.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `bind` operation.
    pub fn on_bind<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &SockAddr) -> io::Result<()> + Send + 'static,
    {
        *self.bind.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `connect` operation.
    pub fn on_connect<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &SockAddr) -> io::Result<()> + Send + 'static,
    {
        *self.connect.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `listen` operation.
    pub fn on_listen<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, i32) -> io::Result<()> + Send + 'static,
    {
        *self.listen.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `accept` operation.
    pub fn on_accept<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle) -> io::Result<(SocketHandle, SockAddr)> + Send + 'static,
    {
        *self.accept.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `local_address` operation.
    pub fn on_local_address<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle) -> io::Result<SockAddr> + Send + 'static,
    {
        *self.local_address.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `remote_address` operation.
    pub fn on_remote_address<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle) -> io::Result<SockAddr> + Send + 'static,
    {
        *self.remote_address.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `receive` operation.
    pub fn on_receive<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &mut [u8], i32) -> io::Result<usize> + Send + 'static,
    {
        *self.receive.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `send` operation.
    pub fn on_send<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &[u8], i32) -> io::Result<usize> + Send + 'static,
    {
        *self.send.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `receive_from` operation.
    pub fn on_receive_from<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &mut [u8], i32) -> io::Result<(usize, SockAddr)> + Send + 'static,
    {
        *self.receive_from.lock().unwrap() = Some(Box::new(handler));
        self
    }

    /// Program the `send_to` operation.
    pub fn on_send_to<F>(&self, handler: F) -> &Self
    where
        F: FnMut(SocketHandle, &[u8], i32, &SockAddr) -> io::Result<usize> + Send + 'static,
    {
        *self.send_to.lock().unwrap() = Some(Box::new(handler));
        self
    }
}

#[cfg(unix)]
fn would_block() -> io::Error {
    io::Error::from_raw_os_error(libc::EWOULDBLOCK)
}

#[cfg(windows)]
fn would_block() -> io::Error {
    io::Error::from_raw_os_error(windows_sys::Win32::Networking::WinSock::WSAEWOULDBLOCK)
}

fn any_address() -> SockAddr {
    SockAddr::from_ipv4_endpoint(&Ipv4Endpoint::any(0))
}

impl SocketApi for MockSocketApi {
    fn open(
        &self,
        family: SocketFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> io::Result<SocketHandle> {
        self.count(|calls| calls.open += 1);
        match self.open.lock().unwrap().as_mut() {
            Some(handler) => handler(family, socket_type, protocol),
            None => Ok(self.next_handle.fetch_add(1, Ordering::SeqCst)),
        }
    }

    fn close(&self, handle: SocketHandle) -> io::Result<()> {
        self.count(|calls| calls.close += 1);
        match self.close.lock().unwrap().as_mut() {
            Some(handler) => handler(handle),
            None => Ok(()),
        }
    }

    fn set_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &[u8],
    ) -> io::Result<()> {
        self.count(|calls| calls.set_socket_option += 1);
        match self.set_socket_option.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, level, option, value),
            None => Ok(()),
        }
    }

    fn get_socket_option(
        &self,
        handle: SocketHandle,
        level: SocketOptionLevel,
        option: SocketOption,
        value: &mut [u8],
    ) -> io::Result<usize> {
        self.count(|calls| calls.get_socket_option += 1);
        match self.get_socket_option.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, level, option, value),
            None => {
                value.fill(0);
                Ok(value.len())
            }
        }
    }

    fn set_blocking_mode(&self, handle: SocketHandle, blocking: bool) -> io::Result<()> {
        self.count(|calls| calls.set_blocking_mode += 1);
        match self.set_blocking_mode.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, blocking),
            None => Ok(()),
        }
    }

    fn get_blocking_mode(&self, handle: SocketHandle) -> io::Result<bool> {
        self.count(|calls| calls.get_blocking_mode += 1);
        match self.get_blocking_mode.lock().unwrap().as_mut() {
            Some(handler) => handler(handle),
            None => Ok(true),
        }
    }

    fn bind(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        self.count(|calls| calls.bind += 1);
        match self.bind.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, address),
            None => Ok(()),
        }
    }

    fn connect(&self, handle: SocketHandle, address: &SockAddr) -> io::Result<()> {
        self.count(|calls| calls.connect += 1);
        match self.connect.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, address),
            None => Ok(()),
        }
    }

    fn listen(&self, handle: SocketHandle, backlog: i32) -> io::Result<()> {
        self.count(|calls| calls.listen += 1);
        match self.listen.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, backlog),
            None => Ok(()),
        }
    }

    fn accept(&self, handle: SocketHandle) -> io::Result<(SocketHandle, SockAddr)> {
        self.count(|calls| calls.accept += 1);
        match self.accept.lock().unwrap().as_mut() {
            Some(handler) => handler(handle),
            None => Err(would_block()),
        }
    }

    fn local_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        self.count(|calls| calls.local_address += 1);
        match self.local_address.lock().unwrap().as_mut() {
            Some(handler) => handler(handle),
            None => Ok(any_address()),
        }
    }

    fn remote_address(&self, handle: SocketHandle) -> io::Result<SockAddr> {
        self.count(|calls| calls.remote_address += 1);
        match self.remote_address.lock().unwrap().as_mut() {
            Some(handler) => handler(handle),
            None => Ok(any_address()),
        }
    }

    fn receive(&self, handle: SocketHandle, buffer: &mut [u8], flags: i32) -> io::Result<usize> {
        self.count(|calls| calls.receive += 1);
        match self.receive.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, buffer, flags),
            None => Ok(0),
        }
    }

    fn send(&self, handle: SocketHandle, data: &[u8], flags: i32) -> io::Result<usize> {
        self.count(|calls| calls.send += 1);
        match self.send.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, data, flags),
            None => Ok(data.len()),
        }
    }

    fn receive_from(
        &self,
        handle: SocketHandle,
        buffer: &mut [u8],
        flags: i32,
    ) -> io::Result<(usize, SockAddr)> {
        self.count(|calls| calls.receive_from += 1);
        match self.receive_from.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, buffer, flags),
            None => Ok((0, any_address())),
        }
    }

    fn send_to(
        &self,
        handle: SocketHandle,
        data: &[u8],
        flags: i32,
        address: &SockAddr,
    ) -> io::Result<usize> {
        self.count(|calls| calls.send_to += 1);
        match self.send_to.lock().unwrap().as_mut() {
            Some(handler) => handler(handle, data, flags, address),
            None => Ok(data.len()),
        }
    }
}
