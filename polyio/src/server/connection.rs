//! One worker thread per accepted connection.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    endpoint::Ipv4Endpoint,
    net::Ipv4TcpSocket,
    observable::Observable,
    worker::{ActiveObject, WorkerBody, WorkerState},
};

const TRACE_TARGET: &str = "polyio::server";
const READ_CHUNK: usize = 4096;

/// Identifies one accepted connection for close notifications.
pub type ConnectionId = u64;

/// Decides what to reply and whether to keep the connection.
///
/// Called with each received buffer; the reply is written into the
/// second argument. Returning `false` closes the connection after the
/// reply is sent.
pub type DataCallback = Arc<dyn Fn(&[u8], &mut Vec<u8>) -> bool + Send + Sync>;

/// Receives the close notification a connection worker publishes
/// exactly once, on its own thread, right before it terminates.
pub trait CloseListener: Send + Sync {
    /// The connection with the given id has closed.
    fn on_connection_closed(&self, connection: ConnectionId);
}

struct ConnectionWorker {
    socket: Ipv4TcpSocket,
    peer: Ipv4Endpoint,
    abort: AtomicBool,
    callback: Option<DataCallback>,
    observers: Observable<dyn CloseListener>,
    id: ConnectionId,
}

impl WorkerBody for ConnectionWorker {
    fn run(&self, state: &WorkerState) {
        tracing::trace!(target: TRACE_TARGET, peer = %self.peer, "starting connection handler");
        self.abort.store(false, Ordering::SeqCst);
        while !state.is_dying() && !self.abort.load(Ordering::SeqCst) {
            let mut received = Vec::new();
            match self.socket.receive_buffer(&mut received, READ_CHUNK, 0) {
                Ok(0) | Err(_) => {
                    tracing::trace!(
                        target: TRACE_TARGET,
                        "receive signalling to stop connection"
                    );
                    self.abort.store(true, Ordering::SeqCst);
                    continue;
                }
                Ok(_) => {}
            }
            let Some(callback) = self.callback.as_deref() else {
                tracing::trace!(target: TRACE_TARGET, "no data handling installed, stop connection");
                self.abort.store(true, Ordering::SeqCst);
                continue;
            };
            let mut reply = Vec::new();
            if !callback(&received, &mut reply) {
                tracing::trace!(
                    target: TRACE_TARGET,
                    "data handling signalling to stop connection"
                );
                self.abort.store(true, Ordering::SeqCst);
                continue;
            }
            if !matches!(self.socket.send_buffer(&reply, 0), Ok(true)) {
                tracing::trace!(target: TRACE_TARGET, "send signalling to stop connection");
                self.abort.store(true, Ordering::SeqCst);
            }
        }
        tracing::trace!(target: TRACE_TARGET, peer = %self.peer, "shutting down connection handler");
        self.observers
            .for_all(|listener| listener.on_connection_closed(self.id));
    }

    fn flush(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

/// An accepted connection and the worker thread that serves it.
///
/// The worker reads a buffer, hands it to the data callback, writes
/// the reply back, and exits on end of stream, callback refusal, a
/// non-retryable error, or [`stop`]. In every one of those cases it
/// notifies its close listeners exactly once before terminating.
///
/// [`stop`]: ConnectionHandler::stop
pub struct ConnectionHandler {
    thread: ActiveObject<ConnectionWorker>,
}

impl ConnectionHandler {
    /// Take ownership of an accepted socket and prepare (but not yet
    /// start) its worker.
    pub fn new(
        socket: Ipv4TcpSocket,
        peer: Ipv4Endpoint,
        callback: Option<DataCallback>,
        id: ConnectionId,
    ) -> ConnectionHandler {
        let worker = Arc::new(ConnectionWorker {
            socket,
            peer,
            abort: AtomicBool::new(false),
            callback,
            observers: Observable::new(),
            id,
        });
        ConnectionHandler {
            thread: ActiveObject::new("tcp-server-conn", worker),
        }
    }

    /// The connection id used in close notifications.
    pub fn id(&self) -> ConnectionId {
        self.thread.body().id
    }

    /// The peer this connection talks to.
    pub fn peer(&self) -> Ipv4Endpoint {
        self.thread.body().peer
    }

    /// Register a close listener.
    pub fn subscribe(&self, listener: &Arc<dyn CloseListener>) {
        self.thread.body().observers.subscribe(listener);
    }

    /// Remove a close listener.
    pub fn unsubscribe(&self, listener: &Arc<dyn CloseListener>) {
        self.thread.body().observers.unsubscribe(listener);
    }

    /// Spawn the worker thread.
    pub fn start(&self) -> io::Result<()> {
        self.thread.create()
    }

    /// Set the abort latch; the worker exits after its current
    /// receive completes.
    pub fn flush(&self) {
        self.thread.flush();
    }

    /// Stop the worker: set the abort latch, close the socket — which
    /// releases a blocked receive — and join.
    pub fn stop(&self) {
        self.thread.flush();
        if let Err(error) = self.thread.body().socket.close() {
            tracing::error!(target: TRACE_TARGET, %error, "closing connection socket failed");
        }
        self.thread.kill();
    }

    /// Whether the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}

impl std::fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("id", &self.id())
            .field("peer", &self.peer())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use std::time::Duration;

    use super::*;
    use crate::{api::MockSocketApi, api::SocketApi, defs::SocketHandle};

    struct CloseCounter {
        closed: AtomicUsize,
        last: Mutex<Option<ConnectionId>>,
    }

    impl CloseListener for CloseCounter {
        fn on_connection_closed(&self, connection: ConnectionId) {
            self.closed.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(connection);
        }
    }

    fn accepted_socket(api: &Arc<MockSocketApi>) -> Ipv4TcpSocket {
        Ipv4TcpSocket::new(Arc::clone(api) as Arc<dyn SocketApi>).unwrap()
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn eof_publishes_one_close_notification() {
        let api = Arc::new(MockSocketApi::new());
        // Default mock receive reports end of stream immediately.
        let handler = ConnectionHandler::new(
            accepted_socket(&api),
            "127.0.0.1:1000".parse().unwrap(),
            Some(Arc::new(|_, _| true)),
            7,
        );
        let listener = Arc::new(CloseCounter {
            closed: AtomicUsize::new(0),
            last: Mutex::new(None),
        });
        let listener_dyn: Arc<dyn CloseListener> = listener.clone();
        handler.subscribe(&listener_dyn);

        handler.start().unwrap();
        wait_until(|| !handler.is_running());
        handler.stop();

        assert_eq!(listener.closed.load(Ordering::SeqCst), 1);
        assert_eq!(*listener.last.lock().unwrap(), Some(7));
    }

    #[test]
    fn callback_reply_is_sent_back() {
        let api = Arc::new(MockSocketApi::new());
        let rounds = Arc::new(AtomicUsize::new(0));
        let rounds_in_mock = rounds.clone();
        api.on_receive(move |_, buffer: &mut [u8], _| {
            // One buffer, then end of stream.
            if rounds_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                buffer[..4].copy_from_slice(b"ping");
                Ok(4)
            } else {
                Ok(0)
            }
        });
        let sent: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sent_in_mock = sent.clone();
        api.on_send(move |_, data: &[u8], _| {
            sent_in_mock.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        });

        let handler = ConnectionHandler::new(
            accepted_socket(&api),
            "127.0.0.1:1000".parse().unwrap(),
            Some(Arc::new(|received, reply| {
                reply.extend_from_slice(received);
                reply.extend_from_slice(b"-pong");
                true
            })),
            1,
        );
        handler.start().unwrap();
        wait_until(|| !handler.is_running());
        handler.stop();

        assert_eq!(sent.lock().unwrap().as_slice(), b"ping-pong");
    }

    #[test]
    fn callback_false_stops_after_reply() {
        let api = Arc::new(MockSocketApi::new());
        api.on_receive(|_, buffer: &mut [u8], _| {
            buffer[0] = b'x';
            Ok(1)
        });
        let sends = Arc::new(AtomicUsize::new(0));
        let sends_in_mock = sends.clone();
        api.on_send(move |_, data: &[u8], _| {
            sends_in_mock.fetch_add(1, Ordering::SeqCst);
            Ok(data.len())
        });

        let handler = ConnectionHandler::new(
            accepted_socket(&api),
            "127.0.0.1:1000".parse().unwrap(),
            Some(Arc::new(|_, reply| {
                reply.push(b'y');
                false
            })),
            1,
        );
        handler.start().unwrap();
        wait_until(|| !handler.is_running());
        handler.stop();

        // The callback refused continuation before anything was sent.
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_callback_closes_the_connection() {
        let api = Arc::new(MockSocketApi::new());
        api.on_receive(|_, buffer: &mut [u8], _| {
            buffer[0] = b'x';
            Ok(1)
        });
        let handler = ConnectionHandler::new(
            accepted_socket(&api),
            "127.0.0.1:1000".parse().unwrap(),
            None,
            1,
        );
        handler.start().unwrap();
        wait_until(|| !handler.is_running());
        handler.stop();
    }

    #[test]
    fn stop_releases_a_blocked_receive() {
        let api = Arc::new(MockSocketApi::new());
        let blocked: Arc<Mutex<Option<SocketHandle>>> = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        let closed_in_recv = closed.clone();
        #[cfg(unix)]
        let code = libc::EBADF;
        #[cfg(windows)]
        let code = windows_sys::Win32::Networking::WinSock::WSAENOTSOCK;
        api.on_receive(move |_, _: &mut [u8], _| {
            // Behave like a blocking recv that only returns once the
            // handle is closed underneath it.
            while !closed_in_recv.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(io::Error::from_raw_os_error(code))
        });
        let closed_in_close = closed.clone();
        api.on_close(move |handle| {
            *blocked.lock().unwrap() = Some(handle);
            closed_in_close.store(true, Ordering::SeqCst);
            Ok(())
        });

        let handler = ConnectionHandler::new(
            accepted_socket(&api),
            "127.0.0.1:1000".parse().unwrap(),
            Some(Arc::new(|_, _| true)),
            1,
        );
        handler.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(handler.is_running());

        handler.stop();
        assert!(!handler.is_running());
    }
}
