//! The multi-connection TCP server framework.

mod acceptor;
mod connection;

use std::{
    io, mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};

pub use acceptor::ServerEvents;
pub use connection::{CloseListener, ConnectionHandler, ConnectionId, DataCallback};

use self::acceptor::Acceptor;
use crate::{api::SocketApi, endpoint::Ipv4Endpoint, net::Ipv4TcpSocket};

const TRACE_TARGET: &str = "polyio::server";

#[derive(Default)]
struct HandlerLists {
    live: Vec<Arc<ConnectionHandler>>,
    closed: Vec<Arc<ConnectionHandler>>,
}

struct ServerCore {
    api: Arc<dyn SocketApi>,
    callback: DataCallback,
    self_ref: Weak<ServerCore>,
    acceptor: Mutex<Option<Acceptor>>,
    lists: Mutex<HandlerLists>,
    next_id: AtomicU64,
}

impl ServerCore {
    fn as_close_listener(&self) -> Option<Arc<dyn CloseListener>> {
        self.self_ref
            .upgrade()
            .map(|core| core as Arc<dyn CloseListener>)
    }
}

impl ServerEvents for ServerCore {
    // Runs on the acceptor thread between accept attempts. Handlers
    // are moved out of the list before they are joined, so no thread
    // is ever joined under the list lock.
    fn do_connection_cleanup(&self) {
        let closed = mem::take(&mut self.lists.lock().unwrap().closed);
        for handler in closed {
            handler.flush();
            tracing::debug!(target: TRACE_TARGET, peer = %handler.peer(), "stop old connection");
            handler.stop();
        }
    }

    fn ready_to_accept(&self) -> bool {
        true
    }

    fn on_accepted(&self, socket: Ipv4TcpSocket, peer: Ipv4Endpoint) -> bool {
        tracing::debug!(target: TRACE_TARGET, %peer, "add connection");
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handler = Arc::new(ConnectionHandler::new(
            socket,
            peer,
            Some(Arc::clone(&self.callback)),
            id,
        ));
        if let Some(listener) = self.as_close_listener() {
            handler.subscribe(&listener);
        }
        if let Err(error) = handler.start() {
            tracing::error!(target: TRACE_TARGET, %error, "starting connection worker failed");
            return false;
        }
        self.lists.lock().unwrap().live.push(handler);
        true
    }

    // Runs on the acceptor thread at shutdown.
    fn force_connection_close(&self) {
        let live = mem::take(&mut self.lists.lock().unwrap().live);
        let listener = self.as_close_listener();
        for handler in live {
            if let Some(listener) = listener.as_ref() {
                handler.unsubscribe(listener);
            }
            handler.flush();
            tracing::debug!(target: TRACE_TARGET, peer = %handler.peer(), "stop live connection");
            handler.stop();
        }
    }
}

impl CloseListener for ServerCore {
    // Runs on the closing connection's worker thread. The worker
    // cannot join itself; it is only moved to the closed list here and
    // reaped by the acceptor on its next pass.
    fn on_connection_closed(&self, connection: ConnectionId) {
        tracing::debug!(target: TRACE_TARGET, connection, "connection closed");
        let listener = self.as_close_listener();
        let mut lists = self.lists.lock().unwrap();
        if let Some(position) = lists
            .live
            .iter()
            .position(|handler| handler.id() == connection)
        {
            let handler = lists.live.remove(position);
            if let Some(listener) = listener.as_ref() {
                handler.unsubscribe(listener);
            }
            lists.closed.push(handler);
        }
    }
}

/// A concurrent multi-connection TCP server.
///
/// [`start`] spawns the acceptor thread; each accepted connection gets
/// a worker thread of its own running the data callback. Workers that
/// terminate park themselves on a closed list, which the acceptor
/// reaps between accept attempts; [`stop`] shuts down the acceptor and
/// every outstanding connection before returning.
///
/// [`start`]: TcpServer::start
/// [`stop`]: TcpServer::stop
pub struct TcpServer {
    core: Arc<ServerCore>,
}

impl TcpServer {
    /// Create a stopped server that will serve connections with
    /// `callback`.
    pub fn new(api: Arc<dyn SocketApi>, callback: DataCallback) -> TcpServer {
        TcpServer {
            core: Arc::new_cyclic(|self_ref| ServerCore {
                api,
                callback,
                self_ref: self_ref.clone(),
                acceptor: Mutex::new(None),
                lists: Mutex::new(HandlerLists::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start listening on `port`. `accept_timeout` bounds each accept
    /// attempt and sets the cleanup cadence; [`stop`] preempts the
    /// acceptor within one such window.
    ///
    /// Starting an already started server is an error.
    ///
    /// [`stop`]: TcpServer::stop
    pub fn start(&self, port: u16, backlog: i32, accept_timeout: Duration) -> io::Result<()> {
        let mut acceptor = self.core.acceptor.lock().unwrap();
        if acceptor.as_ref().is_some_and(Acceptor::is_running) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "server is already started",
            ));
        }
        let core_dyn: Arc<dyn ServerEvents> = self.core.clone();
        let events: Weak<dyn ServerEvents> = Arc::downgrade(&core_dyn);
        *acceptor = Some(Acceptor::start(
            Arc::clone(&self.core.api),
            events,
            port,
            backlog,
            accept_timeout,
        )?);
        Ok(())
    }

    /// Stop the server: join the acceptor — which forces every live
    /// connection closed on its way out — then reap the closed list.
    pub fn stop(&self) {
        let acceptor = self.core.acceptor.lock().unwrap().take();
        if let Some(acceptor) = acceptor {
            acceptor.stop();
        }
        self.core.do_connection_cleanup();
    }

    /// Whether the acceptor is running.
    pub fn is_started(&self) -> bool {
        self.core
            .acceptor
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(Acceptor::is_running)
    }

    /// Number of currently live connections.
    pub fn connection_count(&self) -> usize {
        self.core.lists.lock().unwrap().live.len()
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.stop();
        self.core.force_connection_close();
        self.core.do_connection_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockSocketApi;

    #[test]
    fn start_twice_is_refused() {
        let api = Arc::new(MockSocketApi::new());
        let server = TcpServer::new(
            Arc::clone(&api) as Arc<dyn SocketApi>,
            Arc::new(|_, _| true),
        );
        server
            .start(22222, 1, Duration::from_millis(20))
            .unwrap();
        assert!(server.is_started());
        assert!(server.start(22222, 1, Duration::from_millis(20)).is_err());
        server.stop();
        assert!(!server.is_started());
    }

    #[test]
    fn restart_after_stop_is_allowed() {
        let api = Arc::new(MockSocketApi::new());
        let server = TcpServer::new(
            Arc::clone(&api) as Arc<dyn SocketApi>,
            Arc::new(|_, _| true),
        );
        server.start(22222, 1, Duration::from_millis(20)).unwrap();
        server.stop();
        server.start(22222, 1, Duration::from_millis(20)).unwrap();
        assert!(server.is_started());
        server.stop();
    }

    #[test]
    fn quiet_server_never_accepts_and_stops_cleanly() {
        let api = Arc::new(MockSocketApi::new());
        // Default mock accept reports "would block": the acceptor spins
        // timed accept attempts without ever producing a connection.
        let server = TcpServer::new(
            Arc::clone(&api) as Arc<dyn SocketApi>,
            Arc::new(|_, _| true),
        );
        server.start(22222, 1, Duration::from_millis(30)).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        server.stop();

        assert_eq!(server.connection_count(), 0);
        let calls = api.calls();
        assert!(calls.accept >= 2, "accept attempts: {}", calls.accept);
        assert_eq!(calls.listen, 1);
        // The listen socket was closed on shutdown.
        assert_eq!(calls.open, calls.close);
    }
}
