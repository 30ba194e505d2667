//! The acceptor: an active object owning the listening socket.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    thread,
    time::Duration,
};

use crate::{
    api::SocketApi,
    defs::Timeout,
    endpoint::Ipv4Endpoint,
    net::{Ipv4TcpServerSocket, Ipv4TcpSocket},
    worker::{ActiveObject, WorkerBody, WorkerState},
};

const TRACE_TARGET: &str = "polyio::server";

/// What the acceptor asks of the server that owns it.
///
/// All four hooks run on the acceptor thread.
pub trait ServerEvents: Send + Sync {
    /// Reap connections that have reported themselves closed.
    fn do_connection_cleanup(&self);

    /// Whether a new connection would currently be welcome.
    fn ready_to_accept(&self) -> bool;

    /// Take ownership of an accepted connection. Returning `false`
    /// refuses (and thereby drops) it.
    fn on_accepted(&self, socket: Ipv4TcpSocket, peer: Ipv4Endpoint) -> bool;

    /// Shut down every connection still alive; the acceptor is about
    /// to exit.
    fn force_connection_close(&self);
}

struct AcceptLoop {
    api: Arc<dyn SocketApi>,
    events: Weak<dyn ServerEvents>,
    port: u16,
    backlog: i32,
    accept_timeout: Duration,
    abort: AtomicBool,
}

impl WorkerBody for AcceptLoop {
    fn run(&self, state: &WorkerState) {
        let mut listen_socket = match Ipv4TcpServerSocket::new(
            Arc::clone(&self.api),
            self.port,
            self.backlog,
            Timeout::Finite(self.accept_timeout),
        ) {
            Ok(socket) => socket,
            Err(error) => {
                tracing::error!(target: TRACE_TARGET, %error, "opening listen socket failed");
                return;
            }
        };
        if let Err(error) = listen_socket.initialize() {
            tracing::error!(
                target: TRACE_TARGET,
                %error,
                port = self.port,
                "initializing listen socket failed"
            );
            return;
        }
        tracing::debug!(target: TRACE_TARGET, port = self.port, "server accepting connections");

        self.abort.store(false, Ordering::SeqCst);
        while !state.is_dying() && !self.abort.load(Ordering::SeqCst) {
            let Some(events) = self.events.upgrade() else {
                break;
            };
            events.do_connection_cleanup();
            if events.ready_to_accept() {
                match listen_socket.accept() {
                    Ok(Some((client, peer))) => {
                        if events.on_accepted(client, peer) {
                            tracing::debug!(target: TRACE_TARGET, %peer, "connection accepted");
                        } else {
                            tracing::debug!(target: TRACE_TARGET, %peer, "connection refused");
                        }
                    }
                    Ok(None) => {}
                    Err(error) => {
                        // An error on the listening socket itself ends
                        // the server.
                        tracing::error!(target: TRACE_TARGET, %error, "accept failed");
                        break;
                    }
                }
            } else {
                thread::sleep(self.accept_timeout);
            }
        }

        if let Some(events) = self.events.upgrade() {
            events.force_connection_close();
        }
        if let Err(error) = listen_socket.uninitialize() {
            tracing::error!(target: TRACE_TARGET, %error, "closing listen socket failed");
        }
        tracing::debug!(target: TRACE_TARGET, port = self.port, "server shut down");
    }

    fn flush(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

/// The acceptor thread: open, bind and listen, then loop on timed
/// accepts, handing each connection to the server and driving its
/// cleanup between attempts.
///
/// Every loop iteration is preemptable within one accept-timeout
/// window.
pub(crate) struct Acceptor {
    thread: ActiveObject<AcceptLoop>,
}

impl Acceptor {
    /// Spawn the acceptor.
    pub(crate) fn start(
        api: Arc<dyn SocketApi>,
        events: Weak<dyn ServerEvents>,
        port: u16,
        backlog: i32,
        accept_timeout: Duration,
    ) -> io::Result<Acceptor> {
        let body = Arc::new(AcceptLoop {
            api,
            events,
            port,
            backlog,
            accept_timeout,
            abort: AtomicBool::new(false),
        });
        let thread = ActiveObject::new("tcp-server-acpt", body);
        thread.create()?;
        Ok(Acceptor { thread })
    }

    /// Stop accepting: flush, join, release the port.
    pub(crate) fn stop(&self) {
        self.thread.kill();
    }

    /// Whether the acceptor thread is running.
    pub(crate) fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}
