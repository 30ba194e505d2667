//! The active-object primitive: a named thread with lifecycle hooks
//! and cancellation latches.

use std::{
    io,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

const TRACE_TARGET: &str = "polyio::worker";

/// OS thread names are silently truncated to this many bytes.
pub const MAX_THREAD_NAME: usize = 15;

/// The body of an active object.
///
/// The controller thread calls [`flush`] concurrently with [`run`];
/// implementations keep their cancellation state in atomics.
///
/// [`flush`]: WorkerBody::flush
/// [`run`]: WorkerBody::run
pub trait WorkerBody: Send + Sync + 'static {
    /// Runs on the worker thread before [`run`].
    ///
    /// [`run`]: WorkerBody::run
    fn init(&self) {}

    /// The thread body. Poll [`WorkerState::is_dying`] to stay
    /// cancelable.
    fn run(&self, state: &WorkerState);

    /// Runs on the worker thread after [`run`] returns.
    ///
    /// [`run`]: WorkerBody::run
    fn exit(&self) {}

    /// Called by the controller to make [`run`] return early, e.g. by
    /// setting an abort latch or closing a blocking handle.
    ///
    /// [`run`]: WorkerBody::run
    fn flush(&self) {}
}

/// The latches shared between an active object and its thread body.
#[derive(Debug, Default)]
pub struct WorkerState {
    is_alive: AtomicBool,
    is_dying: AtomicBool,
}

impl WorkerState {
    /// True between entry to and exit from the thread body.
    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::SeqCst)
    }

    /// True once the controller has asked the body to stop.
    pub fn is_dying(&self) -> bool {
        self.is_dying.load(Ordering::SeqCst)
    }
}

/// A named thread running a [`WorkerBody`] with create/kill lifecycle
/// control.
///
/// [`kill`] cancels by setting the dying latch, invoking the body's
/// flush hook, and joining. A panic in the body is caught at the
/// thread boundary, logged, and re-propagated to the caller of
/// [`get_result`].
///
/// [`kill`]: ActiveObject::kill
/// [`get_result`]: ActiveObject::get_result
pub struct ActiveObject<B: WorkerBody + ?Sized> {
    name: String,
    body: Arc<B>,
    state: Arc<WorkerState>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    result: Mutex<Option<thread::Result<()>>>,
}

impl<B: WorkerBody + ?Sized> ActiveObject<B> {
    /// Wrap `body` as an active object. The name is truncated to
    /// [`MAX_THREAD_NAME`] bytes. Nothing runs until [`create`].
    ///
    /// [`create`]: ActiveObject::create
    pub fn new(name: &str, body: Arc<B>) -> ActiveObject<B> {
        let mut name = name.to_string();
        if name.len() > MAX_THREAD_NAME {
            let mut cut = MAX_THREAD_NAME;
            while !name.is_char_boundary(cut) {
                cut -= 1;
            }
            name.truncate(cut);
        }
        ActiveObject {
            name,
            body,
            state: Arc::new(WorkerState::default()),
            join: Mutex::new(None),
            result: Mutex::new(None),
        }
    }

    /// The (truncated) thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The body this object runs.
    pub fn body(&self) -> &Arc<B> {
        &self.body
    }

    /// Spawn the thread and run init/run/exit.
    pub fn create(&self) -> io::Result<()> {
        let mut join = self.join.lock().unwrap();
        if join.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "thread is already running",
            ));
        }

        self.state.is_dying.store(false, Ordering::SeqCst);
        *self.result.lock().unwrap() = None;
        let body = Arc::clone(&self.body);
        let state = Arc::clone(&self.state);
        let name = self.name.clone();
        let handle = thread::Builder::new().name(self.name.clone()).spawn(move || {
            state.is_alive.store(true, Ordering::SeqCst);
            tracing::trace!(target: TRACE_TARGET, thread = %name, "thread starting");
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                body.init();
                body.run(&state);
                body.exit();
            }));
            state.is_alive.store(false, Ordering::SeqCst);
            match outcome {
                Ok(()) => {
                    tracing::trace!(target: TRACE_TARGET, thread = %name, "thread shutting down");
                }
                Err(payload) => {
                    tracing::error!(target: TRACE_TARGET, thread = %name, "thread panicked");
                    resume_unwind(payload);
                }
            }
        })?;
        *join = Some(handle);
        Ok(())
    }

    /// Whether the thread has been created and has not finished.
    pub fn is_running(&self) -> bool {
        self.join
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// True between entry to and exit from the thread body.
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// True once [`kill`] has been requested.
    ///
    /// [`kill`]: ActiveObject::kill
    pub fn is_dying(&self) -> bool {
        self.state.is_dying()
    }

    /// Ask the body to stop without joining.
    pub fn flush(&self) {
        self.body.flush();
    }

    /// Stop the thread: set the dying latch, flush the body, join.
    /// A panic from the body is deferred to [`get_result`].
    ///
    /// [`get_result`]: ActiveObject::get_result
    pub fn kill(&self) {
        let handle = {
            let mut join = self.join.lock().unwrap();
            if join.is_none() {
                return;
            }
            self.state.is_dying.store(true, Ordering::SeqCst);
            tracing::trace!(target: TRACE_TARGET, thread = %self.name, "signaling thread to shut down");
            self.body.flush();
            join.take()
        };
        if let Some(handle) = handle {
            tracing::trace!(target: TRACE_TARGET, thread = %self.name, "waiting for thread to shut down");
            let result = handle.join();
            *self.result.lock().unwrap() = Some(result);
        }
    }

    /// Join (if still running) and yield the body's outcome: `Ok` for
    /// a clean exit, `Err` with the panic payload otherwise.
    pub fn get_result(&self) -> thread::Result<()> {
        self.kill();
        match self.result.lock().unwrap().take() {
            Some(result) => result,
            None => Ok(()),
        }
    }
}

impl<B: WorkerBody + ?Sized> Drop for ActiveObject<B> {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize},
        time::Duration,
    };

    use super::*;

    #[derive(Default)]
    struct Recorder {
        init_calls: AtomicUsize,
        run_calls: AtomicUsize,
        exit_calls: AtomicUsize,
        abort: AtomicBool,
    }

    impl WorkerBody for Recorder {
        fn init(&self) {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn run(&self, state: &WorkerState) {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            while !state.is_dying() && !self.abort.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn exit(&self) {
            self.exit_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn flush(&self) {
            self.abort.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn lifecycle_hooks_run_in_order() {
        let body = Arc::new(Recorder::default());
        let object = ActiveObject::new("recorder", Arc::clone(&body));
        object.create().unwrap();

        // Give the body a moment to enter run().
        for _ in 0..100 {
            if body.run_calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(object.is_alive());
        assert!(object.is_running());

        object.kill();
        assert!(!object.is_alive());
        assert!(!object.is_running());
        assert_eq!(body.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(body.run_calls.load(Ordering::SeqCst), 1);
        assert_eq!(body.exit_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn kill_is_idempotent_and_create_restarts() {
        let body = Arc::new(Recorder::default());
        let object = ActiveObject::new("recorder", Arc::clone(&body));
        object.create().unwrap();
        object.kill();
        object.kill();

        body.abort.store(false, Ordering::SeqCst);
        object.create().unwrap();
        object.kill();
        assert_eq!(body.run_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn name_is_truncated_to_fifteen_bytes() {
        let body = Arc::new(Recorder::default());
        let object = ActiveObject::new("a-very-long-thread-name-indeed", body);
        assert_eq!(object.name().len(), MAX_THREAD_NAME);
        assert_eq!(object.name(), "a-very-long-thr");
    }

    struct Panicker;

    impl WorkerBody for Panicker {
        fn run(&self, _state: &WorkerState) {
            panic!("boom");
        }
    }

    #[test]
    fn body_panic_is_reported_through_get_result() {
        let object = ActiveObject::new("panicker", Arc::new(Panicker));
        object.create().unwrap();
        let result = object.get_result();
        assert!(result.is_err());
        // A second query reports a clean slate.
        assert!(object.get_result().is_ok());
    }

    #[test]
    fn double_create_while_running_is_refused() {
        let body = Arc::new(Recorder::default());
        let object = ActiveObject::new("recorder", Arc::clone(&body));
        object.create().unwrap();
        assert!(object.create().is_err());
        object.kill();
    }
}
