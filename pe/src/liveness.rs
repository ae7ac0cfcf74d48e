//! Thread exit signals
//!
//! A [`ThreadExit`] observes the termination of the thread that created it.
//! The thread keeps the sending half of a channel in a thread-local; the
//! thread-local is destroyed when the thread exits, which disconnects the
//! channel and wakes every observer. Nothing is ever sent on the channel.

use std::cell::RefCell;
use std::convert::Infallible;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::debug;

thread_local! {
    static EXIT_HOOKS: RefCell<Vec<Sender<Infallible>>> = const { RefCell::new(Vec::new()) };
}

/// Handle that completes when a specific thread has terminated
#[derive(Debug)]
pub struct ThreadExit {
    thread_id: ThreadId,
    thread_name: Option<String>,
    rx: Receiver<Infallible>,
}

impl ThreadExit {
    /// Observe the calling thread
    pub fn current() -> Self {
        let current = thread::current();
        let (tx, rx) = mpsc::channel();

        // During thread teardown the hooks may already be gone; dropping `tx`
        // here then reports the thread as exited, which it is.
        let _ = EXIT_HOOKS.try_with(|hooks| hooks.borrow_mut().push(tx));

        debug!(thread_id = ?current.id(), thread_name = ?current.name(), "ThreadExit::current: registered");
        Self {
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            rx,
        }
    }

    /// Id of the observed thread
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Name of the observed thread, if it had one
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Whether the observed thread has already terminated
    pub fn has_exited(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the observed thread terminates
    pub fn wait(&self) {
        // recv only returns once every sender is dropped
        let _ = self.rx.recv();
        debug!(thread_id = ?self.thread_id, "ThreadExit::wait: thread exited");
    }

    /// Block until the thread terminates or the timeout elapses; true if it exited
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Disconnected))
    }
}
