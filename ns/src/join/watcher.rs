//! Node-side join watchers
//!
//! After the controller accepts an enlist, a watcher thread waits for the
//! enlisting thread to exit and then releases the controller's proxy.

use std::io;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use primitives::{PrimitiveId, ThreadExit};
use tracing::{debug, warn};

use crate::protocol::{ControlRequest, ControlResponse, SessionKey};
use crate::transport::Transport;

type WatchKey = (PrimitiveId, ThreadId);

/// Enlisted (join, thread) pairs and the session keys of their proxies
pub struct JoinWatchers {
    transport: Arc<dyn Transport>,
    watched: DashMap<WatchKey, SessionKey>,
}

impl JoinWatchers {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            watched: DashMap::new(),
        }
    }

    /// Whether `thread` is currently enlisted in join `id`
    pub fn is_watching(&self, id: &PrimitiveId, thread: ThreadId) -> bool {
        self.watched.contains_key(&(id.clone(), thread))
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Record the calling thread as enlisted under `key` and watch for its exit
    ///
    /// The entry is recorded before this returns. If the watcher thread cannot
    /// be started the proxy is released straight away and the entry removed.
    pub fn watch(self: &Arc<Self>, id: PrimitiveId, key: SessionKey) -> io::Result<()> {
        let exit = ThreadExit::current();
        let watch_key: WatchKey = (id.clone(), exit.thread_id());
        self.watched.insert(watch_key.clone(), key.clone());

        let watchers = Arc::clone(self);
        let watched_key = key.clone();
        let spawned = thread::Builder::new().name(format!("join-watcher-{id}")).spawn(move || {
            debug!(id = %watch_key.0, thread_name = ?exit.thread_name(), "join watcher: waiting for thread exit");
            exit.wait();
            watchers.release(&watched_key);
            watchers.watched.remove(&watch_key);
        });

        if let Err(e) = spawned {
            warn!(%id, %key, error = %e, "watch: failed to start watcher, releasing now");
            self.release(&key);
            self.watched.remove(&(id, thread::current().id()));
            return Err(e);
        }
        Ok(())
    }

    /// Tell the controller to release the proxy under `key`
    ///
    /// Failures are logged only; nobody is left to report them to.
    fn release(&self, key: &SessionKey) {
        debug!(%key, "release: called");
        match self.transport.call(ControlRequest::EnlistEnd { key: key.clone() }) {
            Ok(ControlResponse::Done) => debug!(%key, "release: proxy released"),
            Ok(ControlResponse::Fault { fault }) => warn!(%key, %fault, "release: controller fault"),
            Ok(other) => warn!(%key, ?other, "release: unexpected response"),
            Err(fault) => warn!(%key, %fault, "release: transport fault"),
        }
    }
}

impl std::fmt::Debug for JoinWatchers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinWatchers").field("watched", &self.watched.len()).finish()
    }
}
