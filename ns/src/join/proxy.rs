//! Controller-side join proxies
//!
//! A join tracks the threads enlisted in it until they exit, but a node's
//! threads live in another process. For each accepted remote enlist the
//! controller starts a dedicated proxy thread, enlists that thread in the
//! engine's join, and parks it until the node reports that its own thread has
//! exited. Releasing the proxy lets its thread exit, which the engine observes
//! as the participant leaving.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use primitives::{EngineResult, PrimitiveEngine, PrimitiveId};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::protocol::{Fault, FaultKind, ProxyInfo, SessionKey};

/// A parked proxy; dropping it releases the proxy thread
#[derive(Debug)]
struct JoinProxy {
    id: PrimitiveId,
    thread_name: String,
    enlisted_at: DateTime<Utc>,
    _release: mpsc::Sender<Infallible>,
}

/// Live join proxies keyed by session key
///
/// Dropping the table releases every parked proxy.
#[derive(Debug, Default)]
pub struct JoinProxyTable {
    proxies: DashMap<SessionKey, JoinProxy>,
    sequence: AtomicU64,
}

impl JoinProxyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enlist a new proxy thread in join `id`
    ///
    /// Returns once the engine has accepted or rejected the enlist; the proxy
    /// itself stays parked until [`enlist_end`](Self::enlist_end). `None`
    /// means the engine rejected the enlist and no proxy was kept.
    pub async fn enlist_start(
        &self,
        engine: Arc<dyn PrimitiveEngine>,
        id: PrimitiveId,
    ) -> Result<Option<SessionKey>, Fault> {
        debug!(%id, "enlist_start: called");
        let (accept_tx, accept_rx) = oneshot::channel::<EngineResult<bool>>();
        let (release_tx, release_rx) = mpsc::channel::<Infallible>();

        let thread_name = format!("join-proxy-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        let proxy_id = id.clone();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || park_proxy(engine, proxy_id, accept_tx, release_rx))
            .map_err(|e| Fault::from_error(FaultKind::Invocation, &e).context("Failed to start join proxy"))?;

        let accepted = accept_rx
            .await
            .map_err(|_| Fault::new(FaultKind::Invocation, "Join proxy exited before reporting acceptance"))?
            .map_err(Fault::from)?;

        if !accepted {
            debug!(%id, %thread_name, "enlist_start: rejected by engine");
            return Ok(None);
        }

        let key = SessionKey::generate();
        self.proxies.insert(
            key.clone(),
            JoinProxy {
                id: id.clone(),
                thread_name: thread_name.clone(),
                enlisted_at: Utc::now(),
                _release: release_tx,
            },
        );
        info!(%id, %key, %thread_name, parked = self.proxies.len(), "enlist_start: proxy parked");
        Ok(Some(key))
    }

    /// Release the proxy parked under `key`; unknown keys are ignored
    pub fn enlist_end(&self, key: &SessionKey) -> bool {
        match self.proxies.remove(key) {
            Some((_, proxy)) => {
                info!(%key, id = %proxy.id, thread_name = %proxy.thread_name, "enlist_end: releasing proxy");
                true
            }
            None => {
                debug!(%key, "enlist_end: no proxy for key");
                false
            }
        }
    }

    /// Number of parked proxies
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.proxies.contains_key(key)
    }

    /// Snapshot of every parked proxy, oldest first
    pub fn list(&self) -> Vec<ProxyInfo> {
        let mut proxies: Vec<ProxyInfo> = self
            .proxies
            .iter()
            .map(|entry| ProxyInfo {
                key: entry.key().clone(),
                id: entry.id.clone(),
                thread_name: entry.thread_name.clone(),
                enlisted_at: entry.enlisted_at,
            })
            .collect();
        proxies.sort_by(|a, b| a.enlisted_at.cmp(&b.enlisted_at));
        proxies
    }
}

/// Body of a proxy thread
fn park_proxy(
    engine: Arc<dyn PrimitiveEngine>,
    id: PrimitiveId,
    accept_tx: oneshot::Sender<EngineResult<bool>>,
    release_rx: mpsc::Receiver<Infallible>,
) {
    let result = engine.join_enlist(&id);
    let accepted = matches!(result, Ok(true));
    if accept_tx.send(result).is_err() {
        warn!(%id, "park_proxy: enlist caller went away");
        return;
    }
    if !accepted {
        return;
    }

    debug!(%id, "park_proxy: parked");
    // Nothing is ever sent; recv returns once the sender is dropped
    let _ = release_rx.recv();
    debug!(%id, "park_proxy: released");
}
