//! Control adapter: the controller's single entry point
//!
//! Maps each [`ControlRequest`] onto the primitive engine, the join proxy
//! table or the callback registry. Engine results and errors are passed back
//! as they are; nothing is retried.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use primitives::{EngineResult, PrimitiveEngine, PrimitiveId};
use tracing::{debug, warn};

use crate::VERSION;
use crate::callback::{CallbackRegistry, RemoteEndpoint};
use crate::join::JoinProxyTable;
use crate::protocol::{ControlRequest, ControlResponse, Fault, FaultKind};
use crate::transport::tcp::DEFAULT_CONNECT_TIMEOUT;

pub struct ControlAdapter {
    engine: Arc<dyn PrimitiveEngine>,
    proxies: JoinProxyTable,
    callbacks: CallbackRegistry,
    connect_timeout: Duration,
}

impl ControlAdapter {
    pub fn new(engine: Arc<dyn PrimitiveEngine>) -> Self {
        Self {
            engine,
            proxies: JoinProxyTable::new(),
            callbacks: CallbackRegistry::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Timeout for connecting to node callback hosts
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn proxies(&self) -> &JoinProxyTable {
        &self.proxies
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Run an engine operation on the blocking pool
    async fn engine_call<T, F>(&self, operation: &'static str, id: PrimitiveId, f: F) -> Result<T, Fault>
    where
        T: Debug + Send + 'static,
        F: FnOnce(&dyn PrimitiveEngine, &PrimitiveId) -> EngineResult<T> + Send + 'static,
    {
        debug!(operation, %id, "engine_call: called");
        let engine = Arc::clone(&self.engine);
        let call_id = id.clone();
        let result = tokio::task::spawn_blocking(move || f(engine.as_ref(), &call_id))
            .await
            .map_err(|e| Fault::new(FaultKind::Invocation, format!("Engine call '{operation}' panicked: {e}")))?;

        match result {
            Ok(value) => {
                debug!(operation, %id, ?value, "engine_call: returned");
                Ok(value)
            }
            Err(e) => {
                warn!(operation, %id, error = %e, "engine_call: engine error");
                Err(Fault::from(e))
            }
        }
    }

    /// Handle one request; failures come back as `ControlResponse::Fault`
    pub async fn dispatch(&self, request: ControlRequest) -> ControlResponse {
        let operation = request.operation();
        let result = match request {
            ControlRequest::Waiting { id } => self
                .engine_call(operation, id, |e, id| e.waiting(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::WaitFor { id, millis } => self
                .engine_call(operation, id, move |e, id| e.wait_for(id, millis))
                .await
                .map(|()| ControlResponse::Done),
            ControlRequest::SignalWake { id, must_meet } => self
                .engine_call(operation, id, move |e, id| e.signal_wake(id, must_meet))
                .await
                .map(ControlResponse::bool),
            ControlRequest::SignalThrow { id, must_meet } => self
                .engine_call(operation, id, move |e, id| e.signal_throw(id, must_meet))
                .await
                .map(ControlResponse::bool),

            ControlRequest::CreateRendezvous {
                id,
                expected,
                restartable,
            } => self
                .engine_call(operation, id, move |e, id| e.create_rendezvous(id, expected, restartable))
                .await
                .map(ControlResponse::bool),
            ControlRequest::IsRendezvous { id, expected } => self
                .engine_call(operation, id, move |e, id| e.is_rendezvous(id, expected))
                .await
                .map(ControlResponse::bool),
            ControlRequest::GetRendezvous { id, expected } => self
                .engine_call(operation, id, move |e, id| e.get_rendezvous(id, expected))
                .await
                .map(ControlResponse::int),
            ControlRequest::Rendezvous { id } => self
                .engine_call(operation, id, |e, id| e.rendezvous(id))
                .await
                .map(ControlResponse::int),
            ControlRequest::DeleteRendezvous { id, expected } => self
                .engine_call(operation, id, move |e, id| e.delete_rendezvous(id, expected))
                .await
                .map(ControlResponse::bool),

            ControlRequest::CreateJoin { id, max } => self
                .engine_call(operation, id, move |e, id| e.create_join(id, max))
                .await
                .map(ControlResponse::bool),
            ControlRequest::IsJoin { id, max } => self
                .engine_call(operation, id, move |e, id| e.is_join(id, max))
                .await
                .map(ControlResponse::bool),
            ControlRequest::JoinWait { id, count } => self
                .engine_call(operation, id, move |e, id| e.join_wait(id, count))
                .await
                .map(ControlResponse::bool),
            ControlRequest::EnlistStart { id } => self
                .proxies
                .enlist_start(Arc::clone(&self.engine), id)
                .await
                .map(|key| ControlResponse::SessionKey { key }),
            ControlRequest::EnlistEnd { key } => {
                self.proxies.enlist_end(&key);
                Ok(ControlResponse::Done)
            }

            ControlRequest::Flag { id } => self
                .engine_call(operation, id, |e, id| e.flag(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::Flagged { id } => self
                .engine_call(operation, id, |e, id| e.flagged(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::Clear { id } => self
                .engine_call(operation, id, |e, id| e.clear(id))
                .await
                .map(ControlResponse::bool),

            ControlRequest::CreateCountDown { id, count } => self
                .engine_call(operation, id, move |e, id| e.create_count_down(id, count))
                .await
                .map(ControlResponse::bool),
            ControlRequest::IsCountDown { id } => self
                .engine_call(operation, id, |e, id| e.is_count_down(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::CountDown { id } => self
                .engine_call(operation, id, |e, id| e.count_down(id))
                .await
                .map(ControlResponse::bool),

            ControlRequest::CreateCounter { id, value } => self
                .engine_call(operation, id, move |e, id| e.create_counter(id, value))
                .await
                .map(ControlResponse::bool),
            ControlRequest::DeleteCounter { id } => self
                .engine_call(operation, id, |e, id| e.delete_counter(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::ReadCounter { id, zero } => self
                .engine_call(operation, id, move |e, id| e.read_counter(id, zero))
                .await
                .map(ControlResponse::int),
            ControlRequest::IncrementCounter { id, amount } => self
                .engine_call(operation, id, move |e, id| e.increment_counter(id, amount))
                .await
                .map(ControlResponse::int),
            ControlRequest::DecrementCounter { id } => self
                .engine_call(operation, id, |e, id| e.decrement_counter(id))
                .await
                .map(ControlResponse::int),

            ControlRequest::CreateTimer { id } => self
                .engine_call(operation, id, |e, id| e.create_timer(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::DeleteTimer { id } => self
                .engine_call(operation, id, |e, id| e.delete_timer(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::ElapsedTime { id } => self
                .engine_call(operation, id, |e, id| e.elapsed_time(id))
                .await
                .map(ControlResponse::long),
            ControlRequest::ResetTimer { id } => self
                .engine_call(operation, id, |e, id| e.reset_timer(id))
                .await
                .map(ControlResponse::long),

            ControlRequest::TraceOpen { id, file_name } => self
                .engine_call(operation, id, move |e, id| e.trace_open(id, &file_name))
                .await
                .map(ControlResponse::bool),
            ControlRequest::TraceClose { id } => self
                .engine_call(operation, id, |e, id| e.trace_close(id))
                .await
                .map(ControlResponse::bool),
            ControlRequest::Trace { id, message } => self
                .engine_call(operation, id, move |e, id| e.trace(id, &message))
                .await
                .map(ControlResponse::bool),
            ControlRequest::TraceLine { id, message } => self
                .engine_call(operation, id, move |e, id| e.trace_line(id, &message))
                .await
                .map(ControlResponse::bool),

            ControlRequest::TerminateNode { id, exit_code } => self
                .callbacks
                .terminate(&id, exit_code)
                .await
                .map(|()| ControlResponse::Done),
            ControlRequest::RegisterCallback { id, target } => {
                let endpoint = RemoteEndpoint::new(target, self.connect_timeout);
                self.callbacks.register(id, Arc::new(endpoint));
                Ok(ControlResponse::Done)
            }
            ControlRequest::UnregisterCallback { id } => {
                self.callbacks.unregister(&id);
                Ok(ControlResponse::Done)
            }
            ControlRequest::InvokeCallback { id, args } => self
                .callbacks
                .invoke(&id, args)
                .await
                .map(|value| ControlResponse::Value { value }),

            ControlRequest::Ping => Ok(ControlResponse::Pong {
                version: VERSION.to_string(),
            }),
            ControlRequest::ListProxies => Ok(ControlResponse::Proxies {
                proxies: self.proxies.list(),
            }),
        };

        result.unwrap_or_else(|fault| {
            warn!(operation, %fault, "dispatch: returning fault");
            ControlResponse::Fault { fault }
        })
    }
}

impl std::fmt::Debug for ControlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlAdapter")
            .field("proxies", &self.proxies.len())
            .field("callbacks", &self.callbacks.len())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
