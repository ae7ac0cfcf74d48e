//! Node client: the synchronous API instrumentation code calls
//!
//! Every primitive operation is forwarded to the controller and its result
//! returned as is. Joins additionally start a watcher for the calling thread.

use std::sync::Arc;
use std::thread;

use eyre::{Context, Result};
use primitives::PrimitiveId;
use tracing::{debug, info, warn};

use crate::callback::{Callback, CallbackHost, HALT_TARGET};
use crate::config::Config;
use crate::error::ControlError;
use crate::join::JoinWatchers;
use crate::protocol::{ArgValue, ControlRequest, ControlResponse, ProxyInfo};
use crate::transport::{TcpTransport, Transport};

pub struct NodeClient {
    transport: Arc<dyn Transport>,
    watchers: Arc<JoinWatchers>,
    host: Option<CallbackHost>,
}

impl NodeClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            watchers: Arc::new(JoinWatchers::new(transport.clone())),
            transport,
            host: None,
        }
    }

    /// Connect to the configured controller without a callback host
    pub fn connect(config: &Config) -> Result<Self> {
        let address = config.controller.address();
        debug!(%address, "NodeClient::connect: called");
        let transport = TcpTransport::new(&address)
            .context("Failed to start client runtime")?
            .with_connect_timeout(config.controller.connect_timeout());
        Ok(Self::new(Arc::new(transport)))
    }

    /// Connect and start a callback host as configured under `node`
    pub fn connect_with_host(config: &Config) -> Result<Self> {
        let client = Self::connect(config)?;
        let host = client
            .transport
            .handle()
            .block_on(CallbackHost::bind(&config.node.callback_bind))?;
        let host = match &config.node.advertise_host {
            Some(advertise) => host.with_advertise_host(advertise),
            None => host,
        };
        Ok(client.with_callback_host(host))
    }

    /// Bind a callback host on the transport's runtime
    pub fn start_callback_host(self, bind: &str) -> Result<Self> {
        let host = self.transport.handle().block_on(CallbackHost::bind(bind))?;
        Ok(self.with_callback_host(host))
    }

    pub fn with_callback_host(mut self, host: CallbackHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn callback_host(&self) -> Option<&CallbackHost> {
        self.host.as_ref()
    }

    pub fn watchers(&self) -> &JoinWatchers {
        &self.watchers
    }

    fn host(&self) -> Result<&CallbackHost, ControlError> {
        self.host.as_ref().ok_or(ControlError::NoCallbackHost)
    }

    fn call(&self, request: ControlRequest) -> Result<ControlResponse, ControlError> {
        let operation = request.operation();
        debug!(operation, "NodeClient::call: called");
        match self.transport.call(request) {
            Ok(ControlResponse::Fault { fault }) | Err(fault) => {
                warn!(operation, %fault, "NodeClient::call: failed");
                Err(ControlError::Remote { operation, fault })
            }
            Ok(response) => {
                debug!(operation, ?response, "NodeClient::call: returned");
                Ok(response)
            }
        }
    }

    fn call_bool(&self, request: ControlRequest) -> Result<bool, ControlError> {
        let operation = request.operation();
        match self.call(request)? {
            ControlResponse::Bool { value } => Ok(value),
            other => Err(unexpected(operation, other)),
        }
    }

    fn call_int(&self, request: ControlRequest) -> Result<i32, ControlError> {
        let operation = request.operation();
        match self.call(request)? {
            ControlResponse::Int { value } => Ok(value),
            other => Err(unexpected(operation, other)),
        }
    }

    fn call_long(&self, request: ControlRequest) -> Result<i64, ControlError> {
        let operation = request.operation();
        match self.call(request)? {
            ControlResponse::Long { value } => Ok(value),
            other => Err(unexpected(operation, other)),
        }
    }

    fn call_done(&self, request: ControlRequest) -> Result<(), ControlError> {
        let operation = request.operation();
        match self.call(request)? {
            ControlResponse::Done => Ok(()),
            other => Err(unexpected(operation, other)),
        }
    }

    // === Signals ===

    pub fn waiting(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::Waiting { id: id.into() })
    }

    /// Wait for a signal; `millis` of 0 waits forever
    pub fn wait_for(&self, id: impl Into<PrimitiveId>, millis: u64) -> Result<(), ControlError> {
        self.call_done(ControlRequest::WaitFor { id: id.into(), millis })
    }

    pub fn signal_wake(&self, id: impl Into<PrimitiveId>, must_meet: bool) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::SignalWake { id: id.into(), must_meet })
    }

    pub fn signal_throw(&self, id: impl Into<PrimitiveId>, must_meet: bool) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::SignalThrow { id: id.into(), must_meet })
    }

    // === Rendezvous ===

    pub fn create_rendezvous(
        &self,
        id: impl Into<PrimitiveId>,
        expected: i32,
        restartable: bool,
    ) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CreateRendezvous {
            id: id.into(),
            expected,
            restartable,
        })
    }

    pub fn is_rendezvous(&self, id: impl Into<PrimitiveId>, expected: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::IsRendezvous { id: id.into(), expected })
    }

    pub fn get_rendezvous(&self, id: impl Into<PrimitiveId>, expected: i32) -> Result<i32, ControlError> {
        self.call_int(ControlRequest::GetRendezvous { id: id.into(), expected })
    }

    pub fn rendezvous(&self, id: impl Into<PrimitiveId>) -> Result<i32, ControlError> {
        self.call_int(ControlRequest::Rendezvous { id: id.into() })
    }

    pub fn delete_rendezvous(&self, id: impl Into<PrimitiveId>, expected: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::DeleteRendezvous { id: id.into(), expected })
    }

    // === Joins ===

    pub fn create_join(&self, id: impl Into<PrimitiveId>, max: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CreateJoin { id: id.into(), max })
    }

    pub fn is_join(&self, id: impl Into<PrimitiveId>, max: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::IsJoin { id: id.into(), max })
    }

    pub fn join_wait(&self, id: impl Into<PrimitiveId>, count: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::JoinWait { id: id.into(), count })
    }

    /// Enlist the calling thread in join `id` until the thread exits
    ///
    /// Returns false without contacting the controller if this thread is
    /// already enlisted in `id`, and false if the controller rejects it.
    pub fn join_enlist(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        let id = id.into();
        let current = thread::current();
        if self.watchers.is_watching(&id, current.id()) {
            debug!(%id, thread = ?current.name(), "join_enlist: thread already enlisted");
            return Ok(false);
        }

        let response = self.call(ControlRequest::EnlistStart { id: id.clone() })?;
        let key = match response {
            ControlResponse::SessionKey { key } => key,
            other => return Err(unexpected("enlist_start", other)),
        };
        let Some(key) = key else {
            debug!(%id, "join_enlist: rejected");
            return Ok(false);
        };

        self.watchers.watch(id.clone(), key.clone()).map_err(ControlError::Watcher)?;
        info!(%id, %key, thread = ?current.name(), "join_enlist: enlisted");
        Ok(true)
    }

    // === Flags ===

    pub fn flag(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::Flag { id: id.into() })
    }

    pub fn flagged(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::Flagged { id: id.into() })
    }

    pub fn clear(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::Clear { id: id.into() })
    }

    // === Countdowns ===

    pub fn create_count_down(&self, id: impl Into<PrimitiveId>, count: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CreateCountDown { id: id.into(), count })
    }

    pub fn is_count_down(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::IsCountDown { id: id.into() })
    }

    pub fn count_down(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CountDown { id: id.into() })
    }

    // === Counters ===

    pub fn create_counter(&self, id: impl Into<PrimitiveId>, value: i32) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CreateCounter { id: id.into(), value })
    }

    pub fn delete_counter(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::DeleteCounter { id: id.into() })
    }

    pub fn read_counter(&self, id: impl Into<PrimitiveId>, zero: bool) -> Result<i32, ControlError> {
        self.call_int(ControlRequest::ReadCounter { id: id.into(), zero })
    }

    pub fn increment_counter(&self, id: impl Into<PrimitiveId>, amount: i32) -> Result<i32, ControlError> {
        self.call_int(ControlRequest::IncrementCounter { id: id.into(), amount })
    }

    pub fn decrement_counter(&self, id: impl Into<PrimitiveId>) -> Result<i32, ControlError> {
        self.call_int(ControlRequest::DecrementCounter { id: id.into() })
    }

    // === Timers ===

    pub fn create_timer(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::CreateTimer { id: id.into() })
    }

    pub fn delete_timer(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::DeleteTimer { id: id.into() })
    }

    pub fn elapsed_time(&self, id: impl Into<PrimitiveId>) -> Result<i64, ControlError> {
        self.call_long(ControlRequest::ElapsedTime { id: id.into() })
    }

    pub fn reset_timer(&self, id: impl Into<PrimitiveId>) -> Result<i64, ControlError> {
        self.call_long(ControlRequest::ResetTimer { id: id.into() })
    }

    // === Traces ===

    pub fn trace_open(&self, id: impl Into<PrimitiveId>, file_name: &str) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::TraceOpen {
            id: id.into(),
            file_name: file_name.to_string(),
        })
    }

    pub fn trace_close(&self, id: impl Into<PrimitiveId>) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::TraceClose { id: id.into() })
    }

    pub fn trace(&self, id: impl Into<PrimitiveId>, message: &str) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::Trace {
            id: id.into(),
            message: message.to_string(),
        })
    }

    pub fn trace_line(&self, id: impl Into<PrimitiveId>, message: &str) -> Result<bool, ControlError> {
        self.call_bool(ControlRequest::TraceLine {
            id: id.into(),
            message: message.to_string(),
        })
    }

    // === Callbacks ===

    /// Serve `callback` from this node's host and register it with the controller under `id`
    pub fn register_callback(&self, id: impl Into<PrimitiveId>, callback: Arc<dyn Callback>) -> Result<(), ControlError> {
        let id = id.into();
        let host = self.host()?;
        host.register(id.as_str(), callback);
        self.call_done(ControlRequest::RegisterCallback {
            target: host.reference(id.as_str()),
            id,
        })
    }

    pub fn unregister_callback(&self, id: impl Into<PrimitiveId>) -> Result<(), ControlError> {
        let id = id.into();
        if let Some(host) = &self.host {
            host.unregister(id.as_str());
        }
        self.call_done(ControlRequest::UnregisterCallback { id })
    }

    pub fn invoke_callback(&self, id: impl Into<PrimitiveId>, args: Vec<ArgValue>) -> Result<ArgValue, ControlError> {
        match self.call(ControlRequest::InvokeCallback { id: id.into(), args })? {
            ControlResponse::Value { value } => Ok(value),
            other => Err(unexpected("invoke_callback", other)),
        }
    }

    /// Let the controller halt this node through `terminate_node(id, ..)`
    pub fn prepare_halt(&self, id: impl Into<PrimitiveId>) -> Result<(), ControlError> {
        let id = id.into();
        let target = self.host()?.reference(HALT_TARGET);
        info!(%id, address = %target.address, "prepare_halt: registering halt target");
        self.call_done(ControlRequest::RegisterCallback { id, target })
    }

    /// Halt the node registered under `id`; the halt's own outcome is not reported
    pub fn terminate_node(&self, id: impl Into<PrimitiveId>, exit_code: i32) -> Result<(), ControlError> {
        self.call_done(ControlRequest::TerminateNode { id: id.into(), exit_code })
    }

    // === Diagnostics ===

    /// Controller version
    pub fn ping(&self) -> Result<String, ControlError> {
        match self.call(ControlRequest::Ping)? {
            ControlResponse::Pong { version } => Ok(version),
            other => Err(unexpected("ping", other)),
        }
    }

    /// Join proxies currently parked on the controller
    pub fn list_proxies(&self) -> Result<Vec<ProxyInfo>, ControlError> {
        match self.call(ControlRequest::ListProxies)? {
            ControlResponse::Proxies { proxies } => Ok(proxies),
            other => Err(unexpected("list_proxies", other)),
        }
    }
}

fn unexpected(operation: &'static str, response: ControlResponse) -> ControlError {
    ControlError::UnexpectedResponse {
        operation,
        response: format!("{response:?}"),
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("watchers", &self.watchers)
            .field("host", &self.host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{HaltCallback, MethodInvoker};
    use crate::control::ControlAdapter;
    use crate::protocol::{ArgKind, FaultKind};
    use crate::testing::JoinStub;
    use crate::transport::LocalTransport;
    use parking_lot::Mutex;
    use primitives::LocalEngine;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn eventually(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn local(engine: Arc<dyn primitives::PrimitiveEngine>) -> (Arc<ControlAdapter>, Arc<LocalTransport>, NodeClient) {
        let adapter = Arc::new(ControlAdapter::new(engine));
        let transport = Arc::new(LocalTransport::new(adapter.clone()).unwrap());
        let client = NodeClient::new(transport.clone());
        (adapter, transport, client)
    }

    #[test]
    fn test_second_enlist_makes_no_remote_call() {
        let (adapter, transport, client) = local(Arc::new(JoinStub::new(true)));

        thread::scope(|s| {
            s.spawn(|| {
                assert!(client.join_enlist("j").unwrap());
                assert_eq!(transport.call_count(), 1);

                assert!(!client.join_enlist("j").unwrap());
                assert_eq!(transport.call_count(), 1);
                assert_eq!(client.watchers().len(), 1);
            });
        });

        // thread exit releases the proxy and clears the watcher entry
        assert!(eventually(|| adapter.proxies().is_empty()));
        assert!(eventually(|| client.watchers().is_empty()));
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_rejected_enlist_records_nothing() {
        let (adapter, transport, client) = local(Arc::new(JoinStub::new(false)));

        assert!(!client.join_enlist("j").unwrap());
        assert!(!client.join_enlist("j").unwrap());
        assert_eq!(transport.call_count(), 2);
        assert!(client.watchers().is_empty());
        assert!(adapter.proxies().is_empty());
    }

    #[test]
    fn test_enlist_fault_is_raised_without_state() {
        let (_adapter, _transport, client) = local(Arc::new(JoinStub::failing()));

        let err = client.join_enlist("j").unwrap_err();
        match &err {
            ControlError::Remote { operation, fault } => {
                assert_eq!(*operation, "enlist_start");
                assert_eq!(fault.kind, FaultKind::Engine);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(client.watchers().is_empty());
    }

    #[test]
    fn test_barrier_a_participant_leaves_when_thread_exits() {
        let stub = Arc::new(JoinStub::new(true));
        let adapter = Arc::new(ControlAdapter::new(stub.clone()));
        let node_1 = NodeClient::new(Arc::new(LocalTransport::new(adapter.clone()).unwrap()));
        let node_2 = NodeClient::new(Arc::new(LocalTransport::new(adapter.clone()).unwrap()));

        let id = PrimitiveId::from("barrier-A");
        let (node_1, node_2) = (&node_1, &node_2);

        // each enlisting thread stays alive until its leave channel fires
        let (enlisted_1_tx, enlisted_1_rx) = mpsc::channel();
        let (leave_1_tx, leave_1_rx) = mpsc::channel::<()>();
        let (enlisted_2_tx, enlisted_2_rx) = mpsc::channel();
        let (leave_2_tx, leave_2_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            s.spawn(move || {
                enlisted_1_tx.send(node_1.join_enlist("barrier-A").unwrap()).unwrap();
                let _ = leave_1_rx.recv();
            });
            assert!(enlisted_1_rx.recv().unwrap());
            assert_eq!(adapter.proxies().len(), 1);

            s.spawn(move || {
                enlisted_2_tx.send(node_2.join_enlist("barrier-A").unwrap()).unwrap();
                let _ = leave_2_rx.recv();
            });
            assert!(enlisted_2_rx.recv().unwrap());
            assert_eq!(adapter.proxies().len(), 2);
            assert!(node_1.is_join("barrier-A", 2).unwrap());

            // node 1's thread ends, so its watcher releases the first proxy
            leave_1_tx.send(()).unwrap();
            assert!(eventually(|| adapter.proxies().len() == 1));
            assert!(eventually(|| node_1.is_join("barrier-A", 1).unwrap()));
            assert!(eventually(|| node_1.watchers().is_empty()));
            assert_eq!(node_2.watchers().len(), 1);

            leave_2_tx.send(()).unwrap();
        });

        assert!(eventually(|| adapter.proxies().is_empty()));
        assert!(eventually(|| stub.live(&id) == 0));
    }

    #[test]
    fn test_primitives_pass_through() {
        let (_adapter, _transport, client) = local(Arc::new(LocalEngine::new()));

        assert!(client.create_counter("n", 1).unwrap());
        assert_eq!(client.increment_counter("n", 4).unwrap(), 5);
        assert_eq!(client.read_counter("n", true).unwrap(), 5);
        assert_eq!(client.read_counter("n", false).unwrap(), 0);

        assert!(client.create_count_down("c", 1).unwrap());
        assert!(client.count_down("c").unwrap());
        assert!(!client.is_count_down("c").unwrap());

        assert!(client.flag("f").unwrap());
        assert!(client.flagged("f").unwrap());
        assert!(!client.waiting("s").unwrap());
        assert!(client.elapsed_time("t").unwrap() >= 0);
        assert_eq!(client.ping().unwrap(), crate::VERSION);
    }

    #[test]
    fn test_invoke_unregistered_names_operation() {
        let (_adapter, _transport, client) = local(Arc::new(LocalEngine::new()));

        let err = client.invoke_callback("missing", vec![]).unwrap_err();
        assert!(matches!(err, ControlError::Remote { operation: "invoke_callback", .. }));
        assert_eq!(err.kind(), Some(FaultKind::NotRegistered));

        let err = client.terminate_node("ghost", -1).unwrap_err();
        assert_eq!(err.kind(), Some(FaultKind::NotRegistered));
    }

    #[test]
    fn test_callbacks_need_a_host() {
        let (_adapter, _transport, client) = local(Arc::new(LocalEngine::new()));
        let err = client.prepare_halt("node-1").unwrap_err();
        assert!(matches!(err, ControlError::NoCallbackHost));
    }

    #[test]
    fn test_registered_callback_resolves_by_runtime_kind() {
        let (adapter, _transport, client) = local(Arc::new(LocalEngine::new()));
        let client = client.start_callback_host("127.0.0.1:0").unwrap();

        let invoker = MethodInvoker::new("greet")
            .overload(&[ArgKind::Str], |args| {
                Ok(ArgValue::from(format!("hello {}", args[0].as_str().unwrap_or_default())))
            })
            .overload(&[ArgKind::Int], |args| Ok(ArgValue::Int(args[0].as_int().unwrap_or_default() + 1)))
            .overload(&[ArgKind::Any], |_| Ok(ArgValue::Null));
        client.register_callback("greeter", Arc::new(invoker)).unwrap();
        assert!(adapter.callbacks().contains(&PrimitiveId::from("greeter")));

        let value = client.invoke_callback("greeter", vec![ArgValue::Bool(true)]).unwrap();
        assert_eq!(value, ArgValue::Null);

        let err = client.invoke_callback("greeter", vec![ArgValue::from("x")]).unwrap_err();
        assert_eq!(err.kind(), Some(FaultKind::AmbiguousMethod));

        let err = client.invoke_callback("greeter", vec![]).unwrap_err();
        assert_eq!(err.kind(), Some(FaultKind::NoMatchingMethod));

        client.unregister_callback("greeter").unwrap();
        let err = client.invoke_callback("greeter", vec![ArgValue::Bool(true)]).unwrap_err();
        assert_eq!(err.kind(), Some(FaultKind::NotRegistered));
    }

    #[test]
    fn test_prepare_halt_then_terminate() {
        let (_adapter, _transport, client) = local(Arc::new(LocalEngine::new()));
        let client = client.start_callback_host("127.0.0.1:0").unwrap();

        let codes = Arc::new(Mutex::new(Vec::new()));
        let recorded = codes.clone();
        client
            .callback_host()
            .unwrap()
            .register(HALT_TARGET, Arc::new(HaltCallback::with_handler(move |code| recorded.lock().push(code))));

        client.prepare_halt("node-1").unwrap();
        client.terminate_node("node-1", -1).unwrap();
        client.terminate_node("node-1", 3).unwrap();
        assert_eq!(*codes.lock(), vec![-1, 3]);
    }
}
