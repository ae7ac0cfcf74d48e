//! Message types exchanged with the controller and with callback hosts
//!
//! JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.

use chrono::{DateTime, Utc};
use primitives::PrimitiveId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ArgValue, Fault};

/// Opaque key correlating a node-side enlist with its controller-side proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Fresh, time-ordered key
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Where a node-side callback target can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRef {
    /// `host:port` of the node's callback host
    pub address: String,
    /// Target name within that host
    pub target: String,
}

/// A parked join proxy, as reported by `ListProxies`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub key: SessionKey,
    pub id: PrimitiveId,
    pub thread_name: String,
    pub enlisted_at: DateTime<Utc>,
}

/// Requests from a node to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    // Signals
    Waiting { id: PrimitiveId },
    WaitFor { id: PrimitiveId, millis: u64 },
    SignalWake { id: PrimitiveId, must_meet: bool },
    SignalThrow { id: PrimitiveId, must_meet: bool },

    // Rendezvous
    CreateRendezvous { id: PrimitiveId, expected: i32, restartable: bool },
    IsRendezvous { id: PrimitiveId, expected: i32 },
    GetRendezvous { id: PrimitiveId, expected: i32 },
    Rendezvous { id: PrimitiveId },
    DeleteRendezvous { id: PrimitiveId, expected: i32 },

    // Joins
    CreateJoin { id: PrimitiveId, max: i32 },
    IsJoin { id: PrimitiveId, max: i32 },
    JoinWait { id: PrimitiveId, count: i32 },
    /// Enlist a controller-side proxy thread in the join
    EnlistStart { id: PrimitiveId },
    /// Release the proxy enlisted under `key`
    EnlistEnd { key: SessionKey },

    // Flags
    Flag { id: PrimitiveId },
    Flagged { id: PrimitiveId },
    Clear { id: PrimitiveId },

    // Countdowns
    CreateCountDown { id: PrimitiveId, count: i32 },
    IsCountDown { id: PrimitiveId },
    CountDown { id: PrimitiveId },

    // Counters
    CreateCounter { id: PrimitiveId, value: i32 },
    DeleteCounter { id: PrimitiveId },
    ReadCounter { id: PrimitiveId, zero: bool },
    IncrementCounter { id: PrimitiveId, amount: i32 },
    DecrementCounter { id: PrimitiveId },

    // Timers
    CreateTimer { id: PrimitiveId },
    DeleteTimer { id: PrimitiveId },
    ElapsedTime { id: PrimitiveId },
    ResetTimer { id: PrimitiveId },

    // Traces
    TraceOpen { id: PrimitiveId, file_name: String },
    TraceClose { id: PrimitiveId },
    Trace { id: PrimitiveId, message: String },
    TraceLine { id: PrimitiveId, message: String },

    // Callbacks
    TerminateNode { id: PrimitiveId, exit_code: i32 },
    RegisterCallback { id: PrimitiveId, target: CallbackRef },
    UnregisterCallback { id: PrimitiveId },
    InvokeCallback { id: PrimitiveId, args: Vec<ArgValue> },

    // Diagnostics
    Ping,
    ListProxies,
}

impl ControlRequest {
    /// Operation name used in logs and error context
    pub fn operation(&self) -> &'static str {
        match self {
            ControlRequest::Waiting { .. } => "waiting",
            ControlRequest::WaitFor { .. } => "wait_for",
            ControlRequest::SignalWake { .. } => "signal_wake",
            ControlRequest::SignalThrow { .. } => "signal_throw",
            ControlRequest::CreateRendezvous { .. } => "create_rendezvous",
            ControlRequest::IsRendezvous { .. } => "is_rendezvous",
            ControlRequest::GetRendezvous { .. } => "get_rendezvous",
            ControlRequest::Rendezvous { .. } => "rendezvous",
            ControlRequest::DeleteRendezvous { .. } => "delete_rendezvous",
            ControlRequest::CreateJoin { .. } => "create_join",
            ControlRequest::IsJoin { .. } => "is_join",
            ControlRequest::JoinWait { .. } => "join_wait",
            ControlRequest::EnlistStart { .. } => "enlist_start",
            ControlRequest::EnlistEnd { .. } => "enlist_end",
            ControlRequest::Flag { .. } => "flag",
            ControlRequest::Flagged { .. } => "flagged",
            ControlRequest::Clear { .. } => "clear",
            ControlRequest::CreateCountDown { .. } => "create_count_down",
            ControlRequest::IsCountDown { .. } => "is_count_down",
            ControlRequest::CountDown { .. } => "count_down",
            ControlRequest::CreateCounter { .. } => "create_counter",
            ControlRequest::DeleteCounter { .. } => "delete_counter",
            ControlRequest::ReadCounter { .. } => "read_counter",
            ControlRequest::IncrementCounter { .. } => "increment_counter",
            ControlRequest::DecrementCounter { .. } => "decrement_counter",
            ControlRequest::CreateTimer { .. } => "create_timer",
            ControlRequest::DeleteTimer { .. } => "delete_timer",
            ControlRequest::ElapsedTime { .. } => "elapsed_time",
            ControlRequest::ResetTimer { .. } => "reset_timer",
            ControlRequest::TraceOpen { .. } => "trace_open",
            ControlRequest::TraceClose { .. } => "trace_close",
            ControlRequest::Trace { .. } => "trace",
            ControlRequest::TraceLine { .. } => "trace_line",
            ControlRequest::TerminateNode { .. } => "terminate_node",
            ControlRequest::RegisterCallback { .. } => "register_callback",
            ControlRequest::UnregisterCallback { .. } => "unregister_callback",
            ControlRequest::InvokeCallback { .. } => "invoke_callback",
            ControlRequest::Ping => "ping",
            ControlRequest::ListProxies => "list_proxies",
        }
    }
}

/// Responses from the controller to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlResponse {
    Bool { value: bool },
    Int { value: i32 },
    Long { value: i64 },
    Done,
    /// Absent key means the enlist was rejected
    SessionKey { key: Option<SessionKey> },
    Value { value: ArgValue },
    Pong { version: String },
    Proxies { proxies: Vec<ProxyInfo> },
    Fault { fault: Fault },
}

impl ControlResponse {
    pub fn bool(value: bool) -> Self {
        ControlResponse::Bool { value }
    }

    pub fn int(value: i32) -> Self {
        ControlResponse::Int { value }
    }

    pub fn long(value: i64) -> Self {
        ControlResponse::Long { value }
    }
}

/// Requests from the controller to a node's callback host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallbackRequest {
    Invoke { target: String, args: Vec<ArgValue> },
}

/// Responses from a callback host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallbackResponse {
    Value { value: ArgValue },
    Fault { fault: Fault },
}
