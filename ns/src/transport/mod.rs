//! Node-side transports to the controller
//!
//! The node API is synchronous so it can be called from any thread. Each
//! transport owns a small tokio runtime for its IO and blocks the caller on it.
//! Callers must not be running on an async executor themselves.

pub mod local;
pub mod tcp;

pub use local::LocalTransport;
pub use tcp::TcpTransport;

use tokio::runtime::{self, Runtime};

use crate::protocol::{ControlRequest, ControlResponse, Fault};

/// Delivers one request to the controller and returns its response
///
/// `Err` is a failure to deliver; faults raised by the controller come back
/// as `Ok(ControlResponse::Fault { .. })`.
pub trait Transport: Send + Sync {
    fn call(&self, request: ControlRequest) -> Result<ControlResponse, Fault>;

    /// Runtime the transport's IO runs on, shared with node-side services
    fn handle(&self) -> runtime::Handle;
}

/// Single-worker runtime for a transport
pub(crate) fn io_runtime(name: &str) -> std::io::Result<Runtime> {
    runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(name)
        .enable_all()
        .build()
}
