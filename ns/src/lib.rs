//! nodesync - synchronization primitives shared between a controller and its nodes
//!
//! The controller owns every primitive through a [`primitives::PrimitiveEngine`]
//! and serves them over TCP. Nodes reach it through [`NodeClient`]. Two parts
//! need more than a pass-through: joins, whose outcome depends on when a
//! specific node thread exits, and callbacks, which let the controller call
//! back into a node, including to halt it.

pub mod callback;
pub mod cli;
pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod join;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::{
    Callback, CallbackEndpoint, CallbackHost, CallbackRegistry, HALT_TARGET, HaltCallback, InvokeError,
    LocalEndpoint, MethodInvoker, RemoteEndpoint,
};
pub use client::NodeClient;
pub use config::Config;
pub use control::{ControlAdapter, ControlServer};
pub use error::ControlError;
pub use join::{JoinProxyTable, JoinWatchers};
pub use protocol::{ArgKind, ArgValue, CallbackRef, ControlRequest, ControlResponse, Fault, FaultKind, ProxyInfo, SessionKey};
pub use transport::{LocalTransport, TcpTransport, Transport};

/// Version reported by `Ping`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
