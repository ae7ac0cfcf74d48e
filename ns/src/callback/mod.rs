//! Callbacks from the controller into nodes
//!
//! The controller keeps a [`CallbackRegistry`] of endpoints by identifier.
//! Nodes serve their targets from a [`CallbackHost`]; a target picks the
//! method overload to run from the runtime kinds of the arguments.

pub mod endpoint;
pub mod host;
pub mod method;
pub mod registry;

pub use endpoint::{LocalEndpoint, RemoteEndpoint};
pub use host::{CallbackHost, DEFAULT_EXIT_CODE, HALT_TARGET, HaltCallback};
pub use method::{Callback, InvokeError, MethodInvoker};
pub use registry::{CallbackEndpoint, CallbackRegistry};
