//! Wire protocol shared by the controller, nodes and callback hosts

pub mod args;
pub mod fault;
pub mod framing;
pub mod messages;

pub use args::{ArgKind, ArgValue};
pub use fault::{Fault, FaultKind};
pub use framing::{FrameError, read_frame, write_frame};
pub use messages::{CallbackRef, CallbackRequest, CallbackResponse, ControlRequest, ControlResponse, ProxyInfo, SessionKey};
