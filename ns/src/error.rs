//! Errors returned by the node client

use thiserror::Error;

use crate::protocol::{Fault, FaultKind};

#[derive(Debug, Error)]
pub enum ControlError {
    /// The controller, or the transport to it, raised a fault
    #[error("Remote call '{operation}' failed")]
    Remote {
        operation: &'static str,
        #[source]
        fault: Fault,
    },

    #[error("Unexpected response to '{operation}': {response}")]
    UnexpectedResponse { operation: &'static str, response: String },

    #[error("Failed to start join watcher")]
    Watcher(#[source] std::io::Error),

    #[error("No callback host attached to this client")]
    NoCallbackHost,
}

impl ControlError {
    /// The carried fault, for remote failures
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ControlError::Remote { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<FaultKind> {
        self.fault().map(|f| f.kind)
    }
}
