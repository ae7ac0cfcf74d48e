//! Engine error types

use std::path::PathBuf;
use thiserror::Error;

use crate::PrimitiveId;

/// Errors raised by primitive engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Signal thrown at waiter on '{id}'")]
    SignalThrown { id: PrimitiveId },

    #[error("Trace '{id}' failed writing to {path}")]
    TraceIo {
        id: PrimitiveId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument for '{id}': {reason}")]
    InvalidArgument { id: PrimitiveId, reason: String },
}

impl EngineError {
    /// Identifier of the primitive the error concerns
    pub fn id(&self) -> &PrimitiveId {
        match self {
            EngineError::SignalThrown { id } => id,
            EngineError::TraceIo { id, .. } => id,
            EngineError::InvalidArgument { id, .. } => id,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
