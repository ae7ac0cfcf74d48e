//! Faults carried across the process boundary
//!
//! Every failure that leaves the controller or a callback host travels as a
//! [`Fault`]: a kind, a message and, when the failure had underlying causes,
//! the nested cause chain.

use std::error::Error as StdError;

use primitives::EngineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distinguishing kind of a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// No callback or halt target registered under the identifier
    NotRegistered,
    NoMatchingMethod,
    AmbiguousMethod,
    /// Raised by the primitive engine
    Engine,
    /// Raised by a callback target or a controller-side worker
    Invocation,
    /// Connection or IO failure
    Transport,
    /// Malformed or unexpected frame
    Protocol,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FaultKind::NotRegistered => "not-registered",
            FaultKind::NoMatchingMethod => "no-matching-method",
            FaultKind::AmbiguousMethod => "ambiguous-method",
            FaultKind::Engine => "engine",
            FaultKind::Invocation => "invocation",
            FaultKind::Transport => "transport",
            FaultKind::Protocol => "protocol",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("[{kind}] {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[source]
    pub cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn not_registered(id: impl std::fmt::Display) -> Self {
        Self::new(FaultKind::NotRegistered, format!("Nothing registered under '{id}'"))
    }

    /// Build a fault from an error and its `source()` chain, outermost first
    pub fn from_error(kind: FaultKind, error: &(dyn StdError + 'static)) -> Self {
        let messages = std::iter::successors(Some(error), |&e| e.source()).map(|e| e.to_string());
        Self::nest(kind, messages.collect())
    }

    /// Build a fault from an eyre report's chain
    pub fn from_report(kind: FaultKind, report: &eyre::Report) -> Self {
        Self::nest(kind, report.chain().map(|e| e.to_string()).collect())
    }

    fn nest(kind: FaultKind, messages: Vec<String>) -> Self {
        messages
            .into_iter()
            .rev()
            .fold(None, |cause: Option<Fault>, message| {
                Some(Fault {
                    kind,
                    message,
                    cause: cause.map(Box::new),
                })
            })
            .unwrap_or_else(|| Fault::new(kind, "unknown error"))
    }

    /// Wrap with an outer message; the kind is kept and `self` becomes the cause
    pub fn context(self, message: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    /// Innermost fault of the chain
    pub fn root(&self) -> &Fault {
        let mut fault = self;
        while let Some(cause) = &fault.cause {
            fault = cause;
        }
        fault
    }

    /// Number of faults in the chain, including this one
    pub fn depth(&self) -> usize {
        1 + self.cause.as_ref().map_or(0, |c| c.depth())
    }
}

impl From<&EngineError> for Fault {
    fn from(err: &EngineError) -> Self {
        Fault::from_error(FaultKind::Engine, err)
    }
}

impl From<EngineError> for Fault {
    fn from(err: EngineError) -> Self {
        Fault::from(&err)
    }
}
