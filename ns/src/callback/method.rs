//! Node-side callback targets and overload resolution

use thiserror::Error;
use tracing::debug;

use crate::protocol::args::signature;
use crate::protocol::{ArgKind, ArgValue, Fault, FaultKind};

/// Something the controller can invoke on a node
pub trait Callback: Send + Sync {
    fn invoke(&self, args: &[ArgValue]) -> Result<ArgValue, InvokeError>;
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("No overload of '{method}' accepts ({signature})")]
    NoMatchingMethod { method: String, signature: String },

    #[error("{count} overloads of '{method}' accept ({signature})")]
    AmbiguousMethod {
        method: String,
        signature: String,
        count: usize,
    },

    #[error("'{method}' failed: {report}")]
    Failed { method: String, report: eyre::Report },
}

impl From<InvokeError> for Fault {
    fn from(err: InvokeError) -> Self {
        match &err {
            InvokeError::NoMatchingMethod { .. } => Fault::new(FaultKind::NoMatchingMethod, err.to_string()),
            InvokeError::AmbiguousMethod { .. } => Fault::new(FaultKind::AmbiguousMethod, err.to_string()),
            InvokeError::Failed { method, report } => {
                Fault::from_report(FaultKind::Invocation, report).context(format!("'{method}' failed"))
            }
        }
    }
}

type Handler = Box<dyn Fn(&[ArgValue]) -> eyre::Result<ArgValue> + Send + Sync>;

struct Overload {
    params: Vec<ArgKind>,
    handler: Handler,
}

impl Overload {
    fn accepts(&self, args: &[ArgValue]) -> bool {
        self.params.len() == args.len() && self.params.iter().zip(args).all(|(kind, arg)| kind.accepts(arg))
    }
}

/// A named method with one or more overloads
///
/// The overload to run is chosen from the runtime kinds of the arguments: the
/// arity must match and every declared parameter must accept its argument.
/// Exactly one overload must match.
pub struct MethodInvoker {
    method: String,
    overloads: Vec<Overload>,
}

impl MethodInvoker {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            overloads: Vec::new(),
        }
    }

    /// Add an overload taking parameters of the given kinds
    pub fn overload<F>(mut self, params: &[ArgKind], handler: F) -> Self
    where
        F: Fn(&[ArgValue]) -> eyre::Result<ArgValue> + Send + Sync + 'static,
    {
        self.overloads.push(Overload {
            params: params.to_vec(),
            handler: Box::new(handler),
        });
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    fn resolve(&self, args: &[ArgValue]) -> Result<&Overload, InvokeError> {
        let mut matching = self.overloads.iter().filter(|o| o.accepts(args));
        match (matching.next(), matching.count()) {
            (Some(overload), 0) => Ok(overload),
            (None, _) => Err(InvokeError::NoMatchingMethod {
                method: self.method.clone(),
                signature: signature(args),
            }),
            (Some(_), others) => Err(InvokeError::AmbiguousMethod {
                method: self.method.clone(),
                signature: signature(args),
                count: others + 1,
            }),
        }
    }
}

impl std::fmt::Debug for MethodInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let overloads: Vec<_> = self.overloads.iter().map(|o| &o.params).collect();
        f.debug_struct("MethodInvoker")
            .field("method", &self.method)
            .field("overloads", &overloads)
            .finish()
    }
}

impl Callback for MethodInvoker {
    fn invoke(&self, args: &[ArgValue]) -> Result<ArgValue, InvokeError> {
        debug!(method = %self.method, signature = %signature(args), "MethodInvoker::invoke: called");
        let overload = self.resolve(args)?;
        (overload.handler)(args).map_err(|report| InvokeError::Failed {
            method: self.method.clone(),
            report,
        })
    }
}
