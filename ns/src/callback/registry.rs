//! Controller-side callback registry

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use primitives::PrimitiveId;
use tracing::{debug, info, warn};

use crate::protocol::{ArgValue, Fault};

/// A callback target as seen from the controller
#[async_trait]
pub trait CallbackEndpoint: Send + Sync {
    async fn invoke(&self, args: Vec<ArgValue>) -> Result<ArgValue, Fault>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Identifier to endpoint table
#[derive(Default)]
pub struct CallbackRegistry {
    endpoints: DashMap<PrimitiveId, Arc<dyn CallbackEndpoint>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `endpoint` under `id`, replacing any previous registration
    pub fn register(&self, id: PrimitiveId, endpoint: Arc<dyn CallbackEndpoint>) {
        let endpoint_desc = endpoint.describe();
        match self.endpoints.insert(id.clone(), endpoint) {
            Some(previous) => info!(%id, endpoint = %endpoint_desc, previous = %previous.describe(), "register: replaced"),
            None => info!(%id, endpoint = %endpoint_desc, "register: registered"),
        }
    }

    /// Remove the registration for `id`; unknown ids are ignored
    pub fn unregister(&self, id: &PrimitiveId) -> bool {
        let removed = self.endpoints.remove(id).is_some();
        debug!(%id, removed, "unregister: called");
        removed
    }

    pub fn contains(&self, id: &PrimitiveId) -> bool {
        self.endpoints.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn lookup(&self, id: &PrimitiveId) -> Result<Arc<dyn CallbackEndpoint>, Fault> {
        self.endpoints
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Fault::not_registered(id))
    }

    /// Invoke the endpoint registered under `id`
    pub async fn invoke(&self, id: &PrimitiveId, args: Vec<ArgValue>) -> Result<ArgValue, Fault> {
        let endpoint = self.lookup(id)?;
        debug!(%id, endpoint = %endpoint.describe(), args = args.len(), "invoke: called");
        endpoint.invoke(args).await.map_err(|fault| {
            warn!(%id, %fault, "invoke: callback failed");
            fault.context(format!("Callback '{id}' failed"))
        })
    }

    /// Invoke the halt target registered under `id` with `exit_code`
    ///
    /// The outcome of the halt itself is not reported: a halted node usually
    /// drops the connection before it can answer.
    pub async fn terminate(&self, id: &PrimitiveId, exit_code: i32) -> Result<(), Fault> {
        let endpoint = self.lookup(id)?;
        info!(%id, exit_code, endpoint = %endpoint.describe(), "terminate: halting node");
        match endpoint.invoke(vec![ArgValue::Int(exit_code)]).await {
            Ok(_) => debug!(%id, "terminate: halt returned"),
            Err(fault) => debug!(%id, %fault, "terminate: ignoring halt outcome"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints: Vec<(String, String)> = self
            .endpoints
            .iter()
            .map(|e| (e.key().to_string(), e.value().describe()))
            .collect();
        f.debug_struct("CallbackRegistry").field("endpoints", &endpoints).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{HaltCallback, LocalEndpoint, MethodInvoker};
    use crate::protocol::{ArgKind, FaultKind};
    use parking_lot::Mutex;

    fn echo(name: &str) -> Arc<dyn CallbackEndpoint> {
        let name = name.to_string();
        Arc::new(LocalEndpoint::new(Arc::new(
            MethodInvoker::new("echo").overload(&[ArgKind::Str], move |args| {
                Ok(ArgValue::from(format!("{name}:{}", args[0].as_str().unwrap_or_default())))
            }),
        )))
    }

    #[tokio::test]
    async fn test_invoke_unregistered_is_not_registered() {
        let registry = CallbackRegistry::new();
        let fault = registry.invoke(&PrimitiveId::from("cb"), vec![]).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::NotRegistered);
    }

    #[tokio::test]
    async fn test_register_invoke_and_overwrite() {
        let registry = CallbackRegistry::new();
        let id = PrimitiveId::from("cb");

        registry.register(id.clone(), echo("first"));
        let value = registry.invoke(&id, vec![ArgValue::from("x")]).await.unwrap();
        assert_eq!(value, ArgValue::from("first:x"));

        registry.register(id.clone(), echo("second"));
        assert_eq!(registry.len(), 1);
        let value = registry.invoke(&id, vec![ArgValue::from("x")]).await.unwrap();
        assert_eq!(value, ArgValue::from("second:x"));
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unregister(&PrimitiveId::from("nope")));

        registry.register(PrimitiveId::from("cb"), echo("a"));
        assert!(registry.unregister(&PrimitiveId::from("cb")));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_fault_is_wrapped_keeping_kind() {
        let registry = CallbackRegistry::new();
        let id = PrimitiveId::from("cb");
        registry.register(id.clone(), echo("a"));

        let fault = registry.invoke(&id, vec![ArgValue::Int(1)]).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::NoMatchingMethod);
        assert!(fault.message.contains("'cb'"));
        assert_eq!(fault.cause.as_ref().map(|c| c.kind), Some(FaultKind::NoMatchingMethod));
    }

    #[tokio::test]
    async fn test_terminate_passes_exit_code() {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let recorded = codes.clone();
        let halt = HaltCallback::with_handler(move |code| recorded.lock().push(code));

        let registry = CallbackRegistry::new();
        let id = PrimitiveId::from("node-1");
        registry.register(id.clone(), Arc::new(LocalEndpoint::new(Arc::new(halt))));

        registry.terminate(&id, 7).await.unwrap();
        registry.terminate(&id, -1).await.unwrap();
        assert_eq!(*codes.lock(), vec![7, -1]);
    }

    #[tokio::test]
    async fn test_terminate_ignores_halt_fault() {
        let registry = CallbackRegistry::new();
        let id = PrimitiveId::from("node-1");
        // echo has no int overload, so the halt invocation faults
        registry.register(id.clone(), echo("a"));
        assert!(registry.terminate(&id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_terminate_unknown_is_not_registered() {
        let registry = CallbackRegistry::new();
        let fault = registry.terminate(&PrimitiveId::from("ghost"), -1).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::NotRegistered);
    }
}
