//! Node-side callback host
//!
//! Listens for `CallbackRequest`s from the controller and runs the named
//! target. Every host carries the halt target, so a node that has called
//! `prepare_halt` can always be terminated by the controller.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use eyre::{Context, Result};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::method::{Callback, InvokeError, MethodInvoker};
use crate::protocol::{
    ArgKind, ArgValue, CallbackRef, CallbackRequest, CallbackResponse, Fault, FaultKind, FrameError, read_frame,
    write_frame,
};

/// Reserved target name of the halt callback
pub const HALT_TARGET: &str = "__halt__";

/// Exit status used when halt is invoked without arguments
pub const DEFAULT_EXIT_CODE: i32 = -1;

type HaltHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Halts the owning process
///
/// Takes no argument (status -1) or one `Int` status. The default handler
/// exits immediately without unwinding or running destructors on other threads.
pub struct HaltCallback {
    invoker: MethodInvoker,
}

impl HaltCallback {
    /// Halt with `handler` instead of exiting the process
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        let handler: HaltHandler = Arc::new(handler);
        let no_args = handler.clone();
        let invoker = MethodInvoker::new("halt")
            .overload(&[], move |_| {
                no_args(DEFAULT_EXIT_CODE);
                Ok(ArgValue::Null)
            })
            .overload(&[ArgKind::Int], move |args| {
                handler(args[0].as_int().unwrap_or(DEFAULT_EXIT_CODE));
                Ok(ArgValue::Null)
            });
        Self { invoker }
    }
}

impl Default for HaltCallback {
    fn default() -> Self {
        Self::with_handler(|code| {
            error!(code, "HaltCallback: halting process");
            // _exit skips atexit handlers and stdio flushing
            unsafe { nix::libc::_exit(code) }
        })
    }
}

impl Callback for HaltCallback {
    fn invoke(&self, args: &[ArgValue]) -> Result<ArgValue, InvokeError> {
        self.invoker.invoke(args)
    }
}

type Targets = Arc<DashMap<String, Arc<dyn Callback>>>;

/// TCP endpoint serving this node's callback targets
pub struct CallbackHost {
    targets: Targets,
    local_addr: SocketAddr,
    advertise_host: Option<String>,
    task: JoinHandle<()>,
}

impl CallbackHost {
    /// Bind to `addr` and start serving on the current runtime
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context(format!("Failed to bind callback host on {addr}"))?;
        let local_addr = listener.local_addr().context("Failed to read callback host address")?;

        let targets: Targets = Arc::new(DashMap::new());
        targets.insert(HALT_TARGET.to_string(), Arc::new(HaltCallback::default()));

        let task = tokio::spawn(accept_loop(listener, targets.clone()));
        info!(%local_addr, "CallbackHost: listening");

        Ok(Self {
            targets,
            local_addr,
            advertise_host: None,
            task,
        })
    }

    /// Host name the controller should use to reach this node
    pub fn with_advertise_host(mut self, host: impl Into<String>) -> Self {
        self.advertise_host = Some(host.into());
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `host:port` the controller connects to
    pub fn advertised_address(&self) -> String {
        match &self.advertise_host {
            Some(host) => format!("{host}:{}", self.local_addr.port()),
            None => self.local_addr.to_string(),
        }
    }

    /// Register or replace a target
    pub fn register(&self, target: impl Into<String>, callback: Arc<dyn Callback>) {
        let target = target.into();
        debug!(%target, "CallbackHost::register: called");
        self.targets.insert(target, callback);
    }

    pub fn unregister(&self, target: &str) -> bool {
        self.targets.remove(target).is_some()
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    /// Reference to `target` on this host
    pub fn reference(&self, target: impl Into<String>) -> CallbackRef {
        CallbackRef {
            address: self.advertised_address(),
            target: target.into(),
        }
    }
}

impl std::fmt::Debug for CallbackHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<String> = self.targets.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("CallbackHost")
            .field("local_addr", &self.local_addr)
            .field("advertise_host", &self.advertise_host)
            .field("targets", &targets)
            .finish()
    }
}

impl Drop for CallbackHost {
    fn drop(&mut self) {
        debug!(local_addr = %self.local_addr, "CallbackHost: stopping");
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, targets: Targets) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "CallbackHost: accepted connection");
                let targets = targets.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, targets).await {
                        warn!(%peer, error = %e, "CallbackHost: connection failed");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "CallbackHost: accept failed");
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, targets: Targets) -> Result<(), FrameError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match read_frame::<_, CallbackRequest>(&mut reader).await {
        Ok(Some(CallbackRequest::Invoke { target, args })) => invoke_target(&targets, target, args).await,
        Ok(None) => return Ok(()),
        Err(e) => CallbackResponse::Fault { fault: Fault::from(&e) },
    };
    write_frame(&mut write_half, &response).await
}

async fn invoke_target(targets: &Targets, target: String, args: Vec<ArgValue>) -> CallbackResponse {
    let Some(callback) = targets.get(&target).map(|entry| Arc::clone(entry.value())) else {
        warn!(%target, "CallbackHost: unknown target");
        return CallbackResponse::Fault {
            fault: Fault::not_registered(&target),
        };
    };

    debug!(%target, args = args.len(), "CallbackHost: invoking");
    match tokio::task::spawn_blocking(move || callback.invoke(&args)).await {
        Ok(Ok(value)) => CallbackResponse::Value { value },
        Ok(Err(e)) => {
            warn!(%target, error = %e, "CallbackHost: target failed");
            CallbackResponse::Fault { fault: Fault::from(e) }
        }
        Err(e) => CallbackResponse::Fault {
            fault: Fault::new(FaultKind::Invocation, format!("Target '{target}' panicked: {e}")),
        },
    }
}
