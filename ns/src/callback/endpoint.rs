//! Callback endpoints: how the controller reaches a target

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::debug;

use super::method::Callback;
use super::registry::CallbackEndpoint;
use crate::protocol::{
    ArgValue, CallbackRef, CallbackRequest, CallbackResponse, Fault, FaultKind, read_frame, write_frame,
};

/// Target on a node's callback host, one connection per invocation
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    target: CallbackRef,
    connect_timeout: Duration,
}

impl RemoteEndpoint {
    pub fn new(target: CallbackRef, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
        }
    }
}

#[async_trait]
impl CallbackEndpoint for RemoteEndpoint {
    async fn invoke(&self, args: Vec<ArgValue>) -> Result<ArgValue, Fault> {
        let CallbackRef { address, target } = &self.target;
        debug!(%address, %target, "RemoteEndpoint::invoke: connecting");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| Fault::new(FaultKind::Transport, format!("Timed out connecting to callback host {address}")))?
            .map_err(|e| {
                Fault::from_error(FaultKind::Transport, &e).context(format!("Failed to connect to callback host {address}"))
            })?;

        let (read_half, mut write_half) = stream.into_split();
        let request = CallbackRequest::Invoke {
            target: target.clone(),
            args,
        };
        write_frame(&mut write_half, &request).await?;

        let mut reader = BufReader::new(read_half);
        match read_frame::<_, CallbackResponse>(&mut reader).await? {
            Some(CallbackResponse::Value { value }) => Ok(value),
            Some(CallbackResponse::Fault { fault }) => Err(fault),
            None => Err(Fault::new(
                FaultKind::Transport,
                format!("Callback host {address} closed the connection without responding"),
            )),
        }
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.target.target, self.target.address)
    }
}

/// Target living in the controller process
pub struct LocalEndpoint {
    callback: Arc<dyn Callback>,
}

impl LocalEndpoint {
    pub fn new(callback: Arc<dyn Callback>) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl CallbackEndpoint for LocalEndpoint {
    async fn invoke(&self, args: Vec<ArgValue>) -> Result<ArgValue, Fault> {
        let callback = self.callback.clone();
        tokio::task::spawn_blocking(move || callback.invoke(&args))
            .await
            .map_err(|e| Fault::new(FaultKind::Invocation, format!("Local callback panicked: {e}")))?
            .map_err(Fault::from)
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
