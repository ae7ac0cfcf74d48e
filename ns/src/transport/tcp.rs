//! TCP transport: one connection per call

use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::runtime::{Handle, Runtime};
use tracing::debug;

use super::{Transport, io_runtime};
use crate::protocol::{ControlRequest, ControlResponse, Fault, FaultKind, read_frame, write_frame};

/// Default timeout for connecting to the controller
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    runtime: Runtime,
}

impl TcpTransport {
    /// Transport to the controller at `address` (`host:port`)
    pub fn new(address: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            runtime: io_runtime("nodesync-io")?,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call_async(&self, request: ControlRequest) -> Result<ControlResponse, Fault> {
        debug!(address = %self.address, operation = request.operation(), "TcpTransport: sending request");

        // Only the connect is bounded; calls such as rendezvous block for as long as they need
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                Fault::new(
                    FaultKind::Transport,
                    format!("Timed out connecting to controller at {}", self.address),
                )
            })?
            .map_err(|e| {
                Fault::from_error(FaultKind::Transport, &e)
                    .context(format!("Failed to connect to controller at {}", self.address))
            })?;

        let (read_half, mut write_half) = stream.into_split();
        write_frame(&mut write_half, &request).await?;

        let mut reader = BufReader::new(read_half);
        let response: ControlResponse = read_frame(&mut reader)
            .await?
            .ok_or_else(|| Fault::new(FaultKind::Transport, "Controller closed the connection without responding"))?;

        debug!(?response, "TcpTransport: received response");
        Ok(response)
    }
}

impl Transport for TcpTransport {
    fn call(&self, request: ControlRequest) -> Result<ControlResponse, Fault> {
        self.runtime.block_on(self.call_async(request))
    }

    fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}
