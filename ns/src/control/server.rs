//! TCP server exposing a [`ControlAdapter`]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::ControlAdapter;
use crate::protocol::{ControlRequest, ControlResponse, Fault, FrameError, read_frame, write_frame};

pub struct ControlServer {
    listener: TcpListener,
    adapter: Arc<ControlAdapter>,
}

impl ControlServer {
    pub async fn bind(addr: &str, adapter: Arc<ControlAdapter>) -> Result<Self> {
        debug!(%addr, "ControlServer::bind: called");
        let listener = TcpListener::bind(addr)
            .await
            .context(format!("Failed to bind controller on {addr}"))?;
        Ok(Self { listener, adapter })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read controller address")
    }

    pub fn adapter(&self) -> &Arc<ControlAdapter> {
        &self.adapter
    }

    /// Serve connections until `shutdown` completes
    ///
    /// In-flight connections keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = ?self.listener.local_addr().ok(), "ControlServer: serving");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(parked = self.adapter.proxies().len(), "ControlServer: shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "ControlServer: accepted connection");
                        let adapter = Arc::clone(&self.adapter);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, adapter).await {
                                warn!(%peer, error = %e, "ControlServer: connection failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "ControlServer: accept failed"),
                }
            }
        }
    }
}

/// Answer requests on one connection until the peer closes it
async fn serve_connection(stream: TcpStream, adapter: Arc<ControlAdapter>) -> Result<(), FrameError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request = match read_frame::<_, ControlRequest>(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(FrameError::Io(e)) => return Err(FrameError::Io(e)),
            Err(e) => {
                // answer malformed frames once, then drop the connection
                let response = ControlResponse::Fault { fault: Fault::from(&e) };
                write_frame(&mut write_half, &response).await?;
                return Err(e);
            }
        };

        let response = adapter.dispatch(request).await;
        write_frame(&mut write_half, &response).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FaultKind;
    use primitives::LocalEngine;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let adapter = Arc::new(ControlAdapter::new(Arc::new(LocalEngine::new())));
        let server = ControlServer::bind("127.0.0.1:0", adapter).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));
        (addr, stop_tx, handle)
    }

    #[tokio::test]
    async fn test_sequential_requests_on_one_connection() {
        let (addr, stop, handle) = start().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_frame(&mut write_half, &ControlRequest::Ping).await.unwrap();
        let first: ControlResponse = read_frame(&mut reader).await.unwrap().unwrap();
        assert!(matches!(first, ControlResponse::Pong { .. }));

        write_frame(&mut write_half, &ControlRequest::ListProxies).await.unwrap();
        let second: ControlResponse = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(second, ControlResponse::Proxies { proxies: vec![] });

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_protocol_fault() {
        let (addr, stop, handle) = start().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"{\"type\":\"Bogus\"}\n").await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: ControlResponse = serde_json::from_str(line.trim()).unwrap();
        match response {
            ControlResponse::Fault { fault } => assert_eq!(fault.kind, FaultKind::Protocol),
            other => panic!("expected fault, got {other:?}"),
        }

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
