//! In-process transport driving a [`ControlAdapter`] directly

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Handle, Runtime};
use tracing::debug;

use super::{Transport, io_runtime};
use crate::control::ControlAdapter;
use crate::protocol::{ControlRequest, ControlResponse, Fault};

/// Transport for a controller living in the same process
///
/// Counts every call so tests can assert what reached the controller.
#[derive(Debug)]
pub struct LocalTransport {
    adapter: Arc<ControlAdapter>,
    runtime: Runtime,
    calls: AtomicUsize,
}

impl LocalTransport {
    pub fn new(adapter: Arc<ControlAdapter>) -> std::io::Result<Self> {
        Ok(Self {
            adapter,
            runtime: io_runtime("nodesync-local")?,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn adapter(&self) -> &Arc<ControlAdapter> {
        &self.adapter
    }

    /// Number of requests delivered so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for LocalTransport {
    fn call(&self, request: ControlRequest) -> Result<ControlResponse, Fault> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(operation = request.operation(), count, "LocalTransport: dispatching");
        Ok(self.runtime.block_on(self.adapter.dispatch(request)))
    }

    fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}
