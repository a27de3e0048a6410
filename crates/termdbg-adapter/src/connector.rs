use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use termdbg_dap::{DapClient, DapError, DebugChannel};
use tracing::info;

use crate::descriptor::AdapterDescriptor;

/// Opens a ready-to-use channel for a descriptor.
///
/// The returned channel has completed the start-up handshake: the debuggee
/// is launched or attached and configuration is done.
#[async_trait]
pub trait AdapterConnector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &AdapterDescriptor,
    ) -> Result<Arc<dyn DebugChannel>, DapError>;
}

/// Spawns the descriptor's adapter process and talks DAP over its stdio.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    request_timeout: Duration,
}

impl ProcessConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl AdapterConnector for ProcessConnector {
    async fn connect(
        &self,
        descriptor: &AdapterDescriptor,
    ) -> Result<Arc<dyn DebugChannel>, DapError> {
        let client = DapClient::spawn(&descriptor.executable, self.request_timeout)?;
        info!(
            adapter = %descriptor.adapter_type,
            program = %descriptor.executable.program,
            "adapter process started"
        );
        // Dropping the client on failure kills the adapter process.
        let caps = client
            .start_session(
                &descriptor.executable.adapter_id,
                descriptor.session_request(),
                descriptor.request_arguments.clone(),
            )
            .await?;
        info!(
            adapter = %descriptor.adapter_type,
            configuration_done = caps.supports_configuration_done_request.unwrap_or(false),
            "debug session started"
        );
        Ok(Arc::new(client))
    }
}
