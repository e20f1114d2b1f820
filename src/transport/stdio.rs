//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations. Logs must
//! therefore never go to stdout.

use crate::db::ConnectionPool;
use crate::error::{GatewayError, GatewayResult};
use crate::mcp::PosService;
use crate::transport::{Transport, force_exit_on_second_signal, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::time::Duration;
use tracing::{info, warn};

/// Stdio transport implementation.
pub struct StdioTransport<P: ConnectionPool> {
    service: PosService<P>,
    shutdown_grace: Duration,
}

impl<P: ConnectionPool> StdioTransport<P> {
    pub fn new(service: PosService<P>, shutdown_grace: Duration) -> Self {
        Self {
            service,
            shutdown_grace,
        }
    }
}

impl<P: ConnectionPool> Transport for StdioTransport<P> {
    async fn run(&self) -> GatewayResult<()> {
        info!("Starting MCP server with stdio transport");

        let running_service = self.service.clone().serve(stdio()).await.map_err(|e| {
            GatewayError::internal(format!("Failed to start stdio transport: {}", e))
        })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(quit_reason) => {
                        info!(reason = ?quit_reason, "Stdio transport completed");
                    }
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.service.shutdown(self.shutdown_grace).await;
                        return Err(GatewayError::internal(format!(
                            "Stdio transport error: {}",
                            e
                        )));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            force_exit_on_second_signal();
        }

        self.service.shutdown(self.shutdown_grace).await;

        if shutdown_requested {
            // A pending stdin read cannot be interrupted, so leave explicitly
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{Gatekeeper, GatekeeperOptions, MySqlGatewayPool};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stdio_transport_creation() {
        let pool = MySqlGatewayPool::connect_lazy(&Config::default());
        let gatekeeper = Arc::new(Gatekeeper::new(pool, GatekeeperOptions::default()));
        let transport =
            StdioTransport::new(PosService::from_gatekeeper(gatekeeper), Duration::from_secs(1));
        assert_eq!(transport.name(), "stdio");
    }
}
