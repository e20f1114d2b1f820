//! HTTP transport with Streamable HTTP support for the MCP server.

use crate::db::ConnectionPool;
use crate::error::{GatewayError, GatewayResult};
use crate::mcp::PosService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// How long open SSE streams may hold the server up after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation.
///
/// Every MCP session gets a clone of the same `PosService`, so all sessions
/// share one gatekeeper and one pool.
pub struct HttpTransport<P: ConnectionPool> {
    service: PosService<P>,
    host: String,
    port: u16,
    endpoint: String,
    shutdown_grace: Duration,
}

impl<P: ConnectionPool> HttpTransport<P> {
    pub fn new(
        service: PosService<P>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            service,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
            shutdown_grace,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let service = self.service.clone();
        let mcp = StreamableHttpService::new(
            move || Ok(service.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses the fallback
        if self.endpoint == "/" {
            axum::Router::new().fallback_service(mcp)
        } else {
            axum::Router::new().nest_service(&self.endpoint, mcp)
        }
    }
}

impl<P: ConnectionPool> Transport for HttpTransport<P> {
    async fn run(&self) -> GatewayResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            GatewayError::internal(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;
        info!(addr = %bind_addr, endpoint = %self.endpoint, "Serving MCP over HTTP");

        let signalled = Arc::new(Notify::new());
        let server = {
            let signalled = signalled.clone();
            axum::serve(listener, self.router()).with_graceful_shutdown(async move {
                wait_for_signal().await;
                signalled.notify_one();
            })
        };

        let served = tokio::select! {
            result = server => result.map_err(|e| {
                error!(error = %e, "HTTP server error");
                GatewayError::internal(format!("HTTP server error: {}", e))
            }),
            _ = drain_deadline(&signalled) => Ok(()),
        };

        // Sessions are gone either way; drain the gatekeeper before exiting
        self.service.shutdown(self.shutdown_grace).await;
        if served.is_ok() {
            info!("HTTP server stopped");
        }
        served
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Resolves once a shutdown signal has arrived and open streams have had
/// `GRACEFUL_TIMEOUT` to finish, or on a second signal.
async fn drain_deadline(signalled: &Notify) {
    signalled.notified().await;
    info!(
        timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Waiting for HTTP sessions to close (send signal again to force exit)"
    );
    tokio::select! {
        _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
            warn!("HTTP sessions still open after grace period, stopping anyway");
        }
        _ = wait_for_signal() => {
            warn!("Received second signal, stopping immediately");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{Gatekeeper, GatekeeperOptions, MySqlGatewayPool};

    fn transport(endpoint: &str) -> HttpTransport<MySqlGatewayPool> {
        let pool = MySqlGatewayPool::connect_lazy(&Config::default());
        let gatekeeper = Arc::new(Gatekeeper::new(pool, GatekeeperOptions::default()));
        HttpTransport::new(
            PosService::from_gatekeeper(gatekeeper),
            "127.0.0.1",
            8080,
            endpoint,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_http_transport_creation() {
        let transport = transport("/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8080");
        assert_eq!(transport.endpoint(), "/mcp");
    }

    #[tokio::test]
    async fn test_router_builds_for_root_and_nested_endpoints() {
        let _ = transport("/").router();
        let _ = transport("/api/mcp").router();
    }
}
