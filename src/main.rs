//! POS MCP Gateway - Main entry point.
//!
//! Serves read-only MCP tools over a point-of-sale MySQL database.

use clap::Parser;
use pos_mcp_gateway::config::{Config, TransportMode};
use pos_mcp_gateway::db::{Gatekeeper, MySqlGatewayPool};
use pos_mcp_gateway::mcp::PosService;
use pos_mcp_gateway::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Everything goes to stderr; stdout
/// belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(message) = config.validate() {
        error!(%message, "Invalid configuration");
        std::process::exit(1);
    }

    info!(
        transport = %config.transport,
        database = %config.database_label(),
        validation = %config.sql_validation,
        "Starting POS MCP Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = MySqlGatewayPool::connect_lazy(&config);
    let gatekeeper = Arc::new(Gatekeeper::new(pool, config.gatekeeper_options()));
    let service = PosService::from_gatekeeper(gatekeeper);
    let grace = config.shutdown_grace_duration();

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(service.clone(), grace);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                service.clone(),
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
                grace,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        // Transports drain on their own paths; this covers start-up failures
        service.shutdown(grace).await;
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
