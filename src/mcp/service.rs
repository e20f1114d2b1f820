//! MCP service implementation using rmcp.
//!
//! `PosService` answers `tools/list` from the fixed registry and forwards
//! `tools/call` to the dispatcher. Tool calls race the client's cancellation
//! token; a cancelled call drops its future, which releases any connection it
//! held.

use crate::db::{ConnectionPool, Gatekeeper};
use crate::error::GatewayError;
use crate::mcp::dispatcher::{Dispatcher, ToolInvocation, tool_definitions};
use crate::mcp::envelope;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct PosService<P: ConnectionPool> {
    dispatcher: Arc<Dispatcher<P>>,
}

impl<P: ConnectionPool> Clone for PosService<P> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<P: ConnectionPool> PosService<P> {
    pub fn new(dispatcher: Arc<Dispatcher<P>>) -> Self {
        Self { dispatcher }
    }

    /// Build the whole stack over a pool.
    pub fn from_gatekeeper(gatekeeper: Arc<Gatekeeper<P>>) -> Self {
        Self::new(Arc::new(Dispatcher::new(gatekeeper)))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<P>> {
        &self.dispatcher
    }

    /// Run a tool call until it completes or `cancelled` resolves.
    ///
    /// A cancelled call has its future dropped, which gives back its
    /// connection and admission slot, and is answered with an error envelope.
    pub async fn call_until<F>(
        &self,
        invocation: ToolInvocation,
        cancelled: F,
    ) -> Result<CallToolResult, McpError>
    where
        F: Future<Output = ()>,
    {
        let tool = invocation.name.clone();

        tokio::select! {
            outcome = self.dispatcher.call(invocation) => outcome.map_err(McpError::from),
            _ = cancelled => {
                info!(tool = %tool, "Tool call cancelled by client");
                Ok(envelope::failure(&GatewayError::execution("request cancelled")))
            }
        }
    }

    /// Run the shutdown protocol on the shared gatekeeper.
    pub async fn shutdown(&self, grace: Duration) {
        self.dispatcher.shutdown(grace).await
    }
}

impl<P: ConnectionPool> ServerHandler for PosService<P> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pos-mcp-gateway".to_owned(),
                title: Some("POS MCP Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only access to the point-of-sale MySQL database.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` to see what is available\n\
                2. Call `describe_table` with `tableName` to inspect columns\n\
                3. Call `query_pos_database` with a SELECT, SHOW or DESCRIBE statement\n\
                \n\
                ## Limits\n\
                - Only read-only statements are accepted; any statement containing\n\
                  INSERT, UPDATE, DELETE, DROP, CREATE, ALTER or TRUNCATE is rejected,\n\
                  even inside identifiers (e.g. `created_orders`)\n\
                - SELECT results are capped at the configured row limit (default 100);\n\
                  do not add your own LIMIT clause\n\
                - Use `?` placeholders with `params` for values"
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call_until(ToolInvocation::from(request), context.ct.cancelled())
            .await
    }
}
