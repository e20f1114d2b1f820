//! Tool dispatcher.
//!
//! Maps a named tool invocation to a gatekeeper operation and turns every
//! outcome into one response envelope. Validation, execution and unknown-tool
//! failures never leave [`Dispatcher::invoke`] as errors; only internal
//! failures do.

use crate::db::{ConnectionPool, Gatekeeper};
use crate::error::{GatewayError, GatewayResult};
use crate::mcp::envelope;
use crate::tools::{
    DescribeTableInput, ListTablesInput, QueryToolHandler, QueryToolInput, SchemaToolHandler,
};
use rmcp::model::{CallToolRequestParam, CallToolResult, JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

/// The fixed set of tools the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTool {
    QueryPosDatabase,
    ListTables,
    DescribeTable,
}

impl PosTool {
    pub const ALL: [PosTool; 3] = [Self::QueryPosDatabase, Self::ListTables, Self::DescribeTable];

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryPosDatabase => "query_pos_database",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::QueryPosDatabase => {
                "Run a read-only SQL query (SELECT, SHOW or DESCRIBE) against the POS database.\n\
                 Write operations are rejected. Results are capped at 100 rows.\n\
                 Use ? placeholders with the optional params array."
            }
            Self::ListTables => "List all tables available in the POS database.",
            Self::DescribeTable => {
                "Show the structure (columns, types, keys) of a table in the POS database."
            }
        }
    }

    fn input_schema(&self) -> Arc<JsonObject> {
        match self {
            Self::QueryPosDatabase => schema_object::<QueryToolInput>(),
            Self::ListTables => schema_object::<ListTablesInput>(),
            Self::DescribeTable => schema_object::<DescribeTableInput>(),
        }
    }

    /// Advertised tool entry.
    pub fn definition(&self) -> Tool {
        Tool::new(self.name(), self.description(), self.input_schema())
    }
}

/// Tool entries for `tools/list`, in registry order.
pub fn tool_definitions() -> Vec<Tool> {
    PosTool::ALL.iter().map(PosTool::definition).collect()
}

fn schema_object<T: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(JsonValue::Object(map)) => Arc::new(map),
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".to_string(), JsonValue::from("object"));
            Arc::new(map)
        }
    }
}

/// A tool call as received from the client.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Option<JsonObject>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Option<JsonObject>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

impl From<CallToolRequestParam> for ToolInvocation {
    fn from(request: CallToolRequestParam) -> Self {
        Self {
            name: request.name.into_owned(),
            arguments: request.arguments,
        }
    }
}

pub struct Dispatcher<P: ConnectionPool> {
    gatekeeper: Arc<Gatekeeper<P>>,
    query: QueryToolHandler<P>,
    schema: SchemaToolHandler<P>,
}

impl<P: ConnectionPool> Dispatcher<P> {
    pub fn new(gatekeeper: Arc<Gatekeeper<P>>) -> Self {
        Self {
            query: QueryToolHandler::new(gatekeeper.clone()),
            schema: SchemaToolHandler::new(gatekeeper.clone()),
            gatekeeper,
        }
    }

    pub fn gatekeeper(&self) -> &Arc<Gatekeeper<P>> {
        &self.gatekeeper
    }

    /// Run one tool call and wrap its outcome in an envelope.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> GatewayResult<CallToolResult> {
        self.call(ToolInvocation::new(name, arguments)).await
    }

    pub async fn call(&self, invocation: ToolInvocation) -> GatewayResult<CallToolResult> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("tool_call", tool = %invocation.name, %invocation_id);

        async move {
            debug!("Tool call received");
            match self.dispatch(invocation).await {
                Ok(result) => Ok(result),
                Err(err) if err.is_recoverable() => {
                    warn!(kind = err.kind(), error = %err, "Tool call failed");
                    Ok(envelope::failure(&err))
                }
                Err(err) => {
                    error!(error = %err, "Tool call failed with an internal error");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Stop intake and drain in-flight calls before closing the pool.
    pub async fn shutdown(&self, grace: Duration) {
        self.gatekeeper.shutdown(grace).await
    }

    async fn dispatch(&self, invocation: ToolInvocation) -> GatewayResult<CallToolResult> {
        let tool = PosTool::from_name(&invocation.name)
            .ok_or_else(|| GatewayError::unknown_tool(&invocation.name))?;

        match tool {
            PosTool::QueryPosDatabase => {
                let input: QueryToolInput = parse_arguments(tool, invocation.arguments)?;
                envelope::success(&self.query.query(input).await?)
            }
            PosTool::ListTables => {
                let input: ListTablesInput = parse_arguments(tool, invocation.arguments)?;
                envelope::success(&self.schema.list_tables(input).await?)
            }
            PosTool::DescribeTable => {
                let input: DescribeTableInput = parse_arguments(tool, invocation.arguments)?;
                envelope::success(&self.schema.describe_table(input).await?)
            }
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(
    tool: PosTool,
    arguments: Option<JsonObject>,
) -> GatewayResult<T> {
    let value = JsonValue::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| {
        GatewayError::validation(format!("invalid arguments for {}: {}", tool.name(), e))
    })
}
