//! The `query_pos_database` tool.
//!
//! Runs caller-supplied SQL through the gatekeeper and reports rows together
//! with the time the gatekeeper spent on the call.

use crate::db::{ConnectionPool, Gatekeeper};
use crate::error::GatewayResult;
use crate::models::{QueryParam, QueryResult, Row};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the query_pos_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryToolInput {
    /// Read-only SQL statement (SELECT, SHOW or DESCRIBE). Use ? placeholders for params.
    pub sql: String,
    /// Values bound to the ? placeholders, in order
    #[serde(default)]
    #[schemars(with = "Option<Vec<String>>")]
    pub params: Option<Vec<QueryParam>>,
}

/// Output from the query_pos_database tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryToolOutput {
    pub success: bool,
    pub row_count: usize,
    /// Elapsed wall-clock time, e.g. "12ms"
    pub execution_time: String,
    pub data: Vec<Row>,
}

impl From<QueryResult> for QueryToolOutput {
    fn from(result: QueryResult) -> Self {
        Self {
            success: true,
            row_count: result.row_count,
            execution_time: format!("{}ms", result.execution_time_ms),
            data: result.rows,
        }
    }
}

/// Handler for query execution.
pub struct QueryToolHandler<P: ConnectionPool> {
    gatekeeper: Arc<Gatekeeper<P>>,
}

impl<P: ConnectionPool> QueryToolHandler<P> {
    pub fn new(gatekeeper: Arc<Gatekeeper<P>>) -> Self {
        Self { gatekeeper }
    }

    pub async fn query(&self, input: QueryToolInput) -> GatewayResult<QueryToolOutput> {
        let params = input.params.unwrap_or_default();
        let result = self
            .gatekeeper
            .execute_read_only_query(&input.sql, &params)
            .await?;

        info!(
            row_count = result.row_count,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(QueryToolOutput::from(result))
    }
}
