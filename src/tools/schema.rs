//! Schema introspection tools.
//!
//! This module implements the `list_tables` and `describe_table` MCP tools.

use crate::db::{ConnectionPool, Gatekeeper};
use crate::error::GatewayResult;
use crate::models::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Input for the list_tables tool. Takes no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesOutput {
    pub success: bool,
    pub table_count: usize,
    pub tables: Vec<String>,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTableInput {
    /// Name of the table to describe, optionally qualified as database.table
    pub table_name: String,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTableOutput {
    pub success: bool,
    pub table_name: String,
    pub column_count: usize,
    /// Column rows as returned by DESCRIBE (Field, Type, Null, Key, Default, Extra)
    pub schema: Vec<Row>,
}

/// Handler for schema introspection.
pub struct SchemaToolHandler<P: ConnectionPool> {
    gatekeeper: Arc<Gatekeeper<P>>,
}

impl<P: ConnectionPool> SchemaToolHandler<P> {
    pub fn new(gatekeeper: Arc<Gatekeeper<P>>) -> Self {
        Self { gatekeeper }
    }

    pub async fn list_tables(&self, _input: ListTablesInput) -> GatewayResult<ListTablesOutput> {
        let tables = self.gatekeeper.list_tables().await?;

        info!(table_count = tables.len(), "Listed tables");

        Ok(ListTablesOutput {
            success: true,
            table_count: tables.len(),
            tables,
        })
    }

    pub async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> GatewayResult<DescribeTableOutput> {
        let descriptor = self.gatekeeper.get_table_schema(&input.table_name).await?;

        info!(
            table = %descriptor.table_name,
            column_count = descriptor.column_count(),
            "Described table"
        );
        debug!(columns = ?descriptor.column_names(), "Table columns");

        Ok(DescribeTableOutput {
            success: true,
            column_count: descriptor.column_count(),
            table_name: descriptor.table_name,
            schema: descriptor.columns,
        })
    }
}
