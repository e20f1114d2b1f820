//! MCP tool implementations.
//!
//! - `query`: the `query_pos_database` tool
//! - `schema`: the `list_tables` and `describe_table` tools
//! - `sql_validator`: read-only classification of SQL text

pub mod query;
pub mod schema;
pub mod sql_validator;

pub use query::{QueryToolHandler, QueryToolInput, QueryToolOutput};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
