//! Query-related data models.
//!
//! Bind values, result rows and the row cap defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default hard cap on the number of rows a query may return.
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// A single result row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A bind value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl QueryParam {
    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Outcome of a successful read-only execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Build a result from fetched rows.
    pub fn new(rows: Vec<Row>, execution_time_ms: u64) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}
