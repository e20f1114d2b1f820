//! Data models for the POS MCP gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, QueryParam, QueryResult, Row,
};
pub use schema::TableDescriptor;
