//! POS MCP Gateway Library
//!
//! A read-only MCP (Model Context Protocol) gateway in front of a
//! point-of-sale MySQL database. Every statement passes a gatekeeper that
//! enforces read-only SQL, bounds result sizes and bounds concurrency.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use mcp::PosService;
