//! MCP server integration module.
//!
//! This module connects the MCP protocol (via rmcp) to the gateway:
//! - `dispatcher`: tool registry and catch-and-wrap dispatch
//! - `envelope`: uniform success/error responses
//! - `service`: the rmcp `ServerHandler`

pub mod dispatcher;
pub mod envelope;
pub mod service;

pub use dispatcher::{Dispatcher, PosTool, ToolInvocation, tool_definitions};
pub use service::PosService;
