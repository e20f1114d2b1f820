//! Uniform tool response envelopes.
//!
//! Success carries one text block holding pretty-printed JSON of the tool
//! payload. Failure carries one text block with the error message and sets
//! `isError`.

use crate::error::{GatewayError, GatewayResult};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Wrap a tool payload in a success envelope.
///
/// Serialization failure is the one case that escapes as `Internal`.
pub fn success<T: Serialize>(payload: &T) -> GatewayResult<CallToolResult> {
    let json = serde_json::to_string_pretty(payload).map_err(|e| {
        GatewayError::internal(format!("failed to serialize tool payload: {}", e))
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Wrap a recoverable failure in an error envelope.
pub fn failure(err: &GatewayError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(err.to_string())])
}
