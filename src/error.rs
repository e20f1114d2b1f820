//! Error types for the POS MCP gateway.
//!
//! Every failure the gateway can report is one of four kinds. The first three
//! are business outcomes that the tool dispatcher turns into an `isError`
//! response envelope; `Internal` is reserved for unexpected failures that are
//! allowed to escape to the protocol or process level.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The statement failed read-only classification or the tool arguments
    /// had the wrong shape. Raised before any database contact.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The database, the pool or the admission gate refused or failed the call.
    #[error("Query failed: {message}")]
    Execution { message: String },

    #[error("Unknown tool: '{name}' is not a recognized tool")]
    UnknownTool { name: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create an execution error for an operation that ran out of time.
    pub fn timeout(operation: impl AsRef<str>, limit: Duration) -> Self {
        Self::Execution {
            message: format!(
                "{} exceeded {}s",
                operation.as_ref(),
                limit.as_secs_f64()
            ),
        }
    }

    /// Create an unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the kinds the dispatcher converts into an error envelope.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Execution { .. } => "execution",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Convert sqlx errors into execution errors, keeping the driver's message.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = match db_err.code() {
                    Some(code) => format!("{} (SQLSTATE: {})", db_err.message(), code),
                    None => db_err.message().to_string(),
                };
                GatewayError::execution(message)
            }
            sqlx::Error::PoolTimedOut => {
                GatewayError::execution("timed out waiting for a database connection")
            }
            sqlx::Error::PoolClosed => GatewayError::execution("connection pool is closed"),
            sqlx::Error::Io(io_err) => GatewayError::execution(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => {
                GatewayError::execution(format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                GatewayError::execution(format!("Protocol error: {}", msg))
            }
            sqlx::Error::Configuration(msg) => {
                GatewayError::execution(format!("Configuration error: {}", msg))
            }
            sqlx::Error::ColumnDecode { index, source } => GatewayError::execution(format!(
                "Failed to decode column {}: {}",
                index, source
            )),
            sqlx::Error::WorkerCrashed => GatewayError::execution("database worker crashed"),
            other => GatewayError::execution(other.to_string()),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Convert GatewayError to MCP ErrorData for the cases that escape the
/// dispatcher. Recoverable kinds normally never take this path.
impl From<GatewayError> for rmcp::ErrorData {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Validation { .. } => rmcp::ErrorData::invalid_params(err.to_string(), None),
            GatewayError::UnknownTool { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }
            GatewayError::Execution { .. } | GatewayError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}
