//! Configuration handling for the POS MCP gateway.
//!
//! This module provides configuration management via CLI arguments and
//! environment variables. Database settings fall back to the `MYSQL_*`
//! variables; gateway settings to `MCP_*`.

use crate::db::gatekeeper::GatekeeperOptions;
use clap::{Parser, ValueEnum};
use sqlx::mysql::MySqlConnectOptions;
use std::time::Duration;

pub const DEFAULT_MYSQL_HOST: &str = "localhost";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MYSQL_USER: &str = "developer";
pub const DEFAULT_MYSQL_PASSWORD: &str = "developer";

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";

// Pool and gatekeeper defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_QUEUE_LIMIT: u32 = 100;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = crate::models::DEFAULT_QUERY_TIMEOUT_SECS;
pub const DEFAULT_ROW_LIMIT: usize = crate::models::DEFAULT_ROW_LIMIT;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// How strictly SQL text is classified before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValidationMode {
    /// Prefix allow-list plus write-keyword substring ban
    #[default]
    Substring,
    /// Substring rules plus a parsed single-statement, read-only check
    Strict,
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Substring => write!(f, "substring"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Clone, Parser)]
#[command(name = "pos-mcp-gateway", version, about)]
pub struct Config {
    /// MySQL server host
    #[arg(long, default_value = DEFAULT_MYSQL_HOST, env = "MYSQL_HOST")]
    pub mysql_host: String,

    /// MySQL server port
    #[arg(long, default_value_t = DEFAULT_MYSQL_PORT, env = "MYSQL_PORT")]
    pub mysql_port: u16,

    /// MySQL user
    #[arg(long, default_value = DEFAULT_MYSQL_USER, env = "MYSQL_USER")]
    pub mysql_user: String,

    /// MySQL password (sensitive - never logged)
    #[arg(
        long,
        default_value = DEFAULT_MYSQL_PASSWORD,
        env = "MYSQL_PASSWORD",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub mysql_password: String,

    /// Database (schema) name. Empty means no default database.
    #[arg(long, default_value = "", env = "MYSQL_DATABASE")]
    pub mysql_database: String,

    /// Maximum concurrent database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "MCP_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Calls allowed to wait for a connection before new ones are rejected
    #[arg(long, default_value_t = DEFAULT_QUEUE_LIMIT, env = "MCP_QUEUE_LIMIT")]
    pub queue_limit: u32,

    /// Connection checkout timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "MCP_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout: u64,

    /// Query execution timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Hard cap on rows returned per statement
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT, env = "MCP_ROW_LIMIT")]
    pub row_limit: usize,

    /// Seconds to wait for in-flight queries on shutdown
    #[arg(
        long,
        default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS,
        env = "MCP_SHUTDOWN_GRACE"
    )]
    pub shutdown_grace: u64,

    /// SQL classification mode
    #[arg(
        long,
        value_enum,
        default_value = "substring",
        env = "MCP_SQL_VALIDATION"
    )]
    pub sql_validation: ValidationMode,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            mysql_host: DEFAULT_MYSQL_HOST.to_string(),
            mysql_port: DEFAULT_MYSQL_PORT,
            mysql_user: DEFAULT_MYSQL_USER.to_string(),
            mysql_password: DEFAULT_MYSQL_PASSWORD.to_string(),
            mysql_database: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            row_limit: DEFAULT_ROW_LIMIT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE_SECS,
            sql_validation: ValidationMode::Substring,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate settings that clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.mysql_host.trim().is_empty() {
            return Err("mysql_host must not be empty".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.row_limit == 0 {
            return Err("row_limit must be greater than 0".to_string());
        }
        if self.acquire_timeout == 0 || self.query_timeout == 0 {
            return Err("timeouts must be greater than 0 seconds".to_string());
        }
        Ok(())
    }

    /// Default database name, if one was configured.
    pub fn database(&self) -> Option<&str> {
        let name = self.mysql_database.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Human-readable target for logs, e.g. `pos@db.internal:3306`.
    pub fn database_label(&self) -> String {
        format!(
            "{}@{}:{}",
            self.database().unwrap_or("<none>"),
            self.mysql_host,
            self.mysql_port
        )
    }

    /// Build MySQL connect options from the database settings.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.mysql_host)
            .port(self.mysql_port)
            .username(&self.mysql_user)
            .password(&self.mysql_password);

        match self.database() {
            Some(name) => options.database(name),
            None => options,
        }
    }

    /// Options for the query gatekeeper.
    pub fn gatekeeper_options(&self) -> GatekeeperOptions {
        GatekeeperOptions {
            row_limit: self.row_limit,
            max_connections: self.max_connections,
            queue_limit: self.queue_limit,
            acquire_timeout: self.acquire_timeout_duration(),
            query_timeout: self.query_timeout_duration(),
            validation_mode: self.sql_validation,
        }
    }

    /// Get the acquire timeout as a Duration.
    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the shutdown grace period as a Duration.
    pub fn shutdown_grace_duration(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("mysql_host", &self.mysql_host)
            .field("mysql_port", &self.mysql_port)
            .field("mysql_user", &self.mysql_user)
            .field("mysql_password", &"<redacted>")
            .field("mysql_database", &self.mysql_database)
            .field("max_connections", &self.max_connections)
            .field("queue_limit", &self.queue_limit)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("row_limit", &self.row_limit)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("sql_validation", &self.sql_validation)
            .field("transport", &self.transport)
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .field("mcp_endpoint", &self.mcp_endpoint)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}
