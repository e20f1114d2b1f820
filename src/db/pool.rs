//! Connection pool abstraction.
//!
//! The gatekeeper only talks to the database through `ConnectionPool` and
//! `PooledConnection`, so tests can substitute an in-memory pool. The
//! production implementation wraps `sqlx::MySqlPool`.
//!
//! A checked-out connection is returned to its pool when dropped. There is
//! no explicit release call; every exit path (success, error, timeout,
//! cancellation) gives the connection back exactly once.

use crate::config::Config;
use crate::db::params::bind_mysql_param;
use crate::db::types::RowToJson;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{QueryParam, Row};
use futures_util::StreamExt;
use sqlx::mysql::{MySqlConnection, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use std::future::Future;
use tracing::debug;

/// Statement that switches a session to read-only transactions.
pub const READ_ONLY_SESSION_SQL: &str = "SET SESSION TRANSACTION READ ONLY";

/// How a statement travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `COM_QUERY`. The server accepts multi-statement batches on it, so
    /// only fixed SHOW and DESCRIBE text goes this way.
    Text,
    /// `COM_STMT_PREPARE` + `COM_STMT_EXECUTE`. One statement per prepare.
    Prepared,
}

/// A bounded set of reusable database connections.
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: PooledConnection;

    /// Check out a connection, waiting while all of them are in use.
    fn acquire(&self) -> impl Future<Output = GatewayResult<Self::Connection>> + Send;

    /// Close the pool. Waits for checked-out connections to come back.
    fn close(&self) -> impl Future<Output = ()> + Send;

    fn is_closed(&self) -> bool;
}

/// An exclusively held connection. Dropping it releases it.
pub trait PooledConnection: Send {
    /// Force read-only transaction mode for the rest of the session.
    fn set_read_only(&mut self) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Run a statement and read at most `max_rows` rows from it.
    fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        max_rows: usize,
        protocol: Protocol,
    ) -> impl Future<Output = GatewayResult<Vec<Row>>> + Send;

    /// Mark the connection as unusable so it is closed instead of reused.
    ///
    /// Called when a statement was abandoned mid-flight.
    fn invalidate(&mut self) {}
}

/// MySQL pool backed by `sqlx`.
#[derive(Debug, Clone)]
pub struct MySqlGatewayPool {
    pool: MySqlPool,
}

impl MySqlGatewayPool {
    /// Build a pool that opens connections on first use.
    ///
    /// Start-up never blocks on the database; an unreachable server shows up
    /// as an execution error on the first tool call.
    pub fn connect_lazy(config: &Config) -> Self {
        let options = config.connect_options().charset("utf8mb4");
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout_duration())
            .connect_lazy_with(options);

        debug!(
            target = %config.database_label(),
            max_connections = config.max_connections,
            "Created lazy MySQL pool"
        );

        Self { pool }
    }
}

impl ConnectionPool for MySqlGatewayPool {
    type Connection = MySqlGatewayConnection;

    fn acquire(&self) -> impl Future<Output = GatewayResult<Self::Connection>> + Send {
        let pool = self.pool.clone();
        async move {
            let conn = pool.acquire().await?;
            Ok(MySqlGatewayConnection { conn })
        }
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        let pool = self.pool.clone();
        async move { pool.close().await }
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// A MySQL connection checked out of [`MySqlGatewayPool`].
#[derive(Debug)]
pub struct MySqlGatewayConnection {
    conn: PoolConnection<MySql>,
}

impl MySqlGatewayConnection {
    fn raw(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }
}

impl PooledConnection for MySqlGatewayConnection {
    fn set_read_only(&mut self) -> impl Future<Output = GatewayResult<()>> + Send {
        async move {
            use sqlx::Executor;
            self.raw().execute(READ_ONLY_SESSION_SQL).await?;
            Ok(())
        }
    }

    fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        max_rows: usize,
        protocol: Protocol,
    ) -> impl Future<Output = GatewayResult<Vec<Row>>> + Send {
        async move {
            let conn = self.raw();
            let results: Vec<Result<MySqlRow, sqlx::Error>> = match protocol {
                Protocol::Text => {
                    use sqlx::Executor;
                    conn.fetch(sql).take(max_rows).collect().await
                }
                // sqlx::query prepares even with no arguments bound
                Protocol::Prepared => {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = bind_mysql_param(query, param);
                    }
                    query.fetch(conn).take(max_rows).collect().await
                }
            };

            results
                .into_iter()
                .map(|row| row.map(|r| r.to_json_map()).map_err(GatewayError::from))
                .collect()
        }
    }

    fn invalidate(&mut self) {
        self.conn.close_on_drop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let config = Config {
            mysql_host: "127.0.0.1".to_string(),
            mysql_port: 1,
            ..Config::default()
        };
        let pool = MySqlGatewayPool::connect_lazy(&config);
        assert!(!pool.is_closed());

        ConnectionPool::close(&pool).await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_acquire_on_closed_pool_is_execution_error() {
        let pool = MySqlGatewayPool::connect_lazy(&Config::default());
        ConnectionPool::close(&pool).await;

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err, GatewayError::execution("connection pool is closed"));
    }
}
