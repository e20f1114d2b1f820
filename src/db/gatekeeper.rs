//! The query gatekeeper.
//!
//! Every statement the gateway runs goes through [`Gatekeeper`]: it is
//! classified first (without touching the pool), admitted through a bounded
//! gate, then executed on a read-only session with a hard row cap.

use crate::config::ValidationMode;
use crate::db::pool::{ConnectionPool, PooledConnection, Protocol};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, QueryParam, QueryResult, Row, TableDescriptor,
};
use crate::tools::sql_validator::{self, ClassifiedQuery, StatementKind};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

const LIST_TABLES_SQL: &str = "SHOW TABLES";
const DESCRIBE_TEMPLATE: &str = "DESCRIBE ??";

/// Tuning knobs for [`Gatekeeper`].
#[derive(Debug, Clone)]
pub struct GatekeeperOptions {
    /// Hard cap on rows per statement.
    pub row_limit: usize,
    /// Size of the underlying pool; calls beyond it wait in the queue.
    pub max_connections: u32,
    /// How many calls may wait for a connection before new ones are refused.
    pub queue_limit: u32,
    pub acquire_timeout: Duration,
    pub query_timeout: Duration,
    pub validation_mode: ValidationMode,
}

impl GatekeeperOptions {
    /// Total admission slots: executing plus queued.
    pub fn admission_capacity(&self) -> u32 {
        self.max_connections.saturating_add(self.queue_limit).max(1)
    }
}

impl Default for GatekeeperOptions {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            max_connections: 10,
            queue_limit: 100,
            acquire_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            validation_mode: ValidationMode::Substring,
        }
    }
}

/// Enforces the read-only contract on all SQL and owns the pool.
pub struct Gatekeeper<P: ConnectionPool> {
    pool: P,
    options: GatekeeperOptions,
    admission: Semaphore,
    capacity: u32,
    closing: AtomicBool,
}

impl<P: ConnectionPool> std::fmt::Debug for Gatekeeper<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("options", &self.options)
            .field("capacity", &self.capacity)
            .field("in_flight", &self.in_flight())
            .field("closing", &self.is_closing())
            .finish()
    }
}

impl<P: ConnectionPool> Gatekeeper<P> {
    pub fn new(pool: P, options: GatekeeperOptions) -> Self {
        let capacity = options.admission_capacity();
        Self {
            pool,
            admission: Semaphore::new(capacity as usize),
            capacity,
            options,
            closing: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &GatekeeperOptions {
        &self.options
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Calls currently admitted (executing or waiting for a connection).
    pub fn in_flight(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.admission.available_permits())
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Classify and run caller-supplied SQL.
    ///
    /// The reported execution time covers the whole call, queueing included.
    pub async fn execute_read_only_query(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> GatewayResult<QueryResult> {
        let started = Instant::now();
        let query = sql_validator::classify(sql, self.options.validation_mode)?;
        let rows = self.run(&query, params).await?;
        Ok(QueryResult::new(rows, started.elapsed().as_millis() as u64))
    }

    /// Column descriptors for one table, as reported by `DESCRIBE`.
    pub async fn get_table_schema(&self, table_name: &str) -> GatewayResult<TableDescriptor> {
        // The template cannot parse until the identifier is bound
        let query = sql_validator::classify(DESCRIBE_TEMPLATE, ValidationMode::Substring)?
            .bind_identifier(table_name)?;
        if self.options.validation_mode == ValidationMode::Strict {
            query.verify_structure()?;
        }
        let columns = self.run(&query, &[]).await?;
        Ok(TableDescriptor::new(table_name, columns))
    }

    /// Table names in the current database, in the order the server lists them.
    pub async fn list_tables(&self) -> GatewayResult<Vec<String>> {
        let query = sql_validator::classify(LIST_TABLES_SQL, self.options.validation_mode)?;
        let rows = self.run(&query, &[]).await?;
        Ok(rows.iter().filter_map(first_column_text).collect())
    }

    /// Stop intake, wait up to `grace` for in-flight calls, then close the pool.
    ///
    /// Safe to call more than once; later calls only wait for the pool to close.
    pub async fn shutdown(&self, grace: Duration) {
        let first = !self.closing.swap(true, Ordering::AcqRel);
        if first {
            info!(
                in_flight = self.in_flight(),
                grace_secs = grace.as_secs_f64(),
                "Gatekeeper shutting down"
            );
        }

        let drained = timeout(grace, self.admission.acquire_many(self.capacity)).await;
        self.admission.close();

        match drained {
            // Permits go back once dropped, so in_flight() reads zero again
            Ok(Ok(_permits)) => debug!("All in-flight calls finished"),
            // Already closed by an earlier shutdown
            Ok(Err(_)) => {}
            Err(_) => warn!(
                in_flight = self.in_flight(),
                "Shutdown grace period elapsed with calls still in flight"
            ),
        }

        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Connection pool closed");
        }
    }

    fn admit(&self) -> GatewayResult<SemaphorePermit<'_>> {
        if self.is_closing() {
            return Err(GatewayError::execution("gateway is shutting down"));
        }
        self.admission.try_acquire().map_err(|e| match e {
            TryAcquireError::Closed => GatewayError::execution("gateway is shutting down"),
            TryAcquireError::NoPermits => GatewayError::execution(format!(
                "gateway overloaded: {} calls already in flight",
                self.capacity
            )),
        })
    }

    async fn run(&self, query: &ClassifiedQuery, params: &[QueryParam]) -> GatewayResult<Vec<Row>> {
        let _permit = self.admit()?;
        let row_limit = self.options.row_limit;
        let sql = query.bounded_sql(row_limit);
        let protocol = protocol_for(query.kind(), params);

        let mut conn = timeout(self.options.acquire_timeout, self.pool.acquire())
            .await
            .map_err(|_| {
                GatewayError::timeout("waiting for a database connection", self.options.acquire_timeout)
            })??;

        debug!(
            sql = %sql,
            params = ?params.iter().map(QueryParam::type_name).collect::<Vec<_>>(),
            kind = ?query.kind(),
            ?protocol,
            "Executing statement"
        );

        let execution = async {
            conn.set_read_only().await?;
            conn.fetch_rows(&sql, params, row_limit, protocol).await
        };

        let outcome = timeout(self.options.query_timeout, execution).await;
        let mut rows = match outcome {
            Ok(result) => result?,
            Err(_) => {
                conn.invalidate();
                return Err(GatewayError::timeout(
                    "query execution",
                    self.options.query_timeout,
                ));
            }
        };
        rows.truncate(row_limit);
        Ok(rows)
    }
}

/// SELECT and anything with bind values is prepared; SHOW and DESCRIBE
/// without values go over the text protocol, which MySQL always accepts
/// for them.
fn protocol_for(kind: StatementKind, params: &[QueryParam]) -> Protocol {
    match kind {
        StatementKind::Show | StatementKind::Describe if params.is_empty() => Protocol::Text,
        _ => Protocol::Prepared,
    }
}

fn first_column_text(row: &Row) -> Option<String> {
    row.values().next().map(|value| match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    })
}
