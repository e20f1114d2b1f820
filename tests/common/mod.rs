//! In-memory connection pool used by the integration tests.
//!
//! `FakePool` hands out at most `max_connections` connections at a time,
//! records every acquisition, release and statement, and answers statements
//! from a responder closure. The default responder serves a tiny POS schema.

#![allow(dead_code)]

use pos_mcp_gateway::db::{
    ConnectionPool, Gatekeeper, GatekeeperOptions, PooledConnection, Protocol,
};
use pos_mcp_gateway::error::{GatewayError, GatewayResult};
use pos_mcp_gateway::models::{QueryParam, Row};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const READ_ONLY_SQL: &str = "SET SESSION TRANSACTION READ ONLY";

pub type Responder = Arc<dyn Fn(&str, &[QueryParam]) -> GatewayResult<Vec<Row>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// `None` for the session setup statement.
    pub protocol: Option<Protocol>,
}

#[derive(Debug, Default)]
pub struct PoolStats {
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub invalidated: AtomicUsize,
    pub executed: Mutex<Vec<ExecutedStatement>>,
}

impl PoolStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn invalidated(&self) -> usize {
        self.invalidated.load(Ordering::SeqCst)
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.executed.lock().unwrap().clone()
    }
}

struct FakePoolInner {
    permits: Arc<Semaphore>,
    max_connections: u32,
    stats: Arc<PoolStats>,
    responder: Responder,
    delay: Duration,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct FakePool {
    inner: Arc<FakePoolInner>,
}

impl FakePool {
    /// Pool serving the POS fixture.
    pub fn new(max_connections: u32) -> Self {
        Self::with_responder(max_connections, Duration::ZERO, pos_fixture)
    }

    /// Pool serving the POS fixture, sleeping `delay` inside every statement.
    pub fn with_delay(max_connections: u32, delay: Duration) -> Self {
        Self::with_responder(max_connections, delay, pos_fixture)
    }

    pub fn with_responder<F>(max_connections: u32, delay: Duration, responder: F) -> Self
    where
        F: Fn(&str, &[QueryParam]) -> GatewayResult<Vec<Row>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FakePoolInner {
                permits: Arc::new(Semaphore::new(max_connections as usize)),
                max_connections,
                stats: Arc::new(PoolStats::default()),
                responder: Arc::new(responder),
                delay,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.inner.stats.clone()
    }
}

impl ConnectionPool for FakePool {
    type Connection = FakeConnection;

    fn acquire(&self) -> impl Future<Output = GatewayResult<FakeConnection>> + Send {
        let inner = self.inner.clone();
        async move {
            if inner.closed.load(Ordering::SeqCst) {
                return Err(GatewayError::execution("connection pool is closed"));
            }
            let permit = inner
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| GatewayError::execution("connection pool is closed"))?;

            let stats = &inner.stats;
            let active = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
            stats.max_active.fetch_max(active, Ordering::SeqCst);
            stats.acquired.fetch_add(1, Ordering::SeqCst);

            Ok(FakeConnection {
                stats: inner.stats.clone(),
                responder: inner.responder.clone(),
                delay: inner.delay,
                _permit: permit,
            })
        }
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        let inner = self.inner.clone();
        async move {
            inner.closed.store(true, Ordering::SeqCst);
            // Like sqlx, wait for checked-out connections to come back
            if let Ok(all) = inner.permits.acquire_many(inner.max_connections).await {
                all.forget();
            }
            inner.permits.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeConnection {
    stats: Arc<PoolStats>,
    responder: Responder,
    delay: Duration,
    _permit: OwnedSemaphorePermit,
}

impl FakeConnection {
    fn record(&self, sql: &str, params: &[QueryParam], protocol: Option<Protocol>) {
        self.stats.executed.lock().unwrap().push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
            protocol,
        });
    }
}

impl PooledConnection for FakeConnection {
    fn set_read_only(&mut self) -> impl Future<Output = GatewayResult<()>> + Send {
        self.record(READ_ONLY_SQL, &[], None);
        async { Ok(()) }
    }

    fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        max_rows: usize,
        protocol: Protocol,
    ) -> impl Future<Output = GatewayResult<Vec<Row>>> + Send {
        self.record(sql, params, Some(protocol));
        let result = (self.responder)(sql, params);
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result.map(|rows| rows.into_iter().take(max_rows).collect())
        }
    }

    fn invalidate(&mut self) {
        self.stats.invalidated.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

/// `count` rows of the `products` table.
pub fn products(count: usize) -> Vec<Row> {
    (1..=count)
        .map(|id| {
            row(json!({
                "id": id,
                "sku": format!("SKU-{:04}", id),
                "name": format!("Product {}", id),
                "price": format!("{}.50", id),
            }))
        })
        .collect()
}

fn describe_products() -> Vec<Row> {
    vec![
        row(json!({ "Field": "id", "Type": "int", "Null": "NO", "Key": "PRI", "Default": null, "Extra": "auto_increment" })),
        row(json!({ "Field": "sku", "Type": "varchar(32)", "Null": "NO", "Key": "UNI", "Default": null, "Extra": "" })),
        row(json!({ "Field": "price", "Type": "decimal(10,2)", "Null": "NO", "Key": "", "Default": "0.00", "Extra": "" })),
    ]
}

/// Answers a small POS database: `categories`, `created_orders`, `products`
/// (300 rows) and `sales`.
pub fn pos_fixture(sql: &str, _params: &[QueryParam]) -> GatewayResult<Vec<Row>> {
    let upper = sql.trim().to_uppercase();

    if upper == "SHOW TABLES" {
        return Ok(["categories", "created_orders", "products", "sales"]
            .iter()
            .map(|name| row(json!({ "Tables_in_pos": name })))
            .collect());
    }

    if let Some(target) = upper.strip_prefix("DESCRIBE ") {
        return match target {
            "`PRODUCTS`" => Ok(describe_products()),
            "`CREATED_ORDERS`" => Ok(vec![row(
                json!({ "Field": "order_id", "Type": "bigint", "Null": "NO", "Key": "PRI", "Default": null, "Extra": "" }),
            )]),
            _ => Err(GatewayError::execution(format!(
                "Table 'pos.{}' doesn't exist (SQLSTATE: 42S02)",
                sql.trim()["DESCRIBE ".len()..].trim_matches('`')
            ))),
        };
    }

    if upper.contains("FROM MISSING") {
        return Err(GatewayError::execution(
            "Table 'pos.missing' doesn't exist (SQLSTATE: 42S02)",
        ));
    }

    if upper.contains("FROM PRODUCTS") {
        return Ok(products(300));
    }

    Ok(vec![row(json!({ "ok": 1 }))])
}

pub fn options(max_connections: u32) -> GatekeeperOptions {
    GatekeeperOptions {
        max_connections,
        ..GatekeeperOptions::default()
    }
}

/// Gatekeeper over a fixture pool, plus a handle on the pool's stats.
pub fn gatekeeper(pool: FakePool, options: GatekeeperOptions) -> (Arc<Gatekeeper<FakePool>>, Arc<PoolStats>) {
    let stats = pool.stats();
    (Arc::new(Gatekeeper::new(pool, options)), stats)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
