//! Database access layer.
//!
//! - `pool`: connection pool traits and the sqlx-backed MySQL pool
//! - `gatekeeper`: read-only enforcement, admission and shutdown
//! - `types`: MySQL row to JSON decoding
//! - `params`: bind value handling

pub mod gatekeeper;
pub mod params;
pub mod pool;
pub mod types;

pub use gatekeeper::{Gatekeeper, GatekeeperOptions};
pub use pool::{
    ConnectionPool, MySqlGatewayConnection, MySqlGatewayPool, PooledConnection, Protocol,
};
