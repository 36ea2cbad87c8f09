//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver, pool and connection capabilities
//! - sqlx-backed pools for PostgreSQL, MySQL/MariaDB and SQLite
//! - Driver registry with ambient and scheme-based selection
//! - Connection pool facade with owned or external lifecycle
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod backend;
pub mod driver;
pub mod pool;
pub mod registry;

pub use backend::{DbPool, PooledConnection};
pub use driver::{Connection, Driver, MySqlDriver, Pool, PostgresDriver, SqliteDriver};
pub use pool::{ConnectionPool, PoolOwnership, PoolPolicy, SqlClientConnection, open_backend};
pub use registry::DriverRegistry;
