//! Reactive connection pool runtime.
//!
//! This library resolves a database driver, credentials and SQL dialect from
//! a connection URI, exposes a pooled connection facade, and runs generated
//! DDL through an ordered, non-blocking pipeline (SQLite, PostgreSQL,
//! MySQL/MariaDB; DB2 is recognised for dialect purposes).

pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod models;
pub mod provider;
pub mod runtime;
pub mod schema;

pub use config::{Config, Settings};
pub use dialect::{Dialect, ParameterStyle};
pub use error::{DbError, DbResult};
pub use runtime::PoolRuntime;
