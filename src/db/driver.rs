//! Driver, pool and connection capabilities.
//!
//! Every backend is reached through three object-safe traits:
//! - [`Driver`]: claims URI schemes and constructs pools
//! - [`Pool`]: hands out logical connections
//! - [`Connection`]: executes one command at a time
//!
//! The built-in drivers wrap sqlx pools; tests and embedders may register
//! their own implementations.

use crate::config::PoolOptions;
use crate::db::backend::DbPool;
use crate::error::DbResult;
use crate::models::{ConnectOptions, DatabaseMetadata};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tracing::debug;

/// A leased, exclusively used handle into a pool.
#[async_trait]
pub trait Connection: Send {
    /// Execute a single command, returning the number of affected rows.
    async fn execute(&mut self, command: &str) -> DbResult<u64>;

    /// Read product information from the backend.
    async fn metadata(&mut self) -> DbResult<DatabaseMetadata>;

    /// Give the connection back to its pool. Further calls fail.
    async fn close(&mut self) -> DbResult<()>;
}

/// A set of reusable backend connections, safe for concurrent acquisition.
#[async_trait]
pub trait Pool: Send + Sync {
    async fn acquire(&self) -> DbResult<Box<dyn Connection>>;

    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A named implementation able to build pools for one or more URI schemes.
pub trait Driver: Send + Sync {
    /// Stable driver name, used in logs.
    fn name(&self) -> &str;

    /// Scheme aliases this driver claims.
    fn schemes(&self) -> &[&'static str];

    /// Case-insensitive match against the declared aliases.
    fn matches_scheme(&self, scheme: &str) -> bool {
        self.schemes()
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(scheme))
    }

    fn create_pool(
        &self,
        connect: &ConnectOptions,
        options: &PoolOptions,
    ) -> DbResult<Arc<dyn Pool>>;
}

/// PostgreSQL driver backed by sqlx.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn name(&self) -> &str {
        "sqlx-postgres"
    }

    fn schemes(&self) -> &[&'static str] {
        &["postgres", "postgresql", "postgre"]
    }

    fn create_pool(
        &self,
        connect: &ConnectOptions,
        options: &PoolOptions,
    ) -> DbResult<Arc<dyn Pool>> {
        let mut pg = PgConnectOptions::new()
            .host(&connect.host)
            .username(&connect.username)
            .database(&connect.database);
        if let Some(port) = connect.port {
            pg = pg.port(port);
        }
        if let Some(password) = &connect.password {
            pg = pg.password(password);
        }

        debug!(driver = self.name(), max_size = options.max_size, "Creating pool");
        let pool = PgPoolOptions::new()
            .max_connections(options.max_size)
            .acquire_timeout(options.acquire_timeout)
            .idle_timeout(Some(options.idle_timeout))
            .connect_lazy_with(pg);
        Ok(Arc::new(DbPool::Postgres(pool)))
    }
}

/// MySQL / MariaDB driver backed by sqlx.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDriver;

impl Driver for MySqlDriver {
    fn name(&self) -> &str {
        "sqlx-mysql"
    }

    fn schemes(&self) -> &[&'static str] {
        &["mysql", "mariadb"]
    }

    fn create_pool(
        &self,
        connect: &ConnectOptions,
        options: &PoolOptions,
    ) -> DbResult<Arc<dyn Pool>> {
        let mut my = MySqlConnectOptions::new()
            .host(&connect.host)
            .username(&connect.username)
            .database(&connect.database)
            .charset("utf8mb4");
        if let Some(port) = connect.port {
            my = my.port(port);
        }
        if let Some(password) = &connect.password {
            my = my.password(password);
        }

        debug!(driver = self.name(), max_size = options.max_size, "Creating pool");
        let pool = MySqlPoolOptions::new()
            .max_connections(options.max_size)
            .acquire_timeout(options.acquire_timeout)
            .idle_timeout(Some(options.idle_timeout))
            .connect_lazy_with(my);
        Ok(Arc::new(DbPool::MySql(pool)))
    }
}

/// SQLite driver backed by sqlx. The database is a file path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlx-sqlite"
    }

    fn schemes(&self) -> &[&'static str] {
        &["sqlite"]
    }

    fn create_pool(
        &self,
        connect: &ConnectOptions,
        options: &PoolOptions,
    ) -> DbResult<Arc<dyn Pool>> {
        let lite = SqliteConnectOptions::new()
            .filename(&connect.database)
            .create_if_missing(true);

        debug!(driver = self.name(), max_size = options.max_size, "Creating pool");
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_size)
            .acquire_timeout(options.acquire_timeout)
            .idle_timeout(Some(options.idle_timeout))
            .connect_lazy_with(lite);
        Ok(Arc::new(DbPool::SQLite(pool)))
    }
}
