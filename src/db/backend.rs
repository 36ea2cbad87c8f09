//! sqlx-backed pools and connections.
//!
//! This module provides the concrete [`Pool`] and [`Connection`]
//! implementations used by the built-in drivers, using database-specific
//! sqlx pools (MySqlPool, PgPool, SqlitePool) for full type support.

use crate::db::driver::{Connection, Pool};
use crate::error::{DbError, DbResult};
use crate::models::DatabaseMetadata;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool};
use tracing::{debug, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Map an acquisition failure, reporting the pool's own acquire timeout.
    fn acquire_error(&self, err: sqlx::Error) -> DbError {
        match err {
            sqlx::Error::PoolTimedOut => {
                let timeout = impl_db_dispatch!(self, p => p.options().get_acquire_timeout());
                DbError::timeout("connection pool acquire", timeout.as_secs())
            }
            other => other.into(),
        }
    }

    /// Product name reported for this backend.
    pub fn product_name(&self) -> &'static str {
        match self {
            DbPool::MySql(_) => "MySQL",
            DbPool::Postgres(_) => "PostgreSQL",
            DbPool::SQLite(_) => "SQLite",
        }
    }
}

#[async_trait]
impl Pool for DbPool {
    async fn acquire(&self) -> DbResult<Box<dyn Connection>> {
        let connection = match self {
            DbPool::MySql(pool) => BackendConnection::MySql(
                pool.acquire().await.map_err(|e| self.acquire_error(e))?,
            ),
            DbPool::Postgres(pool) => BackendConnection::Postgres(
                pool.acquire().await.map_err(|e| self.acquire_error(e))?,
            ),
            DbPool::SQLite(pool) => BackendConnection::SQLite(
                pool.acquire().await.map_err(|e| self.acquire_error(e))?,
            ),
        };
        Ok(Box::new(PooledConnection {
            inner: Some(connection),
        }))
    }

    async fn close(&self) {
        debug!(backend = self.product_name(), "Closing pool");
        impl_db_dispatch!(self, p => p.close().await)
    }

    fn is_closed(&self) -> bool {
        impl_db_dispatch!(self, p => p.is_closed())
    }
}

/// A connection checked out of one of the sqlx pools.
pub enum BackendConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

/// Logical connection over a sqlx pool connection.
///
/// Dropping the inner connection returns it to its pool.
pub struct PooledConnection {
    inner: Option<BackendConnection>,
}

impl PooledConnection {
    fn inner(&mut self) -> DbResult<&mut BackendConnection> {
        self.inner.as_mut().ok_or_else(|| {
            DbError::connection(
                "Connection has already been released",
                "Acquire a new connection from the pool",
            )
        })
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn execute(&mut self, command: &str) -> DbResult<u64> {
        let conn = self.inner()?;
        let rows = impl_conn_dispatch!(conn, c => {
            sqlx::Executor::execute(&mut **c, sqlx::raw_sql(command)).await?.rows_affected()
        });
        Ok(rows)
    }

    async fn metadata(&mut self) -> DbResult<DatabaseMetadata> {
        let conn = self.inner()?;
        let metadata = match conn {
            BackendConnection::MySql(c) => {
                let version = sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(&mut **c)
                    .await?;
                // MariaDB speaks the MySQL protocol and identifies itself in the version
                let product = if version.to_ascii_lowercase().contains("mariadb") {
                    "MariaDB"
                } else {
                    "MySQL"
                };
                DatabaseMetadata::new(product, Some(version))
            }
            BackendConnection::Postgres(c) => {
                let version = sqlx::query_scalar::<_, String>("SHOW server_version")
                    .fetch_one(&mut **c)
                    .await?;
                DatabaseMetadata::new("PostgreSQL", Some(version))
            }
            BackendConnection::SQLite(c) => {
                let version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(&mut **c)
                    .await?;
                DatabaseMetadata::new("SQLite", Some(version))
            }
        };
        debug!(
            product = %metadata.product_name,
            version = ?metadata.product_version,
            "Read connection metadata"
        );
        Ok(metadata)
    }

    async fn close(&mut self) -> DbResult<()> {
        if self.inner.take().is_none() {
            warn!("Connection released twice");
        }
        Ok(())
    }
}
