//! Backend dispatch macros for reducing code duplication.
//!
//! The sqlx backends expose identical operations on distinct concrete types.
//! These declarative macros expand one body per backend variant, keeping the
//! per-backend code readable without trait objects over sqlx types.

/// Dispatch over `DbPool` variants.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, p => p.close().await)
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool {
            $crate::db::backend::DbPool::MySql($p) => $body,
            $crate::db::backend::DbPool::Postgres($p) => $body,
            $crate::db::backend::DbPool::SQLite($p) => $body,
        }
    };
}

/// Dispatch over `BackendConnection` variants, binding a `&mut` to the
/// underlying sqlx connection.
#[macro_export]
macro_rules! impl_conn_dispatch {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            $crate::db::backend::BackendConnection::MySql($c) => $body,
            $crate::db::backend::BackendConnection::Postgres($c) => $body,
            $crate::db::backend::BackendConnection::SQLite($c) => $body,
        }
    };
}

pub use impl_conn_dispatch;
pub use impl_db_dispatch;
