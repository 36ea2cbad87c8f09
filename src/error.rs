//! Error types for the pool runtime.
//!
//! This module defines all error types using `thiserror`. Variants follow the
//! failure classes of the runtime: configuration and dialect-resolution
//! failures are fatal at startup, connection-unavailable failures are
//! recovered where a degraded path exists, and command failures are absorbed
//! by the DDL pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("No suitable driver found for URI scheme: {scheme}")]
    NoSuitableDriver {
        scheme: String,
        /// Failure of the ambient (single driver) attempt.
        #[source]
        source: Box<DbError>,
    },

    #[error("{message}")]
    DialectResolution { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P07" for duplicate table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection not available: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a "no suitable driver" error keeping the ambient failure as source.
    pub fn no_suitable_driver(scheme: impl Into<String>, source: DbError) -> Self {
        Self::NoSuitableDriver {
            scheme: scheme.into(),
            source: Box::new(source),
        }
    }

    /// Create a dialect resolution error.
    pub fn dialect_resolution(message: impl Into<String>) -> Self {
        Self::DialectResolution {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a "not available" error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::NoSuitableDriver { .. } => {
                Some("Register a driver that declares this scheme, or fix the URI scheme")
            }
            _ => None,
        }
    }

    /// Check if this error means the backend could not be reached at all.
    pub fn is_connection_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::PoolClosed
        )
    }

    /// Check if this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::NoSuitableDriver { .. }
                | Self::DialectResolution { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::configuration(
                msg.to_string(),
                "Check the connection URI format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the statement syntax and referenced objects",
                )
            }
            // The configured timeout is not known here; DbPool::acquire reports it
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Raise the acquire timeout or the pool size",
            ),
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "The server returned no metadata row",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for runtime operations.
pub type DbResult<T> = Result<T, DbError>;
