//! Connection-related data models.
//!
//! This module defines the resolved connect options handed to drivers and the
//! metadata read back from a live connection.

use crate::config::{DEFAULT_POOL_SIZE, Settings};
use crate::error::{DbError, DbResult};
use crate::models::uri::ConnectionUri;
use serde::Serialize;

/// Fully resolved options for opening connections to one database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: Option<u16>,
    /// Database name, or file path for SQLite.
    pub database: String,
    pub username: String,
    /// Contains sensitive data - never log. `None` leaves auth to the driver.
    pub password: Option<String>,
    pub pool_size: u32,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl ConnectOptions {
    /// Resolve connect options from a parsed URI and the configured settings.
    ///
    /// Credential precedence: explicit settings, then URI user-info, then
    /// `user=` / `pass=` / `password=` parameters.
    pub fn resolve(uri: &ConnectionUri, settings: &Settings) -> DbResult<Self> {
        let (param_user, param_password) = uri.param_credentials();

        let username = settings
            .username
            .as_deref()
            .or(uri.user_info_username())
            .or(param_user)
            .unwrap_or_default()
            .to_string();
        let password = settings
            .password
            .as_deref()
            .or(uri.user_info_password())
            .or(param_password)
            .map(String::from);

        let networked = uri.family().is_none_or(|f| f.is_networked());
        if networked && username.is_empty() {
            return Err(DbError::configuration(
                format!("Missing credentials: no username for scheme '{}'", uri.scheme()),
                "Set the username explicitly, in the URI user-info, or as a 'user=' parameter",
            ));
        }

        Ok(Self {
            host: uri.host().unwrap_or_default().to_string(),
            port: uri.port(),
            database: uri.database().to_string(),
            username,
            password,
            pool_size: settings.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
        })
    }
}

/// Product information read from a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseMetadata {
    /// e.g., "PostgreSQL", "MySQL", "MariaDB", "SQLite"
    pub product_name: String,
    pub product_version: Option<String>,
}

impl DatabaseMetadata {
    pub fn new(product_name: impl Into<String>, product_version: Option<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(url: &str, settings: Settings) -> DbResult<ConnectOptions> {
        let uri = ConnectionUri::parse(url)?;
        ConnectOptions::resolve(&uri, &settings)
    }

    #[test]
    fn test_user_info_credentials_and_default_pool_size() {
        let opts = resolve("postgres://user:pw@host:5432/mydb", Settings::default()).unwrap();
        assert_eq!(opts.host, "host");
        assert_eq!(opts.port, Some(5432));
        assert_eq!(opts.database, "mydb");
        assert_eq!(opts.username, "user");
        assert_eq!(opts.password.as_deref(), Some("pw"));
        assert_eq!(opts.pool_size, 5);
    }

    #[test]
    fn test_db2_path_credentials() {
        let opts = resolve(
            "db2://dbhost:50000/mydb:user=alice;password=secret",
            Settings::default(),
        )
        .unwrap();
        assert_eq!(opts.database, "mydb");
        assert_eq!(opts.username, "alice");
        assert_eq!(opts.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_explicit_credentials_win() {
        let settings = Settings {
            username: Some("admin".to_string()),
            password: Some("root".to_string()),
            pool_size: Some(12),
            ..Settings::default()
        };
        let opts = resolve("mysql://user:pw@host/shop?user=other", settings).unwrap();
        assert_eq!(opts.username, "admin");
        assert_eq!(opts.password.as_deref(), Some("root"));
        assert_eq!(opts.pool_size, 12);
    }

    #[test]
    fn test_explicit_username_with_param_password() {
        let settings = Settings {
            username: Some("admin".to_string()),
            ..Settings::default()
        };
        let opts = resolve("mysql://host/shop?pass=s3cret", settings).unwrap();
        assert_eq!(opts.username, "admin");
        assert_eq!(opts.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_password_is_optional() {
        let opts = resolve("postgres://host/db?user=app", Settings::default()).unwrap();
        assert_eq!(opts.username, "app");
        assert!(opts.password.is_none());
    }

    #[test]
    fn test_missing_username_is_configuration_error() {
        let err = resolve("postgres://host/db", Settings::default()).unwrap_err();
        assert!(matches!(err, DbError::Configuration { .. }));
        assert!(err.to_string().contains("Missing credentials"));
    }

    #[test]
    fn test_sqlite_needs_no_username() {
        let opts = resolve("sqlite:data.db", Settings::default()).unwrap();
        assert_eq!(opts.database, "data.db");
        assert!(opts.username.is_empty());
    }

    #[test]
    fn test_debug_masks_password() {
        let opts = resolve("postgres://u:topsecret@h/db", Settings::default()).unwrap();
        let rendered = format!("{:?}", opts);
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("****"));
    }
}
