//! Driver registry and pool factory.
//!
//! Pool construction is two-tier. When exactly one driver is registered it is
//! used directly (the ambient path). Otherwise the registered drivers are
//! enumerated in registration order and the first one claiming the URI scheme
//! wins, so the choice is deterministic for a fixed driver set.

use crate::config::PoolOptions;
use crate::db::driver::{Driver, MySqlDriver, Pool, PostgresDriver, SqliteDriver};
use crate::error::{DbError, DbResult};
use crate::models::ConnectOptions;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered set of driver candidates.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in sqlx drivers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresDriver));
        registry.register(Arc::new(MySqlDriver));
        registry.register(Arc::new(SqliteDriver));
        registry
    }

    /// Register a driver. Earlier registrations win scheme ties.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        debug!(driver = driver.name(), schemes = ?driver.schemes(), "Registering driver");
        self.drivers.push(driver);
    }

    /// Registered driver names in enumeration order.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    /// First driver claiming `scheme`, in registration order.
    pub fn find(&self, scheme: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.iter().find(|d| d.matches_scheme(scheme))
    }

    /// The single registered driver, if the choice is unambiguous.
    fn ambient(&self) -> DbResult<&Arc<dyn Driver>> {
        match self.drivers.as_slice() {
            [only] => Ok(only),
            [] => Err(DbError::configuration(
                "No database driver is registered",
                "Register a driver for the URI scheme",
            )),
            many => Err(DbError::configuration(
                format!(
                    "{} database drivers are registered; cannot choose one implicitly",
                    many.len()
                ),
                "The driver is selected by URI scheme instead",
            )),
        }
    }

    /// Build a pool for `scheme` with the given options.
    ///
    /// Each driver is asked at most once. When the sole driver claims the
    /// scheme and fails, its own error is returned.
    pub fn create_pool(
        &self,
        scheme: &str,
        connect: &ConnectOptions,
        options: &PoolOptions,
    ) -> DbResult<Arc<dyn Pool>> {
        let (tried, ambient_error) = match self.ambient() {
            Ok(driver) => match driver.create_pool(connect, options) {
                Ok(pool) => {
                    info!(driver = driver.name(), scheme = %scheme, "Created pool with sole driver");
                    return Ok(pool);
                }
                Err(e) if driver.matches_scheme(scheme) => return Err(e),
                Err(e) => (Some(driver), e),
            },
            Err(e) => (None, e),
        };
        debug!(error = %ambient_error, "Ambient driver selection failed, matching by scheme");

        let candidate = self
            .drivers
            .iter()
            .filter(|d| !tried.is_some_and(|t| Arc::ptr_eq(t, *d)))
            .find(|d| d.matches_scheme(scheme));
        match candidate {
            Some(driver) => {
                info!(driver = driver.name(), scheme = %scheme, "Created pool for scheme");
                driver.create_pool(connect, options)
            }
            None => Err(DbError::no_suitable_driver(scheme, ambient_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::Connection;
    use async_trait::async_trait;
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullPool;

    #[async_trait]
    impl Pool for NullPool {
        async fn acquire(&self) -> DbResult<Box<dyn Connection>> {
            Err(DbError::unavailable("null pool"))
        }

        async fn close(&self) {}

        fn is_closed(&self) -> bool {
            false
        }
    }

    struct FakeDriver {
        name: &'static str,
        schemes: &'static [&'static str],
        fails: bool,
        created: AtomicUsize,
    }

    impl FakeDriver {
        fn new(name: &'static str, schemes: &'static [&'static str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                schemes,
                fails: false,
                created: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str, schemes: &'static [&'static str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                schemes,
                fails: true,
                created: AtomicUsize::new(0),
            })
        }
    }

    impl Driver for FakeDriver {
        fn name(&self) -> &str {
            self.name
        }

        fn schemes(&self) -> &[&'static str] {
            self.schemes
        }

        fn create_pool(&self, _: &ConnectOptions, _: &PoolOptions) -> DbResult<Arc<dyn Pool>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                return Err(DbError::configuration("unsupported option", "drop it"));
            }
            Ok(Arc::new(NullPool))
        }
    }

    fn connect_options() -> ConnectOptions {
        ConnectOptions {
            host: "localhost".to_string(),
            port: Some(5432),
            database: "db".to_string(),
            username: "app".to_string(),
            password: None,
            pool_size: 5,
        }
    }

    #[test]
    fn test_sole_driver_is_used_ambiently() {
        let only = FakeDriver::new("only", &["mysql"]);
        let mut registry = DriverRegistry::new();
        registry.register(only.clone());

        registry
            .create_pool("postgres", &connect_options(), &PoolOptions::default())
            .unwrap();
        assert_eq!(only.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_sole_driver_is_asked_once() {
        let only = FakeDriver::failing("only", &["postgres"]);
        let mut registry = DriverRegistry::new();
        registry.register(only.clone());

        let result = registry.create_pool("postgres", &connect_options(), &PoolOptions::default());
        let Err(err) = result else {
            panic!("failing driver must not produce a pool");
        };
        assert!(matches!(err, DbError::Configuration { .. }));
        assert!(err.to_string().contains("unsupported option"));
        assert_eq!(only.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_sole_driver_for_other_scheme_is_not_retried() {
        let only = FakeDriver::failing("only", &["mysql"]);
        let mut registry = DriverRegistry::new();
        registry.register(only.clone());

        let result = registry.create_pool("postgres", &connect_options(), &PoolOptions::default());
        let Err(err) = result else {
            panic!("failing driver must not produce a pool");
        };
        assert!(matches!(err, DbError::NoSuitableDriver { .. }));
        assert!(err.source().unwrap().to_string().contains("unsupported option"));
        assert_eq!(only.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_many_drivers_fall_back_to_scheme_match() {
        let pg = FakeDriver::new("pg", &["postgres", "postgresql"]);
        let my = FakeDriver::new("my", &["mysql"]);
        let mut registry = DriverRegistry::new();
        registry.register(my.clone());
        registry.register(pg.clone());

        registry
            .create_pool("PostgreSQL", &connect_options(), &PoolOptions::default())
            .unwrap();
        assert_eq!(pg.created.load(Ordering::SeqCst), 1);
        assert_eq!(my.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let first = FakeDriver::new("first", &["db2"]);
        let second = FakeDriver::new("second", &["db2"]);
        let other = FakeDriver::new("other", &["mysql"]);
        let mut registry = DriverRegistry::new();
        registry.register(other);
        registry.register(first.clone());
        registry.register(second.clone());

        for _ in 0..10 {
            registry
                .create_pool("db2", &connect_options(), &PoolOptions::default())
                .unwrap();
            assert_eq!(registry.find("db2").unwrap().name(), "first");
        }
        assert_eq!(first.created.load(Ordering::SeqCst), 10);
        assert_eq!(second.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_registry_reports_scheme() {
        let registry = DriverRegistry::new();
        let result = registry.create_pool("postgres", &connect_options(), &PoolOptions::default());
        let Err(err) = result else {
            panic!("empty registry must fail");
        };
        assert!(matches!(err, DbError::NoSuitableDriver { ref scheme, .. } if scheme == "postgres"));
        assert!(err.source().unwrap().to_string().contains("No database driver"));
    }

    #[test]
    fn test_unmatched_scheme_keeps_ambient_failure() {
        let mut registry = DriverRegistry::new();
        registry.register(FakeDriver::new("pg", &["postgres"]));
        registry.register(FakeDriver::new("my", &["mysql"]));

        let result = registry.create_pool("oracle", &connect_options(), &PoolOptions::default());
        let Err(err) = result else {
            panic!("unmatched scheme must fail");
        };
        assert!(err.to_string().contains("oracle"));
        assert!(err.source().unwrap().to_string().contains("2 database drivers"));
    }

    #[test]
    fn test_default_registry_order() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["sqlx-postgres", "sqlx-mysql", "sqlx-sqlite"]
        );
        assert_eq!(registry.find("mariadb").unwrap().name(), "sqlx-mysql");
        assert!(registry.find("db2").is_none());
    }
}
