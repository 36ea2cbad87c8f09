//! SQL dialect resolution.
//!
//! The dialect is resolved once at startup with the precedence
//! explicit configuration > live connection metadata > URI scheme guess.
//! Metadata is read through a [`ConnectionProvider`]; any failure there is
//! logged and resolution falls through to the scheme guess.

use crate::config::Settings;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseMetadata, strip_qualifier};
use crate::provider::ConnectionProvider;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Scheme prefixes recognised by [`guess_dialect`], for error messages.
pub const RECOGNIZED_PREFIXES: &[&str] = &[
    "postgresql:",
    "postgres:",
    "postgre:",
    "mysql:",
    "mariadb:",
    "db2:",
    "sqlite:",
];

/// SQL syntax family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    MariaDb,
    Db2,
    Sqlite,
}

/// How positional parameters are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStyle {
    /// `$1, $2, ...`
    Dollar,
    /// `?, ?, ...`
    QuestionMark,
}

impl Dialect {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::MariaDb => "MariaDB",
            Self::Db2 => "DB2",
            Self::Sqlite => "SQLite",
        }
    }

    pub fn parameter_style(&self) -> ParameterStyle {
        match self {
            Self::Postgres => ParameterStyle::Dollar,
            _ => ParameterStyle::QuestionMark,
        }
    }

    /// Map a product name reported by connection metadata.
    pub fn from_product_name(product: &str) -> Option<Self> {
        let lower = product.to_ascii_lowercase();
        if lower.contains("postgres") {
            Some(Self::Postgres)
        } else if lower.contains("mariadb") {
            Some(Self::MariaDb)
        } else if lower.contains("mysql") {
            Some(Self::MySql)
        } else if lower.starts_with("db2") {
            Some(Self::Db2)
        } else if lower.contains("sqlite") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "db2" => Ok(Self::Db2),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(DbError::configuration(
                format!("Unknown dialect '{}'", s),
                "Use one of: postgres, mysql, mariadb, db2, sqlite",
            )),
        }
    }
}

/// Guess the dialect from the connection URI scheme.
pub fn guess_dialect(url: &str) -> Option<Dialect> {
    let url = strip_qualifier(url.trim()).to_ascii_lowercase();
    if url.starts_with("mysql:") {
        Some(Dialect::MySql)
    } else if url.starts_with("mariadb:") {
        Some(Dialect::MariaDb)
    } else if ["postgresql:", "postgres:", "postgre:"]
        .iter()
        .any(|p| url.starts_with(p))
    {
        Some(Dialect::Postgres)
    } else if url.starts_with("db2:") {
        Some(Dialect::Db2)
    } else if url.starts_with("sqlite:") {
        Some(Dialect::Sqlite)
    } else {
        None
    }
}

/// Builds a dialect from explicit configuration or connection metadata.
pub trait DialectFactory: Send + Sync {
    fn build_dialect(
        &self,
        explicit: Option<&str>,
        metadata: Option<&DatabaseMetadata>,
    ) -> DbResult<Dialect>;
}

/// Factory understanding the built-in dialect names and product names.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDialectFactory;

impl DialectFactory for StandardDialectFactory {
    fn build_dialect(
        &self,
        explicit: Option<&str>,
        metadata: Option<&DatabaseMetadata>,
    ) -> DbResult<Dialect> {
        if let Some(name) = explicit {
            return name.parse();
        }
        match metadata {
            Some(md) => Dialect::from_product_name(&md.product_name).ok_or_else(|| {
                DbError::dialect_resolution(format!(
                    "Unrecognized database product '{}'",
                    md.product_name
                ))
            }),
            None => Err(DbError::dialect_resolution(
                "No dialect configured and no metadata available",
            )),
        }
    }
}

/// Resolver built once from configuration and passed to whoever needs it.
pub struct DialectResolver<'a> {
    url: Option<String>,
    explicit: Option<String>,
    use_metadata_defaults: bool,
    factory: &'a dyn DialectFactory,
}

impl<'a> DialectResolver<'a> {
    pub fn new(settings: &Settings, factory: &'a dyn DialectFactory) -> Self {
        Self {
            url: settings.url.clone(),
            explicit: settings.dialect.clone(),
            use_metadata_defaults: settings.use_metadata_defaults,
            factory,
        }
    }

    /// Resolve the dialect, probing `provider` for metadata when allowed.
    pub async fn resolve(&self, provider: Option<&dyn ConnectionProvider>) -> DbResult<Dialect> {
        if let Some(name) = self.explicit.as_deref() {
            let dialect = self.factory.build_dialect(Some(name), None)?;
            info!(dialect = %dialect, "Using explicitly configured dialect");
            return Ok(dialect);
        }

        if self.use_metadata_defaults {
            if let Some(provider) = provider {
                match probe_metadata(provider).await {
                    Ok(metadata) => match self.factory.build_dialect(None, Some(&metadata)) {
                        Ok(dialect) => {
                            info!(
                                dialect = %dialect,
                                product = %metadata.product_name,
                                "Resolved dialect from connection metadata"
                            );
                            return Ok(dialect);
                        }
                        Err(e) => warn!(error = %e, "Metadata did not determine a dialect"),
                    },
                    Err(e) => warn!(error = %e, "Could not read connection metadata"),
                }
            }
        }

        if let Some(dialect) = self.url.as_deref().and_then(guess_dialect) {
            info!(dialect = %dialect, "Resolved dialect from URI scheme");
            return Ok(dialect);
        }

        Err(self.unresolved())
    }

    fn unresolved(&self) -> DbError {
        let prefixes = RECOGNIZED_PREFIXES
            .iter()
            .map(|p| format!("'{}'", p))
            .collect::<Vec<_>>()
            .join(", ");
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => DbError::dialect_resolution(format!(
                "could not determine Dialect from connection URI '{}' (specify a connection URI with scheme {})",
                url, prefixes
            )),
            None => DbError::dialect_resolution(format!(
                "could not determine Dialect from driver metadata (specify a connection URI with scheme {})",
                prefixes
            )),
        }
    }
}

/// Read metadata over a provisional connection, always handing it back.
async fn probe_metadata(provider: &dyn ConnectionProvider) -> DbResult<DatabaseMetadata> {
    let mut connection = provider.get_connection().await?;
    let metadata = connection.metadata().await;
    if let Err(e) = provider.close_connection(connection).await {
        debug!(error = %e, "Failed to release metadata probe connection");
    }
    metadata
}
