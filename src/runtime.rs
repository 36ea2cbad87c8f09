//! Startup wiring.
//!
//! [`PoolRuntime::start`] turns [`Settings`] into a ready connection pool
//! facade and a resolved dialect:
//!
//! 1. open the backend pool (external, or built through the driver registry)
//! 2. configure a defensive metadata provider over that pool
//! 3. resolve the dialect (explicit > metadata > URI scheme)
//! 4. wrap the pool in a [`ConnectionPool`] facade
//!
//! Any startup failure closes a pool this runtime created.

use crate::config::Settings;
use crate::db::driver::Pool;
use crate::db::pool::{ConnectionPool, PoolOwnership, PoolPolicy, open_backend};
use crate::db::registry::DriverRegistry;
use crate::dialect::{Dialect, DialectFactory, DialectResolver, StandardDialectFactory};
use crate::error::DbResult;
use crate::provider::{ConnectionProvider, DefensiveProvider, DelegateState, PoolProvider};
use crate::schema::DdlTarget;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

pub struct PoolRuntime {
    pool: Arc<ConnectionPool>,
    dialect: Dialect,
    provider: Option<DefensiveProvider<PoolProvider>>,
    handle: Handle,
}

impl std::fmt::Debug for PoolRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRuntime")
            .field("pool", &self.pool)
            .field("dialect", &self.dialect)
            .field("provider_state", &self.provider_state())
            .finish()
    }
}

impl PoolRuntime {
    /// Start with the built-in dialect factory.
    pub async fn start(settings: &Settings, registry: &DriverRegistry) -> DbResult<Self> {
        Self::start_with_factory(settings, registry, &StandardDialectFactory).await
    }

    pub async fn start_with_factory(
        settings: &Settings,
        registry: &DriverRegistry,
        factory: &dyn DialectFactory,
    ) -> DbResult<Self> {
        settings.validate()?;
        let (backend, ownership) = open_backend(settings, registry)?;

        match Self::resolve(settings, &backend, factory).await {
            Ok((dialect, provider)) => {
                let policy = PoolPolicy {
                    show_sql: settings.show_sql,
                    parameter_style: dialect.parameter_style(),
                };
                info!(
                    dialect = %dialect,
                    ownership = ?ownership,
                    parameter_style = ?policy.parameter_style,
                    "Connection pool ready"
                );
                Ok(Self {
                    pool: Arc::new(ConnectionPool::new(backend, ownership, policy)),
                    dialect,
                    provider,
                    handle: Handle::current(),
                })
            }
            Err(e) => {
                if ownership == PoolOwnership::Owned {
                    warn!(error = %e, "Startup failed; closing connection pool");
                    backend.close().await;
                }
                Err(e)
            }
        }
    }

    async fn resolve(
        settings: &Settings,
        backend: &Arc<dyn Pool>,
        factory: &dyn DialectFactory,
    ) -> DbResult<(Dialect, Option<DefensiveProvider<PoolProvider>>)> {
        // An explicit dialect wins outright, so there is nothing to probe
        let provider = if settings.use_metadata_defaults && settings.dialect.is_none() {
            let mut provider = DefensiveProvider::new(PoolProvider::new(Arc::clone(backend)));
            provider.configure(settings).await?;
            Some(provider)
        } else {
            None
        };

        let resolver = DialectResolver::new(settings, factory);
        let dialect = resolver
            .resolve(provider.as_ref().map(|p| p as &dyn ConnectionProvider))
            .await?;
        Ok((dialect, provider))
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// State of the metadata provider, when one was configured.
    pub fn provider_state(&self) -> Option<&DelegateState> {
        self.provider.as_ref().map(|p| p.state())
    }

    /// True when the backend was unreachable at startup.
    pub fn is_degraded(&self) -> bool {
        matches!(self.provider_state(), Some(DelegateState::Unavailable { .. }))
    }

    /// A fresh DDL pipeline over this runtime's pool.
    pub fn schema_target(&self) -> DdlTarget {
        DdlTarget::new(Arc::clone(&self.pool), self.handle.clone())
    }

    /// Stop the provider and close the facade. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(provider) = &self.provider {
            provider.stop().await;
        }
        self.pool.close().await;
    }
}
