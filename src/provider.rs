//! Connection providers used during startup.
//!
//! A [`ConnectionProvider`] hands out provisional connections, mostly for the
//! metadata probe of dialect resolution. [`DefensiveProvider`] wraps another
//! provider and degrades to a fast-failing state when the backend cannot be
//! used while it is being configured.

use crate::config::Settings;
use crate::db::driver::{Connection, Pool};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Prepare the provider. Called once before any connection is requested.
    async fn configure(&mut self, _settings: &Settings) -> DbResult<()> {
        Ok(())
    }

    async fn get_connection(&self) -> DbResult<Box<dyn Connection>>;

    async fn close_connection(&self, connection: Box<dyn Connection>) -> DbResult<()>;

    fn supports_aggressive_release(&self) -> bool {
        false
    }

    async fn stop(&self) {}
}

/// Provider handing out connections from a backend pool.
pub struct PoolProvider {
    pool: Arc<dyn Pool>,
}

impl PoolProvider {
    pub fn new(pool: Arc<dyn Pool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionProvider for PoolProvider {
    /// Probe the backend with one acquire/release round trip.
    async fn configure(&mut self, _settings: &Settings) -> DbResult<()> {
        let mut connection = self.pool.acquire().await?;
        connection.close().await?;
        debug!("Backend reachable");
        Ok(())
    }

    async fn get_connection(&self) -> DbResult<Box<dyn Connection>> {
        self.pool.acquire().await
    }

    async fn close_connection(&self, mut connection: Box<dyn Connection>) -> DbResult<()> {
        connection.close().await
    }
}

/// Whether the wrapped provider may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateState {
    Ready,
    Unavailable { reason: String },
}

/// Wrapper that absorbs backend failures during configuration.
///
/// Only fatal errors (bad configuration) propagate out of `configure`; an
/// unreachable server, rejected credentials or any other backend failure
/// leaves the wrapper unavailable instead.
///
/// Once unavailable, connection requests fail immediately with
/// [`DbError::Unavailable`] and never reach the delegate. Release, capability
/// and stop calls are always forwarded.
pub struct DefensiveProvider<P> {
    delegate: P,
    state: DelegateState,
}

impl<P: ConnectionProvider> DefensiveProvider<P> {
    pub fn new(delegate: P) -> Self {
        Self {
            delegate,
            state: DelegateState::Ready,
        }
    }

    pub fn state(&self) -> &DelegateState {
        &self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == DelegateState::Ready
    }

    pub fn delegate(&self) -> &P {
        &self.delegate
    }
}

#[async_trait]
impl<P: ConnectionProvider> ConnectionProvider for DefensiveProvider<P> {
    async fn configure(&mut self, settings: &Settings) -> DbResult<()> {
        match self.delegate.configure(settings).await {
            Ok(()) => {
                self.state = DelegateState::Ready;
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "Database not usable; continuing without connection metadata");
                self.state = DelegateState::Unavailable {
                    reason: e.to_string(),
                };
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_connection(&self) -> DbResult<Box<dyn Connection>> {
        match &self.state {
            DelegateState::Ready => self.delegate.get_connection().await,
            DelegateState::Unavailable { reason } => Err(DbError::unavailable(reason.clone())),
        }
    }

    async fn close_connection(&self, connection: Box<dyn Connection>) -> DbResult<()> {
        self.delegate.close_connection(connection).await
    }

    fn supports_aggressive_release(&self) -> bool {
        self.delegate.supports_aggressive_release()
    }

    async fn stop(&self) {
        info!("Stopping connection provider");
        self.delegate.stop().await
    }
}
