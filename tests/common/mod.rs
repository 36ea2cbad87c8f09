//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use reactive_pool::db::{Connection, Pool};
use reactive_pool::error::{DbError, DbResult};
use reactive_pool::models::DatabaseMetadata;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something observed by a [`RecordingPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Executed(String),
    Failed(String),
    Closed,
}

/// Why a [`RecordingPool`] refuses to hand out connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Server down.
    Unreachable,
    /// Server up, login rejected.
    BadPassword,
}

/// In-memory pool recording every command its connections see.
#[derive(Default)]
pub struct RecordingPool {
    pub events: Arc<Mutex<Vec<Event>>>,
    delays: HashMap<String, Duration>,
    failures: Vec<String>,
    product: Option<String>,
    refusal: Option<Refusal>,
    pub acquired: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self {
            product: Some("PostgreSQL".to_string()),
            ..Self::default()
        }
    }

    /// Make `command` take `delay` to execute.
    pub fn with_delay(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    /// Make `command` fail with a database error.
    pub fn with_failure(mut self, command: &str) -> Self {
        self.failures.push(command.to_string());
        self
    }

    /// Product name reported by connection metadata.
    pub fn with_product(mut self, product: &str) -> Self {
        self.product = Some(product.to_string());
        self
    }

    /// Refuse every acquisition as if the server were down.
    pub fn unreachable(self) -> Self {
        self.refusing(Refusal::Unreachable)
    }

    pub fn refusing(mut self, refusal: Refusal) -> Self {
        self.refusal = Some(refusal);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Executed(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Pool for RecordingPool {
    async fn acquire(&self) -> DbResult<Box<dyn Connection>> {
        match self.refusal {
            Some(Refusal::Unreachable) => {
                return Err(DbError::connection(
                    "I/O error: connection refused",
                    "Check network connectivity and database server status",
                ));
            }
            Some(Refusal::BadPassword) => {
                return Err(DbError::database(
                    "password authentication failed for user \"app\"",
                    Some("28P01".to_string()),
                    "Check the credentials",
                ));
            }
            None => {}
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingConnection {
            events: Arc::clone(&self.events),
            delays: self.delays.clone(),
            failures: self.failures.clone(),
            product: self.product.clone(),
        }))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }
}

struct RecordingConnection {
    events: Arc<Mutex<Vec<Event>>>,
    delays: HashMap<String, Duration>,
    failures: Vec<String>,
    product: Option<String>,
}

impl RecordingConnection {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&mut self, command: &str) -> DbResult<u64> {
        self.record(Event::Started(command.to_string()));
        if let Some(delay) = self.delays.get(command) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.iter().any(|f| f == command) {
            self.record(Event::Failed(command.to_string()));
            return Err(DbError::database(
                format!("relation in '{}' already exists", command),
                Some("42P07".to_string()),
                "Check the statement",
            ));
        }
        self.record(Event::Executed(command.to_string()));
        Ok(0)
    }

    async fn metadata(&mut self) -> DbResult<DatabaseMetadata> {
        match &self.product {
            Some(product) => Ok(DatabaseMetadata::new(product.clone(), None)),
            None => Err(DbError::database("metadata unsupported", None, "")),
        }
    }

    async fn close(&mut self) -> DbResult<()> {
        self.record(Event::Closed);
        Ok(())
    }
}
