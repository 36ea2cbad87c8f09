//! DDL execution pipeline.
//!
//! A [`DdlTarget`] receives generated schema commands one at a time and runs
//! them, in the order received, on a single connection leased from the pool.
//! Commands are handed to a worker task over a channel so `accept` never
//! waits on the database; `release` is the only call that blocks.
//!
//! ```text
//! Preparing --prepare()--> Running --release()--> Released
//!     \_______________release()_____________________/
//! ```

use crate::db::pool::ConnectionPool;
use crate::error::{DbError, DbResult};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consumer of generated schema commands.
pub trait GenerationTarget {
    /// Start accepting commands.
    fn prepare(&mut self) -> DbResult<()>;

    /// Queue one command for execution.
    fn accept(&mut self, command: &str) -> DbResult<()>;

    /// Wait for every queued command to settle and give the connection back.
    fn release(&mut self) -> DbResult<()>;
}

/// Outcome counts of one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DdlSummary {
    pub executed: usize,
    pub failed: usize,
    /// Commands never attempted because no connection could be acquired.
    pub skipped: usize,
}

enum TargetState {
    Preparing,
    Running {
        statements: HashSet<String>,
        commands: mpsc::UnboundedSender<String>,
        worker: JoinHandle<DdlSummary>,
    },
    Released {
        summary: DdlSummary,
    },
}

impl TargetState {
    fn name(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Running { .. } => "running",
            Self::Released { .. } => "released",
        }
    }
}

/// Reactive generation target executing DDL through a [`ConnectionPool`].
pub struct DdlTarget {
    pool: Arc<ConnectionPool>,
    handle: Handle,
    state: TargetState,
}

impl std::fmt::Debug for DdlTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdlTarget")
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}

impl DdlTarget {
    /// Create a target whose worker runs on the runtime behind `handle`.
    pub fn new(pool: Arc<ConnectionPool>, handle: Handle) -> Self {
        Self {
            pool,
            handle,
            state: TargetState::Preparing,
        }
    }

    /// Counts of the finished run, available once released.
    pub fn summary(&self) -> Option<DdlSummary> {
        match self.state {
            TargetState::Released { summary } => Some(summary),
            _ => None,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, TargetState::Released { .. })
    }

    fn misuse(&self, operation: &str) -> DbError {
        DbError::invalid_state(format!(
            "cannot {} a DDL target that is {}",
            operation,
            self.state.name()
        ))
    }
}

impl GenerationTarget for DdlTarget {
    fn prepare(&mut self) -> DbResult<()> {
        if !matches!(self.state, TargetState::Preparing) {
            return Err(self.misuse("prepare"));
        }
        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = self
            .handle
            .spawn(run_commands(Arc::clone(&self.pool), receiver));
        debug!("DDL pipeline started");
        self.state = TargetState::Running {
            statements: HashSet::new(),
            commands,
            worker,
        };
        Ok(())
    }

    fn accept(&mut self, command: &str) -> DbResult<()> {
        let TargetState::Running {
            statements,
            commands,
            ..
        } = &mut self.state
        else {
            return Err(self.misuse("accept commands on"));
        };

        if !statements.insert(command.to_string()) {
            debug!(command = %command, "Ignoring duplicate DDL command");
            return Ok(());
        }
        commands
            .send(command.to_string())
            .map_err(|_| DbError::internal("DDL worker stopped before release"))
    }

    fn release(&mut self) -> DbResult<()> {
        match std::mem::replace(&mut self.state, TargetState::Preparing) {
            TargetState::Preparing => {
                self.state = TargetState::Released {
                    summary: DdlSummary::default(),
                };
                Ok(())
            }
            TargetState::Running {
                statements,
                commands,
                worker,
            } => {
                // Closing the channel lets the worker drain and finish
                drop(statements);
                drop(commands);
                let joined = block_on(&self.handle, worker);
                let summary = joined.unwrap_or_else(|e| {
                    warn!(error = %e, "DDL worker did not complete");
                    DdlSummary::default()
                });
                info!(
                    executed = summary.executed,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "DDL pipeline released"
                );
                self.state = TargetState::Released { summary };
                Ok(())
            }
            released @ TargetState::Released { .. } => {
                self.state = released;
                Err(self.misuse("release"))
            }
        }
    }
}

/// Block the calling thread on `future`.
///
/// Inside a multi-thread runtime the current worker is handed off first.
/// Calling this from an async task on a current-thread runtime panics.
fn block_on<F: Future>(handle: &Handle, future: F) -> F::Output {
    match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(future))
        }
        _ => handle.block_on(future),
    }
}

/// Worker body: lease one connection and run commands strictly in order.
async fn run_commands(
    pool: Arc<ConnectionPool>,
    mut receiver: mpsc::UnboundedReceiver<String>,
) -> DdlSummary {
    let mut summary = DdlSummary::default();
    let mut connection = match pool.get_connection().await {
        Ok(connection) => Some(connection),
        Err(e) => {
            warn!(error = %e, "Could not acquire a connection for DDL; commands will be skipped");
            None
        }
    };

    while let Some(command) = receiver.recv().await {
        let Some(conn) = connection.as_mut() else {
            summary.skipped += 1;
            continue;
        };
        match conn.execute(&command).await {
            Ok(_) => {
                debug!(command = %command, "DDL command executed");
                summary.executed += 1;
            }
            Err(e) => {
                warn!(command = %command, error = %e, "DDL command failed");
                summary.failed += 1;
            }
        }
    }

    if let Some(mut conn) = connection {
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to release DDL connection");
        }
    }
    summary
}
