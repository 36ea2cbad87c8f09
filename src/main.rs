//! reactive-pool - Main entry point.
//!
//! Resolves the driver, credentials and dialect for a connection URI, then
//! optionally applies a DDL script through the schema pipeline.

use clap::Parser;
use reactive_pool::config::Config;
use reactive_pool::db::DriverRegistry;
use reactive_pool::runtime::PoolRuntime;
use reactive_pool::schema::{GenerationTarget, split_statements};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    info!("Starting reactive-pool v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.settings();
    let registry = DriverRegistry::with_defaults();
    info!(drivers = ?registry.names(), "Registered drivers");

    let runtime = match PoolRuntime::start(&settings, &registry).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Startup failed");
            return Err(e.into());
        }
    };

    info!(
        dialect = %runtime.dialect(),
        degraded = runtime.is_degraded(),
        "Runtime started"
    );

    if let Some(path) = &config.ddl {
        let script = std::fs::read_to_string(path)?;
        let statements = split_statements(&script, runtime.dialect())?;
        info!(path = %path.display(), statements = statements.len(), "Applying DDL script");

        let mut target = runtime.schema_target();
        let target = tokio::task::spawn_blocking(move || {
            target.prepare()?;
            for statement in &statements {
                target.accept(statement)?;
            }
            target.release()?;
            Ok::<_, reactive_pool::DbError>(target)
        })
        .await??;

        if let Some(summary) = target.summary() {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    runtime.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
