//! The coordinator binary: bootstraps tracing and coordinator-level
//! config, wires a [`foundry_scheduler::Scheduler`] to the in-memory
//! `JobStore`/`EntityStore` reference implementation ("Shared
//! resources" — the real persistence backend is an out-of-scope
//! collaborator; this binary ships the seam, not a SQL-backed one), and
//! runs the tick loop forever.
//!
//! Script AST registration and subcontractor module registration are
//! themselves out-of-scope collaborators (blueprint/config rendering,
//! pluggable subcontractor modules) — this binary starts with an empty
//! script catalog and the builtin-only registry, which is what a fresh
//! coordinator process looks like before an operator loads blueprints.

use std::collections::HashMap;
use std::sync::Arc;

use foundry_config::CoordinatorConfig;
use foundry_runtime::Registry;
use foundry_scheduler::{InMemoryEntityStore, InMemoryJobStore, Scheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CoordinatorConfig::new().populate_env();
    config.validate()?;
    info!(
        default_ttl = config.default_ttl,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "coordinator starting"
    );

    let jobs = Arc::new(InMemoryJobStore::new());
    let entities = Arc::new(InMemoryEntityStore::new());
    let scripts = HashMap::new();
    let registry = Registry::new();

    let scheduler = Scheduler::new(jobs, entities, scripts, registry, config);
    scheduler.run_forever().await;
}
