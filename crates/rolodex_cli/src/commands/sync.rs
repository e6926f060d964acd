//! Sync command implementation.

use crate::http_client::ReqwestClient;
use rolodex_core::Database;
use rolodex_sync_engine::{
    DatabaseStore, EngineStores, HttpTransport, StaticTokenSource, SyncConfig, SyncOrchestrator,
    TracingDiagnostics,
};
use std::path::Path;
use std::sync::Arc;

/// Runs one push-then-pull cycle and prints the outcome.
pub fn run(
    db_path: &Path,
    server: &str,
    token: Option<String>,
    batch_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::new(server).with_batch_size(batch_size);
    tracing::info!(server, batch_size, "starting sync cycle");

    let db = Arc::new(Database::open(db_path)?);
    let store = Arc::new(DatabaseStore::new(db));
    let client = ReqwestClient::new(config.timeout)?;
    let transport = HttpTransport::new(server, client);
    let tokens = match token {
        Some(secret) => StaticTokenSource::with_token(secret),
        None => StaticTokenSource::locked(),
    };

    let orchestrator = SyncOrchestrator::new(
        config,
        transport,
        Arc::new(tokens),
        EngineStores::from_shared(store),
        Arc::new(TracingDiagnostics),
    );

    let outcome = orchestrator.run_cycle()?;

    println!(
        "push: {} attempted, {} applied, {} conflicts, {} errors",
        outcome.push.attempted, outcome.push.applied, outcome.push.conflicts, outcome.push.errors
    );
    println!(
        "pull: {} contacts ({} deleted), {} groups ({} deleted)",
        outcome.pull.contacts_upserted + outcome.pull.contacts_deleted,
        outcome.pull.contacts_deleted,
        outcome.pull.groups_upserted + outcome.pull.groups_deleted,
        outcome.pull.groups_deleted
    );
    match outcome.watermark {
        Some(at) => println!("watermark: {at}"),
        None => println!("watermark: none"),
    }

    if outcome.success {
        println!("sync finished in {} ms", outcome.duration.as_millis());
        Ok(())
    } else {
        let retry_in = orchestrator.config().backoff.delay_for_attempt(0);
        println!("retry suggested in {} s", retry_in.as_secs());
        Err(outcome
            .error
            .unwrap_or_else(|| "sync failed".to_string())
            .into())
    }
}
