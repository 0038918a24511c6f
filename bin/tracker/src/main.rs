//! tokendist tracker: keeps ERC-1155 holder distributions in sync with the chain.
//!
//! Flow:
//! 1. Connect to the node RPC & PostgreSQL
//! 2. Every cycle, pick up newly registered contracts from `erc1155_contracts`
//! 3. For each tracked contract, fetch TransferSingle/TransferBatch/URI logs since its checkpoint
//! 4. Rebuild holder sets, confirm balances with `balanceOf`, and reconcile tokens + holdings
//!
//! A failed contract pass leaves its checkpoint untouched and is retried next cycle.

use std::sync::Arc;

use eyre::Result;
use tokendist_chain::{RpcLogSource, create_provider};
use tokendist_core::{Settings, telemetry};
use tokendist_engine::{ContractPipeline, HttpMetadataFetcher, Reconciler, Tracker};
use tokendist_storage::{self as storage, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // ── Initialisation ──────────────────────────────────────────────────
    telemetry::init();
    let settings = Settings::from_env()?;

    tracing::info!(
        rpc = %settings.rpc_url,
        interval_secs = settings.track_interval_secs,
        "Starting tokendist tracker"
    );

    let pool = storage::connect(&settings.database_url).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let provider = create_provider(&settings.rpc_url)?;
    let source = Arc::new(RpcLogSource::new(provider, settings.rpc_timeout()));
    tracing::info!("Connected to node RPC");

    // ── Wiring ──────────────────────────────────────────────────────────
    let store = Arc::new(PgStore::new(pool));
    let metadata = Arc::new(HttpMetadataFetcher::new(
        settings.metadata_timeout(),
        settings.ipfs_gateway.clone(),
    )?);

    let reconciler = Reconciler::new(source.clone(), store.clone(), store.clone(), metadata);
    let pipeline = ContractPipeline::new(
        source,
        store.clone(),
        reconciler,
        settings.start_block,
        settings.log_chunk_size,
    );
    let tracker = Tracker::new(store, pipeline, settings.track_interval());

    // ── Tracking Loop ───────────────────────────────────────────────────
    tokio::select! {
        _ = tracker.run_forever() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully…");
        }
    }

    tracing::info!("Tracker stopped.");
    Ok(())
}
