//! BartMart Indexer — mirrors on-chain order state into the Redis projection.
//!
//! Flow:
//! 1. Connect to the RPC endpoint & Redis
//! 2. Poll for new blocks, decode OrderCreated/OrderFulfilled/OrderCancelled
//! 3. Apply each event to the projection and advance the block cursor
//!
//! The cursor only moves after a whole batch lands, so a crashed or failed
//! run is retried from the same range on the next pass.

use bartmart_chain::{RpcChainReader, provider};
use bartmart_core::{Settings, telemetry};
use bartmart_indexer::IncrementalIndexer;
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let settings = Settings::from_env()?;

    tracing::info!(rpc = %settings.rpc_url, contract = %settings.contract_address, "Starting BartMart indexer");

    let store = bartmart_storage::connect(&settings.redis_url)
        .await
        .map_err(|e| eyre::eyre!("failed to connect to Redis: {e}"))?;
    tracing::info!("Connected to Redis");

    let provider = provider::create_provider(&settings.rpc_url)?;
    let contract_address = settings.contract_address.parse()?;
    let reader = RpcChainReader::new(provider, contract_address);
    tracing::info!("Connected to RPC");

    let indexer =
        IncrementalIndexer::new(reader, store).with_lookback(settings.lookback_blocks);

    let poll_interval = std::time::Duration::from_secs(settings.poll_interval_secs);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully…");
                break;
            }
            result = indexer.run() => {
                match result {
                    Ok(0) => tokio::time::sleep(poll_interval).await,
                    Ok(processed) => tracing::info!(processed, "indexing pass complete"),
                    Err(e) => {
                        tracing::error!(error = %e, "indexing pass failed, retrying after interval");
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        }
    }

    tracing::info!("Indexer stopped.");
    Ok(())
}
