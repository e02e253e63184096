//! Full sync: rebuild the order projection straight from contract storage.
//!
//! Disaster-recovery and bootstrap path. Walks every order id ever assigned
//! and overwrites the projected record with what the contract reports,
//! independent of event history and without touching the indexer cursor.

use bartmart_chain::{ChainReader, OrderState};
use bartmart_storage::KvStore;
use bartmart_storage::models::Order;
use bartmart_storage::repos;
use futures::future::join_all;

use crate::IndexError;

/// How many order slots are read concurrently per sweep batch.
pub const DEFAULT_SYNC_BATCH: usize = 50;

pub struct FullSync<C, S> {
    reader: C,
    store: S,
    batch_size: usize,
}

impl<C: ChainReader, S: KvStore> FullSync<C, S> {
    pub fn new(reader: C, store: S) -> Self {
        Self {
            reader,
            store,
            batch_size: DEFAULT_SYNC_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sweep all orders `0..orderCount`, upserting each from contract state.
    ///
    /// A failure on one id is logged and that id skipped; the sweep carries
    /// on. Returns how many orders were written.
    pub async fn run(&self) -> Result<u64, IndexError> {
        let count = self.reader.read_order_count().await?;
        tracing::info!(count, "starting full order sync");

        let ids: Vec<u64> = (0..count).collect();
        let mut synced = 0u64;
        for chunk in ids.chunks(self.batch_size) {
            let results = join_all(chunk.iter().map(|id| self.sync_order(*id))).await;
            synced += results.into_iter().filter(|ok| *ok).count() as u64;
        }

        tracing::info!(synced, count, "full order sync finished");
        Ok(synced)
    }

    async fn sync_order(&self, order_id: u64) -> bool {
        match self.try_sync_order(order_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(order_id, error = %e, "failed to sync order, skipping");
                false
            }
        }
    }

    async fn try_sync_order(&self, order_id: u64) -> Result<(), IndexError> {
        let state = self.reader.read_order(order_id).await?;
        let order = project(order_id, &state);
        repos::save_order(&self.store, &order).await?;
        Ok(())
    }
}

/// Contract storage has no event context, so the timestamp and transaction
/// fields are left unset here; the upsert only writes present fields, which
/// preserves whatever the event path recorded earlier.
fn project(order_id: u64, state: &OrderState) -> Order {
    Order {
        order_id,
        creator: format!("{:#x}", state.creator),
        input_token: format!("{:#x}", state.input_token),
        input_amount: state.input_amount.to_string(),
        output_token: format!("{:#x}", state.output_token),
        output_amount: state.output_amount.to_string(),
        fulfilled: state.fulfilled,
        cancelled: state.cancelled,
        created_at: None,
        fulfilled_at: None,
        cancelled_at: None,
        block_number: None,
        transaction_hash: None,
    }
}
