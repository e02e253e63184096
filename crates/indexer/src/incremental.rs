//! Incremental indexing: advance the resume cursor from the last processed
//! block to the current chain head in one bounded batch.

use std::collections::HashMap;

use bartmart_chain::{BlockInfo, ChainReader, OrderEventKind, OrderLog, TxInfo};
use bartmart_storage::repos;
use bartmart_storage::KvStore;

use crate::IndexError;
use crate::events;

/// How far back the very first run reaches. Historical backfill beyond this
/// window is the full sync's job, not the event path's.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 1000;

/// Replays contract events against the projection, resuming from the
/// persisted cursor.
///
/// The cursor is the sole commit point: it is written only after every write
/// for the batch has succeeded, so a failed run leaves it untouched and the
/// next run retries the same range (at-least-once application).
pub struct IncrementalIndexer<C, S> {
    reader: C,
    store: S,
    lookback_blocks: u64,
}

impl<C: ChainReader, S: KvStore> IncrementalIndexer<C, S> {
    pub fn new(reader: C, store: S) -> Self {
        Self {
            reader,
            store,
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
        }
    }

    pub fn with_lookback(mut self, blocks: u64) -> Self {
        self.lookback_blocks = blocks;
        self
    }

    /// Index everything between the cursor and the chain head.
    ///
    /// Returns the number of events applied; 0 when already caught up.
    pub async fn run(&self) -> Result<u64, IndexError> {
        let head = self.reader.current_block_height().await?;
        let cursor = repos::last_indexed_block(&self.store).await?;

        let from_block = match cursor {
            None => head.saturating_sub(self.lookback_blocks),
            Some(last) if last >= head => {
                tracing::debug!(cursor = last, head, "already caught up");
                return Ok(0);
            }
            Some(last) => last + 1,
        };

        let processed = self.index_range(from_block, head).await?;
        repos::set_last_indexed_block(&self.store, head).await?;
        Ok(processed)
    }

    /// Fetch, contextualise and apply all events in `[from_block, to_block]`.
    ///
    /// Creations are applied before fulfillments, and fulfillments before
    /// cancellations, so an order created and completed within one batch is
    /// never lost. Per-event store failures are logged and skipped; fetch or
    /// context-resolution failures propagate and fail the whole batch.
    pub async fn index_range(&self, from_block: u64, to_block: u64) -> Result<u64, IndexError> {
        tracing::info!(from = from_block, to = to_block, "indexing block range");

        let (created, fulfilled, cancelled) = futures::try_join!(
            self.reader
                .order_events(OrderEventKind::Created, from_block, to_block),
            self.reader
                .order_events(OrderEventKind::Fulfilled, from_block, to_block),
            self.reader
                .order_events(OrderEventKind::Cancelled, from_block, to_block),
        )?;

        let all = || created.iter().chain(&fulfilled).chain(&cancelled);

        // Resolve each distinct block and transaction once for the batch.
        let mut blocks: HashMap<u64, BlockInfo> = HashMap::new();
        let mut txs: HashMap<String, TxInfo> = HashMap::new();
        for log in all() {
            if !blocks.contains_key(&log.block_number) {
                let info = self.reader.block(log.block_number).await?;
                blocks.insert(log.block_number, info);
            }
            if !txs.contains_key(&log.transaction_hash) {
                let info = self.reader.transaction(&log.transaction_hash).await?;
                txs.insert(log.transaction_hash.clone(), info);
            }
        }

        let mut processed = 0u64;
        for log in all() {
            if self.apply(log, &blocks, &txs).await {
                processed += 1;
            }
        }

        tracing::info!(
            from = from_block,
            to = to_block,
            processed,
            "block range indexed"
        );
        Ok(processed)
    }

    async fn apply(
        &self,
        log: &OrderLog,
        blocks: &HashMap<u64, BlockInfo>,
        txs: &HashMap<String, TxInfo>,
    ) -> bool {
        let block = &blocks[&log.block_number];
        let tx = &txs[&log.transaction_hash];
        match events::process_event(&self.store, log, block, tx).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    order_id = log.event.order_id(),
                    block = log.block_number,
                    error = %e,
                    "failed to apply event, continuing with batch"
                );
                false
            }
        }
    }
}
