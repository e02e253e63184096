//! End-to-end indexing tests against an in-memory store and a scripted chain.

use std::collections::HashMap;

use bartmart_chain::{
    Address, BlockInfo, ChainError, ChainReader, OrderEvent, OrderEventKind, OrderLog, OrderState,
    TxInfo, U256,
};
use bartmart_indexer::{FullSync, IncrementalIndexer};
use bartmart_storage::models::{OrderFilters, OrderStatusFilter, TxKind};
use bartmart_storage::{KvStore, MemoryStore, keys, repos};

const CREATOR: &str = "0x00000000000000000000000000000000000000aa";
const FULFILLER: &str = "0x00000000000000000000000000000000000000cc";
const OUTPUT_TOKEN: &str = "0x00000000000000000000000000000000000000bb";
const TX_CREATE: &str = "0x00000000000000000000000000000000000000000000000000000000000000de";
const TX_FULFILL: &str = "0x00000000000000000000000000000000000000000000000000000000000000ad";

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

fn created(order_id: u64, block_number: u64, tx: &str) -> OrderLog {
    OrderLog {
        event: OrderEvent::Created {
            order_id,
            creator: addr(CREATOR),
            input_token: Address::ZERO,
            input_amount: U256::from(1000u64),
            output_token: addr(OUTPUT_TOKEN),
            output_amount: U256::from(2000u64),
        },
        block_number,
        transaction_hash: tx.to_string(),
    }
}

fn fulfilled(order_id: u64, block_number: u64, tx: &str) -> OrderLog {
    OrderLog {
        event: OrderEvent::Fulfilled {
            order_id,
            fulfiller: addr(FULFILLER),
            creator: addr(CREATOR),
        },
        block_number,
        transaction_hash: tx.to_string(),
    }
}

fn cancelled(order_id: u64, block_number: u64, tx: &str) -> OrderLog {
    OrderLog {
        event: OrderEvent::Cancelled {
            order_id,
            creator: addr(CREATOR),
        },
        block_number,
        transaction_hash: tx.to_string(),
    }
}

fn kind_of(event: &OrderEvent) -> OrderEventKind {
    match event {
        OrderEvent::Created { .. } => OrderEventKind::Created,
        OrderEvent::Fulfilled { .. } => OrderEventKind::Fulfilled,
        OrderEvent::Cancelled { .. } => OrderEventKind::Cancelled,
    }
}

/// Scripted chain: a fixed head, a log tape, and per-block timestamps at
/// `number * 10`. Set `fail_log_fetch` to simulate an RPC outage.
#[derive(Default)]
struct FakeChain {
    height: u64,
    logs: Vec<OrderLog>,
    orders: HashMap<u64, OrderState>,
    order_count: u64,
    fail_log_fetch: bool,
}

impl FakeChain {
    fn at_height(height: u64) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    fn with_logs(mut self, logs: Vec<OrderLog>) -> Self {
        self.logs = logs;
        self
    }

    fn with_order(mut self, order_id: u64, state: OrderState) -> Self {
        self.orders.insert(order_id, state);
        self.order_count = self.order_count.max(order_id + 1);
        self
    }
}

fn onchain_order(fulfilled: bool, cancelled: bool) -> OrderState {
    OrderState {
        creator: addr(CREATOR),
        input_token: Address::ZERO,
        input_amount: U256::from(1000u64),
        output_token: addr(OUTPUT_TOKEN),
        output_amount: U256::from(2000u64),
        fulfilled,
        cancelled,
    }
}

#[async_trait::async_trait]
impl ChainReader for FakeChain {
    async fn current_block_height(&self) -> Result<u64, ChainError> {
        Ok(self.height)
    }

    async fn order_events(
        &self,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<OrderLog>, ChainError> {
        if self.fail_log_fetch {
            return Err(ChainError::Unavailable("scripted outage".into()));
        }
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                kind_of(&log.event) == kind
                    && log.block_number >= from_block
                    && log.block_number <= to_block
            })
            .cloned()
            .collect())
    }

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainError> {
        Ok(BlockInfo {
            number,
            timestamp: number * 10,
        })
    }

    async fn transaction(&self, hash: &str) -> Result<TxInfo, ChainError> {
        Ok(TxInfo {
            hash: hash.to_string(),
        })
    }

    async fn read_order(&self, order_id: u64) -> Result<OrderState, ChainError> {
        self.orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("order {order_id}")))
    }

    async fn read_order_count(&self) -> Result<u64, ChainError> {
        Ok(self.order_count)
    }
}

// ─── Incremental indexing ───────────────────────────────────────────────────

#[tokio::test]
async fn indexes_a_created_order_end_to_end() {
    let store = MemoryStore::new();
    repos::set_last_indexed_block(&store, 99).await.unwrap();

    let chain = FakeChain::at_height(100).with_logs(vec![created(7, 100, TX_CREATE)]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    let processed = indexer.run().await.unwrap();
    assert_eq!(processed, 1);

    let order = repos::get_order(&store, 7).await.unwrap().unwrap();
    assert!(order.is_live());
    assert_eq!(order.creator, CREATOR);
    assert_eq!(order.input_amount, "1000");
    assert_eq!(order.created_at, Some(1000));
    assert_eq!(order.block_number, Some(100));
    assert_eq!(order.transaction_hash, Some(TX_CREATE.to_string()));

    let active = store.set_members(&keys::orders_active()).await.unwrap();
    assert_eq!(active, vec!["7".to_string()]);

    let tx = repos::get_transaction(&store, TX_CREATE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.kind, TxKind::Create);
    assert_eq!(tx.order_id, Some(7));
    assert_eq!(repos::user_transactions(&store, CREATOR, 10).await.unwrap().len(), 1);
    assert_eq!(repos::order_transactions(&store, 7).await.unwrap().len(), 1);

    let stats = repos::user_stats(&store, CREATOR).await.unwrap().unwrap();
    assert_eq!(stats.orders_created, 1);

    assert_eq!(repos::last_indexed_block(&store).await.unwrap(), Some(100));
}

#[tokio::test]
async fn replay_keeps_order_and_transaction_records_stable() {
    let store = MemoryStore::new();
    let chain = FakeChain::at_height(100).with_logs(vec![created(7, 100, TX_CREATE)]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    indexer.index_range(100, 100).await.unwrap();
    let first = repos::get_order(&store, 7).await.unwrap().unwrap();

    indexer.index_range(100, 100).await.unwrap();
    let second = repos::get_order(&store, 7).await.unwrap().unwrap();
    assert_eq!(first, second);

    let active = store.set_members(&keys::orders_active()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(repos::order_transactions(&store, 7).await.unwrap().len(), 1);
}

#[tokio::test]
async fn replay_double_counts_user_counters() {
    // Known limitation: per-user counters increment per observed event, so
    // re-processing a range inflates them. This pins the current behaviour.
    let store = MemoryStore::new();
    let chain = FakeChain::at_height(100).with_logs(vec![created(7, 100, TX_CREATE)]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    indexer.index_range(100, 100).await.unwrap();
    indexer.index_range(100, 100).await.unwrap();

    let stats = repos::user_stats(&store, CREATOR).await.unwrap().unwrap();
    assert_eq!(stats.orders_created, 2);
}

#[tokio::test]
async fn applies_creation_before_fulfillment_within_one_batch() {
    let store = MemoryStore::new();
    repos::set_last_indexed_block(&store, 99).await.unwrap();

    let chain = FakeChain::at_height(101).with_logs(vec![
        fulfilled(7, 101, TX_FULFILL),
        created(7, 100, TX_CREATE),
    ]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    let processed = indexer.run().await.unwrap();
    assert_eq!(processed, 2);

    let order = repos::get_order(&store, 7).await.unwrap().unwrap();
    assert!(order.fulfilled);
    assert!(!order.cancelled);
    assert_eq!(order.created_at, Some(1000));
    assert_eq!(order.fulfilled_at, Some(1010));

    assert!(store.set_members(&keys::orders_active()).await.unwrap().is_empty());
    let in_fulfilled = store.set_members(&keys::orders_fulfilled()).await.unwrap();
    assert_eq!(in_fulfilled, vec!["7".to_string()]);

    let stats = repos::user_stats(&store, FULFILLER).await.unwrap().unwrap();
    assert_eq!(stats.orders_fulfilled, 1);
    assert_eq!(stats.orders_created, 0);
}

#[tokio::test]
async fn cancellation_moves_order_out_of_the_active_set() {
    let store = MemoryStore::new();
    let chain = FakeChain::at_height(101).with_logs(vec![
        created(3, 100, TX_CREATE),
        cancelled(3, 101, TX_FULFILL),
    ]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    indexer.index_range(100, 101).await.unwrap();

    let order = repos::get_order(&store, 3).await.unwrap().unwrap();
    assert!(order.cancelled);
    assert_eq!(order.cancelled_at, Some(1010));
    assert!(store.set_members(&keys::orders_active()).await.unwrap().is_empty());
    let in_cancelled = store.set_members(&keys::orders_cancelled()).await.unwrap();
    assert_eq!(in_cancelled, vec!["3".to_string()]);
}

#[tokio::test]
async fn fulfillment_of_unknown_order_leaves_store_unchanged() {
    let store = MemoryStore::new();
    repos::set_last_indexed_block(&store, 99).await.unwrap();

    let chain = FakeChain::at_height(100).with_logs(vec![fulfilled(42, 100, TX_FULFILL)]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    indexer.run().await.unwrap();

    assert!(repos::get_order(&store, 42).await.unwrap().is_none());
    assert!(repos::get_transaction(&store, TX_FULFILL).await.unwrap().is_none());
    assert!(repos::user_stats(&store, FULFILLER).await.unwrap().is_none());
    // The range itself still completes, so the cursor advances.
    assert_eq!(repos::last_indexed_block(&store).await.unwrap(), Some(100));
}

#[tokio::test]
async fn cursor_stays_put_when_log_fetch_fails() {
    let store = MemoryStore::new();
    repos::set_last_indexed_block(&store, 50).await.unwrap();

    let mut chain = FakeChain::at_height(100);
    chain.fail_log_fetch = true;
    let indexer = IncrementalIndexer::new(chain, store.clone());

    assert!(indexer.run().await.is_err());
    assert_eq!(repos::last_indexed_block(&store).await.unwrap(), Some(50));
}

#[tokio::test]
async fn caught_up_cursor_short_circuits() {
    let store = MemoryStore::new();
    repos::set_last_indexed_block(&store, 100).await.unwrap();

    let chain = FakeChain::at_height(100).with_logs(vec![created(7, 100, TX_CREATE)]);
    let indexer = IncrementalIndexer::new(chain, store.clone());

    let processed = indexer.run().await.unwrap();
    assert_eq!(processed, 0);
    assert!(repos::get_order(&store, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn first_run_is_bounded_by_the_lookback_window() {
    let store = MemoryStore::new();
    let chain = FakeChain::at_height(5000).with_logs(vec![
        created(1, 3999, TX_FULFILL),
        created(2, 4500, TX_CREATE),
    ]);
    let indexer = IncrementalIndexer::new(chain, store.clone()).with_lookback(1000);

    let processed = indexer.run().await.unwrap();
    assert_eq!(processed, 1);
    assert!(repos::get_order(&store, 1).await.unwrap().is_none());
    assert!(repos::get_order(&store, 2).await.unwrap().is_some());
    assert_eq!(repos::last_indexed_block(&store).await.unwrap(), Some(5000));
}

// ─── Full sync ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_sync_repairs_a_stale_status_flag() {
    let store = MemoryStore::new();

    // Event path records the creation; the fulfillment event was missed, so
    // the projection still shows the order as live.
    let chain = FakeChain::at_height(100)
        .with_logs(vec![created(7, 100, TX_CREATE)])
        .with_order(7, onchain_order(true, false));
    IncrementalIndexer::new(chain, store.clone()).run().await.unwrap();
    assert!(repos::get_order(&store, 7).await.unwrap().unwrap().is_live());

    let chain = FakeChain::at_height(100).with_order(7, onchain_order(true, false));
    FullSync::new(chain, store.clone()).run().await.unwrap();

    let order = repos::get_order(&store, 7).await.unwrap().unwrap();
    assert!(order.fulfilled);
    assert_eq!(order.created_at, Some(1000));
    assert_eq!(order.transaction_hash, Some(TX_CREATE.to_string()));

    let in_fulfilled = store.set_members(&keys::orders_fulfilled()).await.unwrap();
    assert_eq!(in_fulfilled, vec!["7".to_string()]);
    assert!(store.set_members(&keys::orders_active()).await.unwrap().is_empty());
}

#[tokio::test]
async fn full_sync_skips_unreadable_orders_and_continues() {
    let store = MemoryStore::new();
    let mut chain = FakeChain::at_height(100)
        .with_order(0, onchain_order(false, false))
        .with_order(2, onchain_order(false, true));
    chain.order_count = 3; // id 1 reads as NotFound

    let synced = FullSync::new(chain, store.clone()).run().await.unwrap();
    assert_eq!(synced, 2);
    assert!(repos::get_order(&store, 0).await.unwrap().is_some());
    assert!(repos::get_order(&store, 1).await.unwrap().is_none());
    assert!(repos::get_order(&store, 2).await.unwrap().is_some());
}

#[tokio::test]
async fn synced_orders_are_queryable_through_filters() {
    let store = MemoryStore::new();
    let chain = FakeChain::at_height(100)
        .with_order(0, onchain_order(false, false))
        .with_order(1, onchain_order(true, false));

    FullSync::new(chain, store.clone()).run().await.unwrap();

    let live = repos::get_orders(
        &store,
        &OrderFilters {
            status: Some(OrderStatusFilter::Live),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].order_id, 0);

    let completed = repos::get_orders(
        &store,
        &OrderFilters {
            status: Some(OrderStatusFilter::Completed),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].order_id, 1);
}
