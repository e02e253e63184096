//! Event processing: one decoded contract event plus its block/transaction
//! context becomes a deterministic set of projection writes.
//!
//! All writes are upserts keyed by immutable natural keys (`orderId`, the
//! transaction hash), so replaying an event leaves the order and transaction
//! records unchanged. The per-user counters are the exception: they increment
//! per observed event and double-count under replay (see DESIGN.md).

use bartmart_chain::{BlockInfo, OrderEvent, OrderLog, TxInfo};
use bartmart_storage::models::{Order, Transaction, TxKind, TxStatus};
use bartmart_storage::repos::{self, StatusChange, UserActivity};
use bartmart_storage::{KvStore, StoreError};

fn hex(address: &bartmart_chain::Address) -> String {
    format!("{address:#x}")
}

/// Dispatch a decoded event to its processor.
pub async fn process_event<S: KvStore>(
    store: &S,
    log: &OrderLog,
    block: &BlockInfo,
    tx: &TxInfo,
) -> Result<(), StoreError> {
    match &log.event {
        OrderEvent::Created { .. } => process_order_created(store, log, block, tx).await,
        OrderEvent::Fulfilled { .. } => process_order_fulfilled(store, log, block, tx).await,
        OrderEvent::Cancelled { .. } => process_order_cancelled(store, log, block, tx).await,
    }
}

/// A new order: upsert the record, append a `create` transaction, attribute
/// the activity to the creator.
pub async fn process_order_created<S: KvStore>(
    store: &S,
    log: &OrderLog,
    block: &BlockInfo,
    tx: &TxInfo,
) -> Result<(), StoreError> {
    let OrderEvent::Created {
        order_id,
        creator,
        input_token,
        input_amount,
        output_token,
        output_amount,
    } = &log.event
    else {
        return Ok(());
    };
    let creator = hex(creator);

    let order = Order {
        order_id: *order_id,
        creator: creator.clone(),
        input_token: hex(input_token),
        input_amount: input_amount.to_string(),
        output_token: hex(output_token),
        output_amount: output_amount.to_string(),
        fulfilled: false,
        cancelled: false,
        created_at: Some(block.timestamp),
        fulfilled_at: None,
        cancelled_at: None,
        block_number: Some(block.number),
        transaction_hash: Some(tx.hash.clone()),
    };
    repos::save_order(store, &order).await?;

    repos::save_transaction(
        store,
        &Transaction {
            hash: tx.hash.clone(),
            from: creator.clone(),
            to: None,
            kind: TxKind::Create,
            order_id: Some(*order_id),
            token_address: None,
            amount: None,
            block_number: Some(block.number),
            timestamp: Some(block.timestamp),
            status: TxStatus::Confirmed,
        },
    )
    .await?;

    repos::record_user_activity(store, &creator, UserActivity::OrderCreated(*order_id)).await
}

/// A fulfillment: flip the stored order's `fulfilled` flag. The contract is
/// authoritative for creator and amounts, so nothing else on the record is
/// touched. An order id we have never seen is skipped; full sync repairs the
/// gap later.
pub async fn process_order_fulfilled<S: KvStore>(
    store: &S,
    log: &OrderLog,
    block: &BlockInfo,
    tx: &TxInfo,
) -> Result<(), StoreError> {
    let OrderEvent::Fulfilled {
        order_id,
        fulfiller,
        creator,
    } = &log.event
    else {
        return Ok(());
    };

    let applied = repos::update_order_status(
        store,
        *order_id,
        StatusChange::Fulfilled {
            at: block.timestamp,
        },
    )
    .await?;
    if !applied {
        tracing::warn!(
            order_id,
            tx = %tx.hash,
            "OrderFulfilled for an order not in the projection, skipping"
        );
        return Ok(());
    }

    let fulfiller = hex(fulfiller);
    repos::save_transaction(
        store,
        &Transaction {
            hash: tx.hash.clone(),
            from: fulfiller.clone(),
            to: Some(hex(creator)),
            kind: TxKind::Fulfill,
            order_id: Some(*order_id),
            token_address: None,
            amount: None,
            block_number: Some(block.number),
            timestamp: Some(block.timestamp),
            status: TxStatus::Confirmed,
        },
    )
    .await?;

    repos::record_user_activity(store, &fulfiller, UserActivity::OrderFulfilled(*order_id)).await
}

/// A cancellation: flip the stored order's `cancelled` flag. Unknown order
/// ids are skipped the same way as fulfillments.
pub async fn process_order_cancelled<S: KvStore>(
    store: &S,
    log: &OrderLog,
    block: &BlockInfo,
    tx: &TxInfo,
) -> Result<(), StoreError> {
    let OrderEvent::Cancelled { order_id, creator } = &log.event else {
        return Ok(());
    };

    let applied = repos::update_order_status(
        store,
        *order_id,
        StatusChange::Cancelled {
            at: block.timestamp,
        },
    )
    .await?;
    if !applied {
        tracing::warn!(
            order_id,
            tx = %tx.hash,
            "OrderCancelled for an order not in the projection, skipping"
        );
        return Ok(());
    }

    let creator = hex(creator);
    repos::save_transaction(
        store,
        &Transaction {
            hash: tx.hash.clone(),
            from: creator.clone(),
            to: None,
            kind: TxKind::Cancel,
            order_id: Some(*order_id),
            token_address: None,
            amount: None,
            block_number: Some(block.number),
            timestamp: Some(block.timestamp),
            status: TxStatus::Confirmed,
        },
    )
    .await?;

    repos::record_user_activity(store, &creator, UserActivity::OrderCancelled(*order_id)).await
}
