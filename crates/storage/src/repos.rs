use futures::future::join_all;

use crate::keys;
use crate::kv::{KvStore, KvWrite, StoreError};
use crate::models::*;

/// User transaction lists are capped at the most recent 1000 entries.
const USER_TX_CAP: i64 = 1000;

/// Bound on concurrent per-record fetches when hydrating a listing.
const HYDRATE_BATCH: usize = 50;

// ─── Orders ─────────────────────────────────────────────────────────────────

/// Upsert an order and all of its index-set memberships in one pipeline.
///
/// Keyed by the immutable `orderId`; saving the same order twice is a no-op.
/// Status sets are kept mutually exclusive by removing the id from the other
/// two sets on every save.
pub async fn save_order<S: KvStore>(store: &S, order: &Order) -> Result<(), StoreError> {
    let id = order.order_id.to_string();

    let mut writes = vec![KvWrite::HashSet {
        key: keys::order(order.order_id),
        fields: order.hash_fields(),
    }];

    let (add, remove_a, remove_b) = if order.fulfilled {
        (keys::orders_fulfilled(), keys::orders_active(), keys::orders_cancelled())
    } else if order.cancelled {
        (keys::orders_cancelled(), keys::orders_active(), keys::orders_fulfilled())
    } else {
        (keys::orders_active(), keys::orders_fulfilled(), keys::orders_cancelled())
    };
    writes.push(KvWrite::SetAdd {
        key: add,
        member: id.clone(),
    });
    writes.push(KvWrite::SetRemove {
        key: remove_a,
        member: id.clone(),
    });
    writes.push(KvWrite::SetRemove {
        key: remove_b,
        member: id.clone(),
    });

    writes.push(KvWrite::SetAdd {
        key: keys::orders_by_creator(&order.creator),
        member: id.clone(),
    });
    writes.push(KvWrite::SetAdd {
        key: keys::orders_by_token(&order.input_token),
        member: id.clone(),
    });
    writes.push(KvWrite::SetAdd {
        key: keys::orders_by_token(&order.output_token),
        member: id,
    });

    store.apply(writes).await
}

pub async fn get_order<S: KvStore>(store: &S, order_id: u64) -> Result<Option<Order>, StoreError> {
    let data = store.hash_get_all(&keys::order(order_id)).await?;
    Ok(Order::from_hash(order_id, &data))
}

/// A status change observed for an existing order. Flips exactly one flag.
#[derive(Debug, Clone, Copy)]
pub enum StatusChange {
    Fulfilled { at: u64 },
    Cancelled { at: u64 },
}

/// Apply a status change to a stored order.
///
/// Returns `Ok(false)` when no such order exists in the projection; the
/// caller decides whether that is tolerable (the indexer skips, full sync
/// repairs later).
pub async fn update_order_status<S: KvStore>(
    store: &S,
    order_id: u64,
    change: StatusChange,
) -> Result<bool, StoreError> {
    let Some(mut order) = get_order(store, order_id).await? else {
        return Ok(false);
    };

    match change {
        StatusChange::Fulfilled { at } => {
            order.fulfilled = true;
            order.fulfilled_at = Some(at);
        }
        StatusChange::Cancelled { at } => {
            order.cancelled = true;
            order.cancelled_at = Some(at);
        }
    }

    save_order(store, &order).await?;
    Ok(true)
}

async fn hydrate_orders<S: KvStore>(store: &S, ids: &[u64]) -> Result<Vec<Order>, StoreError> {
    let mut orders = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(HYDRATE_BATCH) {
        let fetched = join_all(chunk.iter().map(|id| get_order(store, *id))).await;
        for result in fetched {
            if let Some(order) = result? {
                orders.push(order);
            }
        }
    }
    Ok(orders)
}

fn parse_id_set(members: Vec<String>) -> Vec<u64> {
    members.iter().filter_map(|m| m.parse().ok()).collect()
}

/// List orders matching the given filters, newest (highest id) first.
pub async fn get_orders<S: KvStore>(
    store: &S,
    filters: &OrderFilters,
) -> Result<Vec<Order>, StoreError> {
    let mut ids: Vec<u64> = match filters.status {
        Some(OrderStatusFilter::Live) => parse_id_set(store.set_members(&keys::orders_active()).await?),
        Some(OrderStatusFilter::Completed) => {
            let mut ids = parse_id_set(store.set_members(&keys::orders_fulfilled()).await?);
            ids.extend(parse_id_set(store.set_members(&keys::orders_cancelled()).await?));
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        None => {
            let mut ids = parse_id_set(store.set_members(&keys::orders_active()).await?);
            ids.extend(parse_id_set(store.set_members(&keys::orders_fulfilled()).await?));
            ids.extend(parse_id_set(store.set_members(&keys::orders_cancelled()).await?));
            ids.sort_unstable();
            ids.dedup();
            ids
        }
    };

    if let Some(creator) = &filters.creator {
        let owned = parse_id_set(store.set_members(&keys::orders_by_creator(creator)).await?);
        ids.retain(|id| owned.contains(id));
    }
    // Token index sets record both sides of an order, so either token filter
    // matches orders where the address appears as input or output.
    if let Some(token) = &filters.input_token {
        let matching = parse_id_set(store.set_members(&keys::orders_by_token(token)).await?);
        ids.retain(|id| matching.contains(id));
    }
    if let Some(token) = &filters.output_token {
        let matching = parse_id_set(store.set_members(&keys::orders_by_token(token)).await?);
        ids.retain(|id| matching.contains(id));
    }

    let mut orders = hydrate_orders(store, &ids).await?;
    orders.sort_unstable_by(|a, b| b.order_id.cmp(&a.order_id));

    let offset = filters.offset.unwrap_or(0);
    let limit = filters.limit.unwrap_or(100);
    Ok(orders.into_iter().skip(offset).take(limit).collect())
}

// ─── Transactions ───────────────────────────────────────────────────────────

/// Upsert a transaction record and its per-user / per-order indexes.
pub async fn save_transaction<S: KvStore>(store: &S, tx: &Transaction) -> Result<(), StoreError> {
    let mut writes = vec![
        KvWrite::HashSet {
            key: keys::transaction(&tx.hash),
            fields: tx.hash_fields(),
        },
        KvWrite::ListPushCapped {
            key: keys::user_transactions(&tx.from),
            value: tx.hash.clone(),
            cap: USER_TX_CAP,
        },
    ];
    if let Some(order_id) = tx.order_id {
        writes.push(KvWrite::SetAdd {
            key: keys::order_transactions(order_id),
            member: tx.hash.clone(),
        });
    }
    store.apply(writes).await
}

pub async fn get_transaction<S: KvStore>(
    store: &S,
    hash: &str,
) -> Result<Option<Transaction>, StoreError> {
    let data = store.hash_get_all(&keys::transaction(hash)).await?;
    Ok(Transaction::from_hash(hash, &data))
}

/// Most recent transactions submitted by an account, newest first.
pub async fn user_transactions<S: KvStore>(
    store: &S,
    address: &str,
    limit: usize,
) -> Result<Vec<Transaction>, StoreError> {
    let hashes = store
        .list_range(&keys::user_transactions(address), 0, limit as i64 - 1)
        .await?;
    hydrate_transactions(store, &hashes).await
}

/// All transactions touching a given order, newest first.
pub async fn order_transactions<S: KvStore>(
    store: &S,
    order_id: u64,
) -> Result<Vec<Transaction>, StoreError> {
    let hashes = store
        .set_members(&keys::order_transactions(order_id))
        .await?;
    let mut txs = hydrate_transactions(store, &hashes).await?;
    txs.sort_by_key(|tx| std::cmp::Reverse(tx.timestamp.unwrap_or(0)));
    Ok(txs)
}

async fn hydrate_transactions<S: KvStore>(
    store: &S,
    hashes: &[String],
) -> Result<Vec<Transaction>, StoreError> {
    let mut txs = Vec::with_capacity(hashes.len());
    for chunk in hashes.chunks(HYDRATE_BATCH) {
        let fetched = join_all(chunk.iter().map(|h| get_transaction(store, h))).await;
        for result in fetched {
            if let Some(tx) = result? {
                txs.push(tx);
            }
        }
    }
    Ok(txs)
}

// ─── Tokens ─────────────────────────────────────────────────────────────────

/// Cache token metadata, stamping `lastUpdated` with the current time.
pub async fn save_token_metadata<S: KvStore>(
    store: &S,
    meta: &TokenMetadata,
) -> Result<(), StoreError> {
    let mut meta = meta.clone();
    meta.last_updated = Some(chrono::Utc::now().timestamp() as u64);

    let address = meta.address.to_lowercase();
    store
        .apply(vec![
            KvWrite::HashSet {
                key: keys::token(&address),
                fields: meta.hash_fields(),
            },
            KvWrite::SetAdd {
                key: keys::tokens_list(),
                member: address,
            },
        ])
        .await
}

pub async fn get_token_metadata<S: KvStore>(
    store: &S,
    address: &str,
) -> Result<Option<TokenMetadata>, StoreError> {
    let data = store.hash_get_all(&keys::token(address)).await?;
    Ok(TokenMetadata::from_hash(address, &data))
}

pub async fn all_tokens<S: KvStore>(store: &S) -> Result<Vec<TokenMetadata>, StoreError> {
    let addresses = store.set_members(&keys::tokens_list()).await?;
    let mut tokens = Vec::with_capacity(addresses.len());
    for chunk in addresses.chunks(HYDRATE_BATCH) {
        let fetched = join_all(chunk.iter().map(|a| get_token_metadata(store, a))).await;
        for result in fetched {
            if let Some(token) = result? {
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

// ─── Users ──────────────────────────────────────────────────────────────────

/// One unit of user activity attributed by the indexer.
#[derive(Debug, Clone, Copy)]
pub enum UserActivity {
    OrderCreated(u64),
    OrderFulfilled(u64),
    OrderCancelled(u64),
}

/// Record an activity against a user: lazily creates the stats row, bumps the
/// matching counter and touches `lastSeen`.
///
/// Counters are incremented per observed event; replaying a block range
/// counts the same event again. See DESIGN.md.
pub async fn record_user_activity<S: KvStore>(
    store: &S,
    address: &str,
    activity: UserActivity,
) -> Result<(), StoreError> {
    let addr = address.to_lowercase();
    let user_key = keys::user(&addr);
    let now = chrono::Utc::now().timestamp().to_string();

    let mut writes = Vec::new();
    if store.exists(&user_key).await? {
        writes.push(KvWrite::HashSet {
            key: user_key.clone(),
            fields: vec![("lastSeen".into(), now)],
        });
    } else {
        writes.push(KvWrite::HashSet {
            key: user_key.clone(),
            fields: vec![
                ("address".into(), addr.clone()),
                ("ordersCreated".into(), "0".into()),
                ("ordersFulfilled".into(), "0".into()),
                ("ordersCancelled".into(), "0".into()),
                ("firstSeen".into(), now.clone()),
                ("lastSeen".into(), now),
            ],
        });
    }

    match activity {
        UserActivity::OrderCreated(order_id) => {
            writes.push(KvWrite::SetAdd {
                key: keys::user_orders_created(&addr),
                member: order_id.to_string(),
            });
            writes.push(KvWrite::HashIncrBy {
                key: user_key,
                field: "ordersCreated".into(),
                delta: 1,
            });
        }
        UserActivity::OrderFulfilled(order_id) => {
            writes.push(KvWrite::SetAdd {
                key: keys::user_orders_fulfilled(&addr),
                member: order_id.to_string(),
            });
            writes.push(KvWrite::HashIncrBy {
                key: user_key,
                field: "ordersFulfilled".into(),
                delta: 1,
            });
        }
        UserActivity::OrderCancelled(_) => {
            writes.push(KvWrite::HashIncrBy {
                key: user_key,
                field: "ordersCancelled".into(),
                delta: 1,
            });
        }
    }

    store.apply(writes).await
}

pub async fn user_stats<S: KvStore>(
    store: &S,
    address: &str,
) -> Result<Option<UserStats>, StoreError> {
    let data = store.hash_get_all(&keys::user(address)).await?;
    Ok(UserStats::from_hash(address, &data))
}

// ─── Indexer cursor ─────────────────────────────────────────────────────────

/// Highest block number whose events are fully applied. `None` means the
/// indexer has never run.
pub async fn last_indexed_block<S: KvStore>(store: &S) -> Result<Option<u64>, StoreError> {
    let value = store.get(&keys::indexer_last_block()).await?;
    Ok(value.and_then(|v| v.parse().ok()))
}

pub async fn set_last_indexed_block<S: KvStore>(
    store: &S,
    block_number: u64,
) -> Result<(), StoreError> {
    store
        .apply(vec![KvWrite::Put {
            key: keys::indexer_last_block(),
            value: block_number.to_string(),
        }])
        .await
}
