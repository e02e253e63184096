//! BartMart API Server — serves the order projection and exposes the
//! indexer/full-sync triggers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};

use bartmart_chain::{ChainReader, RpcChainReader, provider};
use bartmart_core::{Settings, telemetry};
use bartmart_indexer::{FullSync, IncrementalIndexer};
use bartmart_storage::models::{
    OrderFilters, OrderStatusFilter, TokenMetadata, Transaction,
};
use bartmart_storage::{KvStore, repos};

/// Shared application state: the injected store handle plus the two
/// externally triggerable jobs.
struct AppState<C, S> {
    store: S,
    indexer: IncrementalIndexer<C, S>,
    full_sync: FullSync<C, S>,
}

#[tokio::main]
async fn main() {
    telemetry::init();
    let settings = Settings::from_env().expect("Failed to load settings");

    tracing::info!("Starting BartMart API Server");

    let store = bartmart_storage::connect(&settings.redis_url)
        .await
        .expect("Failed to connect to Redis");

    let provider =
        provider::create_provider(&settings.rpc_url).expect("Failed to create RPC provider");
    let contract_address = settings
        .contract_address
        .parse()
        .expect("Invalid CONTRACT_ADDRESS");
    let reader = RpcChainReader::new(provider, contract_address);

    let state = Arc::new(AppState {
        store: store.clone(),
        indexer: IncrementalIndexer::new(reader.clone(), store.clone())
            .with_lookback(settings.lookback_blocks),
        full_sync: FullSync::new(reader, store).with_batch_size(settings.sync_batch_size),
    });

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn router<C, S>(state: Arc<AppState<C, S>>) -> Router
where
    C: ChainReader + 'static,
    S: KvStore + Clone + 'static,
{
    Router::new()
        .route("/api/orders", get(list_orders::<C, S>))
        .route("/api/orders/:id", get(get_order::<C, S>))
        .route(
            "/api/orders/:id/transactions",
            get(get_order_transactions::<C, S>),
        )
        .route("/api/transactions", post(save_transaction::<C, S>))
        .route(
            "/api/transactions/:address",
            get(get_user_transactions::<C, S>),
        )
        .route("/api/tokens", get(list_tokens::<C, S>))
        .route(
            "/api/tokens/:address",
            get(get_token::<C, S>).post(save_token::<C, S>),
        )
        .route("/api/users/:address", get(get_user_stats::<C, S>))
        .route("/api/indexer", post(run_indexer::<C, S>))
        .route("/health", get(health))
        .with_state(state)
}

// ─── Query Params ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OrderListParams {
    status: Option<String>,
    creator: Option<String>,
    #[serde(rename = "inputToken")]
    input_token: Option<String>,
    #[serde(rename = "outputToken")]
    output_token: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PaginationParams {
    limit: Option<usize>,
}

fn parse_address(value: Option<String>) -> Option<String> {
    value.filter(|v| v.parse::<bartmart_chain::Address>().is_ok())
}

fn build_filters(params: OrderListParams) -> OrderFilters {
    OrderFilters {
        status: match params.status.as_deref() {
            Some("live") => Some(OrderStatusFilter::Live),
            Some("completed") => Some(OrderStatusFilter::Completed),
            _ => None,
        },
        creator: parse_address(params.creator),
        input_token: parse_address(params.input_token),
        output_token: parse_address(params.output_token),
        limit: params.limit.map(|l| l.clamp(1, 1000)),
        offset: params.offset,
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize, Default)]
struct IndexerRequest {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Serialize)]
struct IndexerResponse {
    message: String,
    count: u64,
}

fn json_ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

fn json_err(status: StatusCode, msg: &str) -> (StatusCode, Json<ApiResponse<String>>) {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: msg.to_string(),
        }),
    )
}

fn internal_err(e: impl std::fmt::Display) -> (StatusCode, Json<ApiResponse<String>>) {
    json_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

type ApiError = (StatusCode, Json<ApiResponse<String>>);

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

/// GET /api/orders — list orders with optional status/creator/token filters.
async fn list_orders<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Query(params): Query<OrderListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = build_filters(params);
    let orders = repos::get_orders(&state.store, &filters)
        .await
        .map_err(internal_err)?;
    Ok(json_ok(orders))
}

/// GET /api/orders/:id — single order.
async fn get_order<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let order = repos::get_order(&state.store, id)
        .await
        .map_err(internal_err)?;
    match order {
        Some(order) => Ok(json_ok(order)),
        None => Err(json_err(StatusCode::NOT_FOUND, "Order not found")),
    }
}

/// GET /api/orders/:id/transactions — transactions touching an order.
async fn get_order_transactions<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let txs = repos::order_transactions(&state.store, id)
        .await
        .map_err(internal_err)?;
    Ok(json_ok(txs))
}

/// POST /api/transactions — record an externally submitted transaction
/// (typically `pending`; the indexer writes the confirmed record later).
async fn save_transaction<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Json(tx): Json<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    if tx.hash.is_empty() || tx.from.parse::<bartmart_chain::Address>().is_err() {
        return Err(json_err(StatusCode::BAD_REQUEST, "Invalid transaction"));
    }
    repos::save_transaction(&state.store, &tx)
        .await
        .map_err(internal_err)?;
    Ok(json_ok(tx))
}

/// GET /api/transactions/:address — a user's recent transactions.
async fn get_user_transactions<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(address): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let txs = repos::user_transactions(&state.store, &address, limit)
        .await
        .map_err(internal_err)?;
    Ok(json_ok(txs))
}

/// GET /api/tokens — all cached token metadata.
async fn list_tokens<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = repos::all_tokens(&state.store).await.map_err(internal_err)?;
    Ok(json_ok(tokens))
}

/// GET /api/tokens/:address — cached metadata for one token.
async fn get_token<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let token = repos::get_token_metadata(&state.store, &address)
        .await
        .map_err(internal_err)?;
    match token {
        Some(token) => Ok(json_ok(token)),
        None => Err(json_err(StatusCode::NOT_FOUND, "Token not found")),
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    symbol: String,
    name: String,
    decimals: u8,
    #[serde(rename = "logoURI")]
    logo_uri: Option<String>,
}

/// POST /api/tokens/:address — cache resolved token metadata.
async fn save_token<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(address): Path<String>,
    Json(body): Json<TokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    if address.parse::<bartmart_chain::Address>().is_err() {
        return Err(json_err(StatusCode::BAD_REQUEST, "Invalid token address"));
    }
    let meta = TokenMetadata {
        address: address.to_lowercase(),
        symbol: body.symbol,
        name: body.name,
        decimals: body.decimals,
        logo_uri: body.logo_uri,
        last_updated: None,
    };
    repos::save_token_metadata(&state.store, &meta)
        .await
        .map_err(internal_err)?;
    Ok(json_ok(meta))
}

/// GET /api/users/:address — aggregate stats for one account.
async fn get_user_stats<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = repos::user_stats(&state.store, &address)
        .await
        .map_err(internal_err)?;
    match stats {
        Some(stats) => Ok(json_ok(stats)),
        None => Err(json_err(StatusCode::NOT_FOUND, "User not found")),
    }
}

/// POST /api/indexer — trigger an indexing pass, or a full sync with
/// `{"action": "sync"}`. Safe to call repeatedly; the caller is expected not
/// to overlap invocations.
async fn run_indexer<C: ChainReader, S: KvStore + Clone>(
    State(state): State<Arc<AppState<C, S>>>,
    body: Option<Json<IndexerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let action = body
        .and_then(|Json(b)| b.action)
        .unwrap_or_else(|| "index".to_string());

    if action == "sync" {
        let synced = state.full_sync.run().await.map_err(internal_err)?;
        return Ok(json_ok(IndexerResponse {
            message: format!("Synced {synced} orders"),
            count: synced,
        }));
    }

    let processed = state.indexer.run().await.map_err(internal_err)?;
    Ok(json_ok(IndexerResponse {
        message: format!("Processed {processed} events"),
        count: processed,
    }))
}
