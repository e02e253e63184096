use std::future::Future;
use std::time::Duration;

use alloy::consensus::BlockHeader;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use thiserror::Error;

use crate::abi::BartMart;
use crate::decoder::{self, OrderEventKind, OrderLog};

/// How many times a transient RPC failure is retried before it surfaces.
const RPC_RETRIES: u32 = 3;

/// Base delay for retry backoff; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ChainError {
    /// The call failed but may succeed on retry (timeouts, connection resets).
    #[error("transient RPC failure: {0}")]
    Transient(String),

    /// The endpoint cannot be reached at all; abort the current batch.
    #[error("RPC endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid {what}: {value}")]
    Invalid { what: &'static str, value: String },
}

/// Block metadata needed to contextualise an event.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// Transaction metadata needed to contextualise an event.
#[derive(Debug, Clone)]
pub struct TxInfo {
    pub hash: String,
}

/// An order as read directly from contract storage (full-sync path).
#[derive(Debug, Clone)]
pub struct OrderState {
    pub creator: Address,
    pub input_token: Address,
    pub input_amount: U256,
    pub output_token: Address,
    pub output_amount: U256,
    pub fulfilled: bool,
    pub cancelled: bool,
}

/// Read access to the chain and the BartMart contract.
///
/// The indexer and full-sync reconciler are generic over this trait so tests
/// can substitute a scripted reader.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest confirmed block number.
    async fn current_block_height(&self) -> Result<u64, ChainError>;

    /// Decoded market events of one kind over the inclusive range
    /// `[from_block, to_block]`. Undecodable logs are skipped with a warning.
    async fn order_events(
        &self,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<OrderLog>, ChainError>;

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainError>;

    async fn transaction(&self, hash: &str) -> Result<TxInfo, ChainError>;

    /// Direct contract storage read of one order slot.
    async fn read_order(&self, order_id: u64) -> Result<OrderState, ChainError>;

    /// Total orders ever created — exclusive upper bound on valid ids.
    async fn read_order_count(&self) -> Result<u64, ChainError>;
}

/// `ChainReader` backed by a JSON-RPC provider and the deployed contract.
#[derive(Clone)]
pub struct RpcChainReader<P: Provider + Clone> {
    provider: P,
    contract: BartMart::BartMartInstance<P>,
    address: Address,
}

impl<P: Provider + Clone> RpcChainReader<P> {
    pub fn new(provider: P, address: Address) -> Self {
        let contract = BartMart::new(address, provider.clone());
        Self {
            provider,
            contract,
            address,
        }
    }

    /// Run an RPC call, retrying transient failures with exponential backoff.
    async fn retrying<T, F, Fut>(&self, what: &'static str, op: F) -> Result<T, ChainError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(ChainError::Transient(msg)) if attempt + 1 < RPC_RETRIES => {
                    attempt += 1;
                    tracing::warn!(call = what, attempt, error = %msg, "transient RPC failure, retrying");
                    tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn transient(e: impl std::fmt::Display) -> ChainError {
    ChainError::Transient(e.to_string())
}

#[async_trait::async_trait]
impl<P: Provider + Clone> ChainReader for RpcChainReader<P> {
    async fn current_block_height(&self) -> Result<u64, ChainError> {
        self.retrying("get_block_number", || async {
            self.provider.get_block_number().await.map_err(transient)
        })
        .await
    }

    async fn order_events(
        &self,
        kind: OrderEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<OrderLog>, ChainError> {
        let signature = match kind {
            OrderEventKind::Created => BartMart::OrderCreated::SIGNATURE_HASH,
            OrderEventKind::Fulfilled => BartMart::OrderFulfilled::SIGNATURE_HASH,
            OrderEventKind::Cancelled => BartMart::OrderCancelled::SIGNATURE_HASH,
        };

        let filter = Filter::new()
            .address(self.address)
            .event_signature(signature)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .retrying("get_logs", || async {
                self.provider.get_logs(&filter).await.map_err(transient)
            })
            .await?;

        let mut decoded = Vec::with_capacity(logs.len());
        for log in &logs {
            match decoder::decode_order_log(kind, log) {
                Ok(event) => decoded.push(event),
                // Malformed logs are dropped; one bad log must not poison the batch.
                Err(e) => tracing::warn!(event = kind.name(), error = %e, "skipping undecodable log"),
            }
        }
        Ok(decoded)
    }

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainError> {
        let block = self
            .retrying("get_block_by_number", || async {
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .await
                    .map_err(transient)
            })
            .await?
            .ok_or_else(|| ChainError::NotFound(format!("block {number}")))?;

        Ok(BlockInfo {
            number: block.header.number(),
            timestamp: block.header.timestamp(),
        })
    }

    async fn transaction(&self, hash: &str) -> Result<TxInfo, ChainError> {
        let parsed: B256 = hash.parse().map_err(|_| ChainError::Invalid {
            what: "transaction hash",
            value: hash.to_string(),
        })?;

        let tx = self
            .retrying("get_transaction_by_hash", || async {
                self.provider
                    .get_transaction_by_hash(parsed)
                    .await
                    .map_err(transient)
            })
            .await?;

        match tx {
            Some(_) => Ok(TxInfo {
                hash: format!("{parsed:#x}"),
            }),
            None => Err(ChainError::NotFound(format!("transaction {hash}"))),
        }
    }

    async fn read_order(&self, order_id: u64) -> Result<OrderState, ChainError> {
        let ret = self
            .retrying("orders", || async {
                self.contract
                    .orders(U256::from(order_id))
                    .call()
                    .await
                    .map_err(transient)
            })
            .await?;

        Ok(OrderState {
            creator: ret.creator,
            input_token: ret.inputToken,
            input_amount: ret.inputAmount,
            output_token: ret.outputToken,
            output_amount: ret.outputAmount,
            fulfilled: ret.fulfilled,
            cancelled: ret.cancelled,
        })
    }

    async fn read_order_count(&self) -> Result<u64, ChainError> {
        let counter = self
            .retrying("orderCounter", || async {
                self.contract.orderCounter().call().await.map_err(transient)
            })
            .await?;

        u64::try_from(counter).map_err(|_| ChainError::Invalid {
            what: "order counter",
            value: counter.to_string(),
        })
    }
}
