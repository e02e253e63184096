use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use thiserror::Error;

use crate::abi::BartMart;

/// Zero address sentinel — used in place of a token address for the native coin.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// The three market event signatures emitted by the BartMart contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventKind {
    Created,
    Fulfilled,
    Cancelled,
}

impl OrderEventKind {
    pub fn name(self) -> &'static str {
        match self {
            OrderEventKind::Created => "OrderCreated",
            OrderEventKind::Fulfilled => "OrderFulfilled",
            OrderEventKind::Cancelled => "OrderCancelled",
        }
    }
}

/// A market event with its arguments decoded into a strictly typed payload.
#[derive(Debug, Clone)]
pub enum OrderEvent {
    Created {
        order_id: u64,
        creator: Address,
        input_token: Address,
        input_amount: U256,
        output_token: Address,
        output_amount: U256,
    },
    Fulfilled {
        order_id: u64,
        fulfiller: Address,
        creator: Address,
    },
    Cancelled {
        order_id: u64,
        creator: Address,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> u64 {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::Fulfilled { order_id, .. }
            | OrderEvent::Cancelled { order_id, .. } => *order_id,
        }
    }
}

/// A decoded event together with the chain context it was emitted in.
#[derive(Debug, Clone)]
pub struct OrderLog {
    pub event: OrderEvent,
    pub block_number: u64,
    pub transaction_hash: String,
}

/// A log that does not decode into the expected event shape.
///
/// Decoding fails fast here instead of substituting defaults; a missing
/// `orderId` must never silently become order `0`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0} log has no block number")]
    MissingBlockNumber(&'static str),

    #[error("{0} log has no transaction hash")]
    MissingTransactionHash(&'static str),

    #[error("{0} orderId {1} exceeds u64 range")]
    OrderIdOutOfRange(&'static str, U256),

    #[error("malformed {0} log: {1}")]
    Malformed(&'static str, alloy::sol_types::Error),
}

fn log_context(kind: OrderEventKind, log: &Log) -> Result<(u64, String), DecodeError> {
    let block_number = log
        .block_number
        .ok_or(DecodeError::MissingBlockNumber(kind.name()))?;
    let transaction_hash = log
        .transaction_hash
        .map(|h| format!("{h:#x}"))
        .ok_or(DecodeError::MissingTransactionHash(kind.name()))?;
    Ok((block_number, transaction_hash))
}

fn order_id(kind: OrderEventKind, raw: U256) -> Result<u64, DecodeError> {
    u64::try_from(raw).map_err(|_| DecodeError::OrderIdOutOfRange(kind.name(), raw))
}

/// Decode a raw log as the given market event kind.
pub fn decode_order_log(kind: OrderEventKind, log: &Log) -> Result<OrderLog, DecodeError> {
    let (block_number, transaction_hash) = log_context(kind, log)?;

    let event = match kind {
        OrderEventKind::Created => {
            let decoded = log
                .log_decode::<BartMart::OrderCreated>()
                .map_err(|e| DecodeError::Malformed(kind.name(), e))?;
            let d = decoded.inner.data;
            OrderEvent::Created {
                order_id: order_id(kind, d.orderId)?,
                creator: d.creator,
                input_token: d.inputToken,
                input_amount: d.inputAmount,
                output_token: d.outputToken,
                output_amount: d.outputAmount,
            }
        }
        OrderEventKind::Fulfilled => {
            let decoded = log
                .log_decode::<BartMart::OrderFulfilled>()
                .map_err(|e| DecodeError::Malformed(kind.name(), e))?;
            let d = decoded.inner.data;
            OrderEvent::Fulfilled {
                order_id: order_id(kind, d.orderId)?,
                fulfiller: d.fulfiller,
                creator: d.creator,
            }
        }
        OrderEventKind::Cancelled => {
            let decoded = log
                .log_decode::<BartMart::OrderCancelled>()
                .map_err(|e| DecodeError::Malformed(kind.name(), e))?;
            let d = decoded.inner.data;
            OrderEvent::Cancelled {
                order_id: order_id(kind, d.orderId)?,
                creator: d.creator,
            }
        }
    };

    Ok(OrderLog {
        event,
        block_number,
        transaction_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, address, b256};
    use alloy::sol_types::SolEvent;

    fn created_log(order_id: u64) -> Log {
        let event = BartMart::OrderCreated {
            orderId: U256::from(order_id),
            creator: address!("00000000000000000000000000000000000000aa"),
            inputToken: Address::ZERO,
            inputAmount: U256::from(1000u64),
            outputToken: address!("00000000000000000000000000000000000000bb"),
            outputAmount: U256::from(2000u64),
        };
        let data = event.encode_log_data();
        Log {
            inner: alloy::primitives::Log {
                address: address!("03735e64c156d8c0d79a0cc5fd979a95f67fc94c"),
                data,
            },
            block_hash: Some(B256::ZERO),
            block_number: Some(100),
            block_timestamp: Some(1000),
            transaction_hash: Some(b256!(
                "00000000000000000000000000000000000000000000000000000000000000de"
            )),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[test]
    fn decodes_created_log_into_typed_payload() {
        let log = created_log(7);
        let decoded = decode_order_log(OrderEventKind::Created, &log).unwrap();
        assert_eq!(decoded.block_number, 100);
        match decoded.event {
            OrderEvent::Created {
                order_id,
                input_amount,
                ..
            } => {
                assert_eq!(order_id, 7);
                assert_eq!(input_amount, U256::from(1000u64));
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn rejects_log_with_wrong_event_shape() {
        // A Created log does not decode as Fulfilled.
        let log = created_log(7);
        let err = decode_order_log(OrderEventKind::Fulfilled, &log).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed("OrderFulfilled", _)));
    }

    #[test]
    fn rejects_pending_log_without_block_number() {
        let mut log = created_log(7);
        log.block_number = None;
        let err = decode_order_log(OrderEventKind::Created, &log).unwrap_err();
        assert!(matches!(err, DecodeError::MissingBlockNumber(_)));
    }
}
