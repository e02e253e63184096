pub mod abi;
pub mod decoder;
pub mod provider;
pub mod reader;

pub use abi::BartMart;
pub use alloy::primitives::{Address, U256};
pub use decoder::{DecodeError, NATIVE_TOKEN, OrderEvent, OrderEventKind, OrderLog};
pub use provider::create_provider;
pub use reader::{BlockInfo, ChainError, ChainReader, OrderState, RpcChainReader, TxInfo};
