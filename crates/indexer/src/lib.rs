//! Event-indexing and order-state projection for the BartMart contract.
//!
//! Two paths keep the Redis projection in step with the chain:
//! the [`IncrementalIndexer`] replays contract events from a resumable block
//! cursor, and the [`FullSync`] reconciler rebuilds order records straight
//! from contract storage when event history is not enough.

pub mod events;
pub mod incremental;
pub mod sync;

use bartmart_chain::ChainError;
use bartmart_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub use incremental::{DEFAULT_LOOKBACK_BLOCKS, IncrementalIndexer};
pub use sync::{DEFAULT_SYNC_BATCH, FullSync};
