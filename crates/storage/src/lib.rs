pub mod keys;
pub mod kv;
pub mod models;
pub mod repos;

pub use kv::{KvStore, KvWrite, MemoryStore, RedisStore, StoreError};

/// Connect to the Redis projection store.
pub async fn connect(redis_url: &str) -> Result<RedisStore, StoreError> {
    RedisStore::connect(redis_url).await
}
