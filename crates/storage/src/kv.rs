//! Key-value store abstraction over the projection's Redis primitives.
//!
//! The repos are written against [`KvStore`] so that the indexer and the API
//! can run against a real Redis ([`RedisStore`]) while tests use an injected
//! in-memory fake ([`MemoryStore`]). Writes are expressed as [`KvWrite`]
//! batches and applied as a single pipeline.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached; callers degrade to a clean failure.
    #[error("projection store unavailable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

/// One mutation in a pipelined write batch.
#[derive(Debug, Clone)]
pub enum KvWrite {
    /// `SET key value`
    Put { key: String, value: String },
    /// `HSET key field value [field value ...]`
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// `HINCRBY key field delta`
    HashIncrBy {
        key: String,
        field: String,
        delta: i64,
    },
    /// `SADD key member`
    SetAdd { key: String, member: String },
    /// `SREM key member`
    SetRemove { key: String, member: String },
    /// `LPUSH key value` followed by `LTRIM key 0 cap-1`
    ListPushCapped {
        key: String,
        value: String,
        cap: i64,
    },
}

/// The projection store interface: pipelined writes plus the read primitives
/// the repos need.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Inclusive `LRANGE key start stop`; `-1` means the last element.
    async fn list_range(&self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

// ─── Redis ──────────────────────────────────────────────────────────────────

/// Redis-backed store using a multiplexed connection manager.
///
/// The handle is cheap to clone; one is constructed at startup and injected
/// into every component that needs the projection.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for write in &writes {
            match write {
                KvWrite::Put { key, value } => {
                    pipe.set(key, value).ignore();
                }
                KvWrite::HashSet { key, fields } => {
                    pipe.hset_multiple(key, fields).ignore();
                }
                KvWrite::HashIncrBy { key, field, delta } => {
                    pipe.hincr(key, field, *delta).ignore();
                }
                KvWrite::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                KvWrite::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                KvWrite::ListPushCapped { key, value, cap } => {
                    pipe.lpush(key, value).ignore();
                    pipe.ltrim(key, 0, (cap - 1) as isize).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(map)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }
}

// ─── In-memory fake ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// In-memory [`KvStore`] with the same semantics as the Redis commands the
/// repos use. Intended for tests and local development without a Redis.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        for write in writes {
            match write {
                KvWrite::Put { key, value } => {
                    inner.strings.insert(key, value);
                }
                KvWrite::HashSet { key, fields } => {
                    let hash = inner.hashes.entry(key).or_default();
                    for (field, value) in fields {
                        hash.insert(field, value);
                    }
                }
                KvWrite::HashIncrBy { key, field, delta } => {
                    let hash = inner.hashes.entry(key).or_default();
                    let current: i64 = hash.get(&field).and_then(|v| v.parse().ok()).unwrap_or(0);
                    hash.insert(field, (current + delta).to_string());
                }
                KvWrite::SetAdd { key, member } => {
                    inner.sets.entry(key).or_default().insert(member);
                }
                KvWrite::SetRemove { key, member } => {
                    if let Some(set) = inner.sets.get_mut(&key) {
                        set.remove(&member);
                    }
                }
                KvWrite::ListPushCapped { key, value, cap } => {
                    let list = inner.lists.entry(key).or_default();
                    list.insert(0, value);
                    list.truncate(cap.max(0) as usize);
                }
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.strings.get(key).cloned())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let Some(list) = inner.lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;
        let start = start.max(0);
        let stop = if stop < 0 { len + stop } else { stop };
        if start >= len || stop < start {
            return Ok(Vec::new());
        }
        let stop = stop.min(len - 1);
        Ok(list[start as usize..=stop as usize].to_vec())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.strings.contains_key(key)
            || inner.hashes.contains_key(key)
            || inner.sets.contains_key(key)
            || inner.lists.contains_key(key))
    }
}
