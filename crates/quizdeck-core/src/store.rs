//! Persistent key-value store adapter.
//!
//! Two durable tiers sit behind traits: a small synchronous [`KeyValueStore`]
//! for session and configuration records, and an asynchronous
//! [`BulkStore`] for question chunks. [`PersistentStore`] namespaces keys,
//! wraps every value in a timestamped [`Envelope`], and (de)serializes JSON.
//!
//! In-memory implementations of both tiers live here too; the filesystem
//! implementations are in the `quizdeck-store` crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::StorageError;
use crate::model::{Chunk, ChunkId};

/// Prefix of every durable key. Bump the version when stored shapes change.
pub const NAMESPACE: &str = "quizdeck/v1";

pub const SESSION_STATE_KEY: &str = "session-state";
pub const USER_ANSWERS_KEY: &str = "user-answers";
pub const STATISTICS_KEY: &str = "statistics";
pub const CONFIG_KEY: &str = "config";
pub const CHUNK_KEY_PREFIX: &str = "chunk-";

/// Full durable key for a logical key.
pub fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}/{key}")
}

/// Logical key of a chunk, e.g. `chunk-0007`.
pub fn chunk_key(chunk_id: ChunkId) -> String {
    format!("{CHUNK_KEY_PREFIX}{chunk_id}")
}

/// A stored value with its write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub written_at: DateTime<Utc>,
    pub value: T,
}

/// A chunk as written to the bulk tier.
///
/// Carries the partition count it was computed under so a reshaped corpus
/// invalidates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub partitions: u32,
    pub chunk: Chunk,
}

// ---------------------------------------------------------------------------
// Tier traits
// ---------------------------------------------------------------------------

/// Small synchronous durable tier.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Larger asynchronous durable tier.
#[async_trait]
pub trait BulkStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// All keys starting with `prefix`, in ascending order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

// ---------------------------------------------------------------------------
// In-memory tiers
// ---------------------------------------------------------------------------

/// In-memory synchronous tier.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(key: &str) -> StorageError {
    StorageError::Read {
        key: key.to_string(),
        reason: "store lock poisoned".into(),
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "writes disabled".into(),
            });
        }
        let mut entries = self.entries.lock().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned(key))?;
        entries.remove(key);
        Ok(())
    }
}

/// In-memory asynchronous tier with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryBulkStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
    puts: AtomicU32,
}

impl MemoryBulkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes pushing the total value size past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of successful writes.
    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BulkStore for MemoryBulkStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned(key))?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if used + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned(key))?;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| poisoned(prefix))?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Typed, namespaced access to both durable tiers.
#[derive(Clone)]
pub struct PersistentStore {
    kv: Arc<dyn KeyValueStore>,
    bulk: Arc<dyn BulkStore>,
    clock: Arc<dyn Clock>,
}

impl PersistentStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        bulk: Arc<dyn BulkStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { kv, bulk, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn wrap<T: Serialize>(&self, key: &str, value: &T) -> Result<String, StorageError> {
        let envelope = Envelope {
            written_at: self.clock.now(),
            value,
        };
        serde_json::to_string(&envelope).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn unwrap_envelope<T: DeserializeOwned>(
        key: &str,
        raw: &str,
    ) -> Result<Envelope<T>, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read a record from the synchronous tier.
    pub fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<Envelope<T>>, StorageError> {
        let full = namespaced(key);
        match self.kv.get(&full)? {
            Some(raw) => Self::unwrap_envelope(&full, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Write a record to the synchronous tier.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let full = namespaced(key);
        let raw = self.wrap(&full, value)?;
        self.kv.set(&full, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.kv.remove(&namespaced(key))
    }

    pub async fn load_chunk(
        &self,
        chunk_id: ChunkId,
    ) -> Result<Option<Envelope<StoredChunk>>, StorageError> {
        let full = namespaced(&chunk_key(chunk_id));
        match self.bulk.get(&full).await? {
            Some(raw) => Self::unwrap_envelope(&full, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub async fn save_chunk(&self, stored: &StoredChunk) -> Result<(), StorageError> {
        let full = namespaced(&chunk_key(stored.chunk.chunk_id));
        let raw = self.wrap(&full, stored)?;
        self.bulk.put(&full, raw).await
    }

    pub async fn remove_chunk(&self, chunk_id: ChunkId) -> Result<(), StorageError> {
        self.bulk.delete(&namespaced(&chunk_key(chunk_id))).await
    }

    /// Ids of all chunks in the bulk tier.
    pub async fn chunk_ids(&self) -> Result<Vec<ChunkId>, StorageError> {
        let prefix = namespaced(CHUNK_KEY_PREFIX);
        let keys = self.bulk.keys(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix)?.parse().ok())
            .collect())
    }

    /// Delete up to `count` durable chunks, oldest write first.
    ///
    /// Entries that cannot be read count as oldest. Returns how many were
    /// removed.
    pub async fn evict_oldest_chunks(&self, count: usize) -> Result<usize, StorageError> {
        let mut aged = Vec::new();
        for chunk_id in self.chunk_ids().await? {
            let written_at = match self.load_chunk(chunk_id).await {
                Ok(Some(envelope)) => Some(envelope.written_at),
                _ => None,
            };
            aged.push((written_at, chunk_id));
        }
        aged.sort();

        let mut removed = 0;
        for (_, chunk_id) in aged.into_iter().take(count) {
            self.remove_chunk(chunk_id).await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete every durable chunk.
    pub async fn clear_chunks(&self) -> Result<usize, StorageError> {
        let ids = self.chunk_ids().await?;
        for chunk_id in &ids {
            self.remove_chunk(*chunk_id).await?;
        }
        Ok(ids.len())
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore").finish_non_exhaustive()
    }
}
