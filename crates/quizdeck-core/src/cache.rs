//! Chunk cache manager.
//!
//! Serves question chunks cache-first: an in-memory LRU, then the durable
//! bulk tier (subject to a TTL), then a recompute from the corpus source.
//! Concurrent loads of the same chunk share one in-flight future, and a
//! recompute reads the corpus once for every partition: the sibling chunks
//! it produces are written to the durable tier alongside the requested one.
//! Durable writes run in the background; when they keep failing the manager
//! stops writing and carries on from memory.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::CacheError;
use crate::index::Partitioner;
use crate::model::{Chunk, ChunkId, Question};
use crate::parser::parse_corpus_str;
use crate::store::{PersistentStore, StoredChunk};
use crate::traits::CorpusSource;

/// Tuning knobs for the chunk cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of chunks held in memory.
    pub max_cache_size: usize,
    /// Target number of questions per chunk.
    pub chunk_size: usize,
    /// How long a durable chunk stays valid.
    pub ttl: chrono::Duration,
    /// Durable entries removed when a write runs out of space.
    pub evict_batch: usize,
}

impl CacheConfig {
    /// Whether a chunk cached at `cached_at` is still valid at `now`. A chunk
    /// exactly `ttl` old has expired.
    pub fn is_fresh(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - cached_at < self.ttl
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 8,
            chunk_size: 50,
            ttl: chrono::Duration::hours(24),
            evict_batch: 2,
        }
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub durable_hits: u64,
    /// Chunks served from a recompute whose durable write is still pending.
    pub staged_hits: u64,
    /// Corpus fetch-and-parse rounds.
    pub recomputes: u64,
    /// Chunks dropped from memory by the LRU.
    pub evictions: u64,
    pub write_failures: u64,
}

/// What to drop from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidate {
    Chunk(ChunkId),
    All,
}

type LoadResult = Result<Arc<Chunk>, CacheError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;
type Partitions = Arc<HashMap<ChunkId, Arc<Chunk>>>;
type SharedRebuild = Shared<BoxFuture<'static, Result<Partitions, CacheError>>>;

struct MemoryEntry {
    chunk: Arc<Chunk>,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    memory: HashMap<ChunkId, MemoryEntry>,
    tick: u64,
    /// In-flight loads tagged with the epoch they started in.
    inflight: HashMap<ChunkId, (u64, SharedLoad)>,
    /// The corpus read currently feeding recomputes, tagged like `inflight`.
    rebuild: Option<(u64, SharedRebuild)>,
    /// Recomputed chunks whose durable write has not landed yet.
    staged: HashMap<ChunkId, Arc<Chunk>>,
    /// Bumped by every invalidation so late loads do not resurrect data.
    epoch: u64,
    stats: CacheStats,
    writes: Vec<JoinHandle<()>>,
}

impl CacheState {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.memory.len() > max {
            let Some(oldest) = self
                .memory
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            self.memory.remove(&oldest);
            self.stats.evictions += 1;
            evicted += 1;
            tracing::debug!(chunk_id = %oldest, "evicted chunk from memory");
        }
        evicted
    }
}

/// Chunk cache in front of the durable store.
pub struct ChunkCacheManager {
    source: Arc<dyn CorpusSource>,
    store: PersistentStore,
    partitioner: Partitioner,
    config: CacheConfig,
    state: Mutex<CacheState>,
    memory_only: AtomicBool,
}

impl ChunkCacheManager {
    pub fn new(
        source: Arc<dyn CorpusSource>,
        store: PersistentStore,
        partitioner: Partitioner,
        config: CacheConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            store,
            partitioner,
            config,
            state: Mutex::new(CacheState::default()),
            memory_only: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }

    /// Whether durable writes have been given up on.
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::SeqCst)
    }

    /// Chunks currently held in memory, ascending.
    pub fn cached_chunk_ids(&self) -> Vec<ChunkId> {
        let mut ids: Vec<ChunkId> = self.state().memory.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn memory_len(&self) -> usize {
        self.state().memory.len()
    }

    /// Load a chunk, cache-first.
    #[tracing::instrument(skip(self), fields(chunk_id = %chunk_id))]
    pub async fn load_chunk(self: &Arc<Self>, chunk_id: ChunkId) -> LoadResult {
        if !self.partitioner.contains(chunk_id) {
            return Err(CacheError::UnknownChunk {
                chunk_id: chunk_id.to_string(),
                partitions: self.partitioner.partitions(),
            });
        }

        let load = {
            let mut state = self.state();
            let tick = state.touch();
            if let Some(entry) = state.memory.get_mut(&chunk_id) {
                entry.last_used = tick;
                let chunk = Arc::clone(&entry.chunk);
                state.stats.memory_hits += 1;
                tracing::debug!("memory hit");
                return Ok(chunk);
            }

            match state.inflight.get(&chunk_id) {
                Some((_, load)) => {
                    tracing::debug!("joining in-flight load");
                    load.clone()
                }
                None => {
                    let epoch = state.epoch;
                    let this = Arc::clone(self);
                    let load = async move {
                        let result = this.fetch_chunk(chunk_id, epoch).await;
                        this.complete_load(chunk_id, epoch, &result);
                        result
                    }
                    .boxed()
                    .shared();
                    state.inflight.insert(chunk_id, (epoch, load.clone()));
                    load
                }
            }
        };

        load.await
    }

    fn complete_load(&self, chunk_id: ChunkId, epoch: u64, result: &LoadResult) {
        let mut state = self.state();
        if state.inflight.get(&chunk_id).is_some_and(|(e, _)| *e == epoch) {
            state.inflight.remove(&chunk_id);
        }
        if state.epoch != epoch {
            return;
        }
        if let Ok(chunk) = result {
            let tick = state.touch();
            state.memory.insert(
                chunk_id,
                MemoryEntry {
                    chunk: Arc::clone(chunk),
                    last_used: tick,
                },
            );
            state.evict_lru(self.config.max_cache_size);
        }
    }

    async fn fetch_chunk(self: &Arc<Self>, chunk_id: ChunkId, epoch: u64) -> LoadResult {
        if let Some(chunk) = self.take_staged(chunk_id) {
            return Ok(chunk);
        }

        let now = self.store.clock().now();
        match self.store.load_chunk(chunk_id).await {
            Ok(Some(envelope)) => {
                let stored = envelope.value;
                let fresh = self.config.is_fresh(stored.chunk.cached_at, now);
                let same_shape = stored.partitions == self.partitioner.partitions()
                    && stored.chunk.chunk_id == chunk_id;
                if fresh && same_shape {
                    self.state().stats.durable_hits += 1;
                    tracing::debug!("durable hit");
                    return Ok(Arc::new(stored.chunk));
                }
                tracing::debug!(fresh, same_shape, "durable copy unusable");
            }
            Ok(None) => tracing::debug!("durable miss"),
            Err(e) => tracing::warn!("durable read failed, treating as miss: {e}"),
        }

        self.rebuild(chunk_id, epoch).await
    }

    fn take_staged(&self, chunk_id: ChunkId) -> Option<Arc<Chunk>> {
        let mut state = self.state();
        let chunk = state.staged.get(&chunk_id).cloned()?;
        state.stats.staged_hits += 1;
        tracing::debug!("served from pending durable write");
        Some(chunk)
    }

    /// Serve `chunk_id` from a corpus read: a staged sibling of an earlier
    /// read, the read running for `epoch`, or a new one.
    async fn rebuild(self: &Arc<Self>, chunk_id: ChunkId, epoch: u64) -> LoadResult {
        let load = {
            let mut state = self.state();
            if let Some(chunk) = state.staged.get(&chunk_id).cloned() {
                state.stats.staged_hits += 1;
                return Ok(chunk);
            }
            let running = match &state.rebuild {
                Some((e, load)) if *e == epoch => Some(load.clone()),
                _ => None,
            };
            match running {
                Some(load) => load,
                None => {
                    let this = Arc::clone(self);
                    let load = async move {
                        let result = this.recompute_all().await;
                        this.complete_rebuild(epoch, &result).await;
                        result
                    }
                    .boxed()
                    .shared();
                    // A load from before an invalidation reads on its own
                    if state.epoch == epoch {
                        state.rebuild = Some((epoch, load.clone()));
                    }
                    load
                }
            }
        };
        let partitions = load.await?;
        partitions
            .get(&chunk_id)
            .cloned()
            .ok_or_else(|| CacheError::UnknownChunk {
                chunk_id: chunk_id.to_string(),
                partitions: self.partitioner.partitions(),
            })
    }

    /// Retire the corpus read and hand its chunks to the durable tier.
    ///
    /// Chunks are staged under the same lock that retires the read, so a
    /// concurrent load always finds either the read or its chunks.
    async fn complete_rebuild(
        self: &Arc<Self>,
        epoch: u64,
        result: &Result<Partitions, CacheError>,
    ) {
        let persist = {
            let mut state = self.state();
            if state.rebuild.as_ref().is_some_and(|(e, _)| *e == epoch) {
                state.rebuild = None;
            }
            let Ok(partitions) = result else {
                return;
            };
            state.stats.recomputes += 1;
            if state.epoch != epoch || self.is_memory_only() {
                return;
            }
            for (chunk_id, chunk) in partitions.iter() {
                state.staged.insert(*chunk_id, Arc::clone(chunk));
            }
            Arc::clone(partitions)
        };
        for chunk in persist.values() {
            self.persist_chunk(Arc::clone(chunk)).await;
        }
    }

    /// Fetch and parse the corpus once and split it into every partition.
    async fn recompute_all(&self) -> Result<Partitions, CacheError> {
        let raw = self.source.fetch().await.map_err(|e| CacheError::Source {
            source_name: self.source.name().to_string(),
            reason: format!("{e:#}"),
        })?;
        let corpus = parse_corpus_str(&raw)?;

        let mut buckets: HashMap<ChunkId, Vec<Question>> = (0..self.partitioner.partitions())
            .map(|p| (ChunkId(p), Vec::new()))
            .collect();
        for question in corpus.questions {
            let chunk_id = self.partitioner.chunk_of(&question.id);
            buckets.entry(chunk_id).or_default().push(question);
        }

        let cached_at = self.store.clock().now();
        tracing::debug!(
            partitions = buckets.len(),
            source = self.source.name(),
            "corpus recomputed into chunks"
        );
        Ok(Arc::new(
            buckets
                .into_iter()
                .map(|(chunk_id, questions)| {
                    let chunk = Chunk {
                        chunk_id,
                        questions,
                        cached_at,
                    };
                    (chunk_id, Arc::new(chunk))
                })
                .collect(),
        ))
    }

    /// Queue a durable write of a staged chunk and unstage it once the write
    /// is done. Runs in the background when a runtime exists.
    async fn persist_chunk(self: &Arc<Self>, chunk: Arc<Chunk>) {
        let chunk_id = chunk.chunk_id;
        let stored = StoredChunk {
            partitions: self.partitioner.partitions(),
            chunk: (*chunk).clone(),
        };

        let this = Arc::clone(self);
        let write = async move {
            this.write_with_recovery(stored).await;
            let mut state = this.state();
            if state.staged.get(&chunk_id).is_some_and(|c| Arc::ptr_eq(c, &chunk)) {
                state.staged.remove(&chunk_id);
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(write);
                let mut state = self.state();
                state.writes.retain(|t| !t.is_finished());
                state.writes.push(task);
            }
            Err(_) => write.await,
        }
    }

    async fn write_with_recovery(&self, stored: StoredChunk) {
        if self.is_memory_only() {
            return;
        }
        let chunk_id = stored.chunk.chunk_id;
        let Err(first) = self.store.save_chunk(&stored).await else {
            return;
        };
        self.state().stats.write_failures += 1;
        tracing::warn!(
            chunk_id = %chunk_id,
            "durable write failed, evicting oldest entries: {first}"
        );

        match self.store.evict_oldest_chunks(self.config.evict_batch).await {
            Ok(removed) => tracing::debug!(removed, "evicted durable chunks"),
            Err(e) => tracing::warn!("durable eviction failed: {e}"),
        }

        if let Err(retry) = self.store.save_chunk(&stored).await {
            self.state().stats.write_failures += 1;
            self.memory_only.store(true, Ordering::SeqCst);
            tracing::warn!(
                chunk_id = %chunk_id,
                "durable write failed again, continuing memory-only: {retry}"
            );
        }
    }

    /// Wait for background durable writes to finish.
    pub async fn flush_writes(&self) {
        let writes = std::mem::take(&mut self.state().writes);
        for task in writes {
            if let Err(e) = task.await {
                tracing::warn!("durable write task failed: {e}");
            }
        }
    }

    /// Start loading a chunk in the background. Never fails.
    ///
    /// Returns `None` when the chunk is already in memory or no tokio runtime
    /// is available.
    pub fn preload(self: &Arc<Self>, chunk_id: ChunkId) -> Option<JoinHandle<()>> {
        if self.state().memory.contains_key(&chunk_id) {
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!(chunk_id = %chunk_id, "no runtime, skipping preload");
            return None;
        };
        let this = Arc::clone(self);
        Some(handle.spawn(async move {
            if let Err(e) = this.load_chunk(chunk_id).await {
                tracing::warn!(chunk_id = %chunk_id, "preload failed: {e}");
            }
        }))
    }

    /// Drop least-recently-used chunks until the memory ceiling holds.
    pub fn evict_if_needed(&self) -> usize {
        self.state().evict_lru(self.config.max_cache_size)
    }

    /// Remove memory and durable copies.
    pub async fn invalidate(&self, target: Invalidate) {
        {
            let mut state = self.state();
            state.epoch += 1;
            state.rebuild = None;
            match target {
                Invalidate::Chunk(chunk_id) => {
                    state.memory.remove(&chunk_id);
                    state.inflight.remove(&chunk_id);
                    state.staged.remove(&chunk_id);
                }
                Invalidate::All => {
                    state.memory.clear();
                    state.inflight.clear();
                    state.staged.clear();
                }
            }
        }
        self.flush_writes().await;

        let result = match target {
            Invalidate::Chunk(chunk_id) => self.store.remove_chunk(chunk_id).await.map(|_| 1),
            Invalidate::All => self.store.clear_chunks().await,
        };
        match result {
            Ok(removed) => tracing::info!(?target, removed, "cache invalidated"),
            Err(e) => tracing::warn!(?target, "failed to remove durable chunks: {e}"),
        }
    }

    /// Resolve question ids to bodies, in the order given.
    pub async fn questions(self: &Arc<Self>, ids: &[String]) -> Result<Vec<Question>, CacheError> {
        let chunk_ids: BTreeSet<ChunkId> =
            ids.iter().map(|id| self.partitioner.chunk_of(id)).collect();
        let loads = join_all(chunk_ids.into_iter().map(|c| self.load_chunk(c))).await;

        let mut by_id: HashMap<&str, &Question> = HashMap::new();
        let chunks = loads.into_iter().collect::<Result<Vec<_>, _>>()?;
        for chunk in &chunks {
            for q in &chunk.questions {
                by_id.insert(q.id.as_str(), q);
            }
        }

        ids.iter()
            .map(|id| {
                by_id
                    .get(id.as_str())
                    .map(|q| (*q).clone())
                    .ok_or_else(|| CacheError::UnknownQuestion(id.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for ChunkCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCacheManager")
            .field("source", &self.source.name())
            .field("partitioner", &self.partitioner)
            .field("config", &self.config)
            .field("memory_only", &self.is_memory_only())
            .finish_non_exhaustive()
    }
}
