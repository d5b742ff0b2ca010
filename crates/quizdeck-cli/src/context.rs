//! Wiring shared by the commands: config, durable store, index and cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use quizdeck_core::cache::ChunkCacheManager;
use quizdeck_core::index::QuestionIndex;
use quizdeck_core::store::PersistentStore;
use quizdeck_core::traits::CorpusSource;
use quizdeck_providers::config::load_config_from;
use quizdeck_providers::QuizdeckConfig;
use quizdeck_store::{corpus_source, DataDir};

pub struct AppContext {
    pub config: QuizdeckConfig,
    pub store: PersistentStore,
}

impl AppContext {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config_from(config_path.as_deref())?;
        let store = DataDir::new(&config.data_dir).open(config.cache.durable_quota_bytes)?;
        Ok(Self { config, store })
    }

    pub fn source(&self) -> Result<Arc<dyn CorpusSource>> {
        corpus_source(&self.config.corpus)
    }

    /// Build the index from the corpus and a cache manager over it.
    pub async fn open_cache(&self) -> Result<(Arc<QuestionIndex>, Arc<ChunkCacheManager>)> {
        let source = self.source()?;
        let cache_config = self.config.cache.to_cache_config();
        let index = QuestionIndex::load(source.as_ref(), cache_config.chunk_size)
            .await
            .with_context(|| format!("failed to index corpus {}", self.config.corpus))?;

        let cache = ChunkCacheManager::new(
            source,
            self.store.clone(),
            index.partitioner(),
            cache_config,
        );
        Ok((Arc::new(index), cache))
    }
}
