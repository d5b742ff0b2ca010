//! The `quizdeck cache` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Table};

use quizdeck_core::cache::CacheConfig;
use quizdeck_core::store::PersistentStore;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum CacheAction {
    /// List the chunks held in the durable cache
    Stats,
    /// Load every chunk so later sessions start from the cache
    Warm,
    /// Delete every cached chunk
    Clear,
}

pub async fn execute(config_path: Option<PathBuf>, action: CacheAction) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    match action {
        CacheAction::Stats => stats(&ctx.store, &ctx.config.cache.to_cache_config()).await,
        CacheAction::Warm => warm(&ctx).await,
        CacheAction::Clear => {
            let removed = ctx.store.clear_chunks().await?;
            println!("Removed {removed} cached chunk(s).");
            Ok(())
        }
    }
}

async fn stats(store: &PersistentStore, config: &CacheConfig) -> Result<()> {
    let ids = store.chunk_ids().await?;
    if ids.is_empty() {
        println!("No cached chunks.");
        return Ok(());
    }

    let now = store.clock().now();

    let mut table = Table::new();
    table.set_header(vec!["Chunk", "Questions", "Cached at", "Status"]);
    for chunk_id in &ids {
        match store.load_chunk(*chunk_id).await {
            Ok(Some(envelope)) => {
                let chunk = &envelope.value.chunk;
                let status = if config.is_fresh(chunk.cached_at, now) {
                    "fresh"
                } else {
                    "expired"
                };
                table.add_row(vec![
                    Cell::new(chunk_id),
                    Cell::new(chunk.len()),
                    Cell::new(chunk.cached_at.format("%Y-%m-%d %H:%M:%S")),
                    Cell::new(status),
                ]);
            }
            Ok(None) => {}
            Err(e) => {
                table.add_row(vec![
                    Cell::new(chunk_id),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(format!("unreadable: {e}")),
                ]);
            }
        }
    }

    println!("{} cached chunk(s)", ids.len());
    println!("{table}");
    Ok(())
}

async fn warm(ctx: &AppContext) -> Result<()> {
    let (index, cache) = ctx.open_cache().await?;
    for chunk_id in index.chunk_ids() {
        cache.load_chunk(chunk_id).await?;
    }
    cache.flush_writes().await;

    let stats = cache.stats();
    let warmed = index.chunk_ids().len() as u64;
    println!(
        "Warmed {warmed} chunk(s): {} from cache, {} recomputed in {} corpus read(s).",
        stats.durable_hits,
        warmed.saturating_sub(stats.durable_hits),
        stats.recomputes
    );
    if cache.is_memory_only() {
        println!("Warning: durable cache is full; chunks were kept in memory only.");
    }
    Ok(())
}
