//! The `quizdeck reset` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use quizdeck_core::store::{CONFIG_KEY, SESSION_STATE_KEY, STATISTICS_KEY, USER_ANSWERS_KEY};

use crate::context::AppContext;

pub async fn execute(config_path: Option<PathBuf>, all: bool) -> Result<()> {
    let ctx = AppContext::load(config_path)?;

    for key in [SESSION_STATE_KEY, USER_ANSWERS_KEY, STATISTICS_KEY] {
        ctx.store
            .remove(key)
            .with_context(|| format!("failed to remove {key}"))?;
    }
    println!("Session discarded.");

    if all {
        ctx.store
            .remove(CONFIG_KEY)
            .with_context(|| format!("failed to remove {CONFIG_KEY}"))?;
        let removed = ctx.store.clear_chunks().await?;
        println!("Removed {removed} cached chunk(s).");
    }

    Ok(())
}
