//! The `quizdeck stats` command.

use std::path::PathBuf;

use anyhow::Result;

use quizdeck_core::model::Phase;
use quizdeck_core::session::SessionState;
use quizdeck_core::statistics::{compute_statistics, score_by, Statistics};
use quizdeck_core::store::{SESSION_STATE_KEY, STATISTICS_KEY};

use crate::context::AppContext;
use crate::display::print_statistics;

pub async fn execute(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let ctx = AppContext::load(config_path)?;

    let Some(snapshot) = ctx
        .store
        .load::<SessionState>(SESSION_STATE_KEY)?
        .filter(|e| e.value.phase != Phase::Idle)
    else {
        println!("No quiz session recorded yet. Start one with `quizdeck quiz`.");
        return Ok(());
    };
    let state = snapshot.value;

    // Scoring needs only the index, never question bodies
    let (index, _) = ctx.open_cache().await?;
    let session_score = score_by(
        state
            .question_ids
            .iter()
            .filter_map(|id| index.entry(id))
            .map(|e| (e.id.as_str(), e.gradable)),
        &state.answers,
    );
    let stats = match ctx.store.load::<Statistics>(STATISTICS_KEY)? {
        Some(stored) => stored.value,
        None => compute_statistics(state.answers.values(), |id| {
            index.entry(id).map(|e| e.subject.clone())
        }),
    };

    if json {
        let value = serde_json::json!({
            "session_id": state.session_id,
            "phase": state.phase,
            "updated_at": snapshot.written_at,
            "score": session_score,
            "statistics": stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let (answered, total) = state.progress();
    println!(
        "Session {} ({}, {answered}/{total} answered, updated {})",
        state.session_id,
        state.phase,
        snapshot.written_at.format("%Y-%m-%d %H:%M")
    );
    print_statistics(&session_score, &stats);
    Ok(())
}
