//! The `quizdeck index` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use quizdeck_core::index::QuestionIndex;

use crate::context::AppContext;

pub async fn execute(
    config_path: Option<PathBuf>,
    subject: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    let source = ctx.source()?;
    let chunk_size = ctx.config.cache.to_cache_config().chunk_size;
    let index = QuestionIndex::load(source.as_ref(), chunk_size).await?;

    match subject {
        Some(subject) => print_subject(&index, &subject, json),
        None => print_overview(&index, json),
    }
}

fn print_overview(index: &QuestionIndex, json: bool) -> Result<()> {
    let subjects = index.subjects();

    if json {
        let value = serde_json::json!({
            "questions": index.len(),
            "chunks": index.partitioner().partitions(),
            "subjects": subjects
                .iter()
                .map(|s| serde_json::json!({"subject": s.subject, "questions": s.questions}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} questions in {} chunks",
        index.len(),
        index.partitioner().partitions()
    );
    let mut table = Table::new();
    table.set_header(vec!["Subject", "Questions"]);
    for s in &subjects {
        table.add_row(vec![Cell::new(&s.subject), Cell::new(s.questions)]);
    }
    println!("{table}");
    Ok(())
}

fn print_subject(index: &QuestionIndex, subject: &str, json: bool) -> Result<()> {
    let ids = index.filter_by_subject(Some(subject));
    anyhow::ensure!(!ids.is_empty(), "no questions match subject '{subject}'");

    let entries: Vec<_> = ids.iter().filter_map(|id| index.entry(id)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{subject}: {} questions", entries.len());
    let mut table = Table::new();
    table.set_header(vec!["Question", "Chunk"]);
    for entry in entries {
        table.add_row(vec![Cell::new(&entry.id), Cell::new(entry.chunk_id)]);
    }
    println!("{table}");
    Ok(())
}
