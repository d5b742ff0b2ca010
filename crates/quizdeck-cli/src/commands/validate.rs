//! The `quizdeck validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use quizdeck_core::parser::{self, Corpus};
use quizdeck_providers::config::load_config_from;
use quizdeck_store::corpus_source;

pub async fn execute(config_path: Option<PathBuf>, corpus: Option<String>) -> Result<()> {
    let location = match corpus {
        Some(location) => location,
        None => load_config_from(config_path.as_deref())?.corpus,
    };

    let corpus = load(&location).await?;
    println!("Corpus: {location} ({} questions)", corpus.len());

    let warnings = parser::validate_corpus(&corpus);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Corpus valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}

async fn load(location: &str) -> Result<Corpus> {
    if !location.starts_with("http://") && !location.starts_with("https://") {
        return parser::load_corpus_file(Path::new(location));
    }
    let content = corpus_source(location)?.fetch().await?;
    parser::parse_corpus_str(&content)
        .with_context(|| format!("failed to load corpus: {location}"))
}
