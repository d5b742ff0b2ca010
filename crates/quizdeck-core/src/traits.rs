//! Core trait definitions for corpus sources and explanation providers.
//!
//! These async traits are implemented by the `quizdeck-store` and
//! `quizdeck-providers` crates respectively.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Question, QuestionOption};

// ---------------------------------------------------------------------------
// Corpus source trait
// ---------------------------------------------------------------------------

/// Where the full question corpus comes from.
///
/// Every call is one read of the whole corpus; the cache manager avoids
/// calling it whenever a cached copy is usable.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Human-readable source name (e.g. a file path).
    fn name(&self) -> &str;

    /// Fetch the raw corpus text.
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// A corpus held in memory. Counts how often it is fetched.
pub struct StaticCorpus {
    name: String,
    content: String,
    fetches: AtomicU32,
}

impl StaticCorpus {
    pub fn new(name: &str, content: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            content: content.into(),
            fetches: AtomicU32::new(0),
        }
    }

    /// Number of times the corpus has been fetched.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorpusSource for StaticCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.clone())
    }
}

// ---------------------------------------------------------------------------
// Explanation provider trait
// ---------------------------------------------------------------------------

/// Remote text-completion service that explains a question.
#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Ask for an explanation of a question.
    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Explanation>;
}

/// What the explanation service is told about a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub question_id: String,
    pub subject: String,
    pub stem: String,
    pub options: Vec<QuestionOption>,
    /// The answer key, when known.
    #[serde(default)]
    pub answer: Option<String>,
    /// What the user picked.
    #[serde(default)]
    pub selected: Option<String>,
}

impl ExplainRequest {
    pub fn for_question(question: &Question, selected: Option<&str>) -> Self {
        Self {
            question_id: question.id.clone(),
            subject: question.subject.clone(),
            stem: question.stem.clone(),
            options: question.options.clone(),
            answer: question.answer.clone(),
            selected: selected.map(str::to_string),
        }
    }
}

/// Response of the explanation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub success: bool,
    pub content: String,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl Explanation {
    pub fn succeeded(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            success: true,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            confidence: 0.0,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompting
// ---------------------------------------------------------------------------

/// Default system prompt for explanation providers.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an exam tutor. Explain briefly why the correct option is correct and why the others are not. End your reply with a line of the form `Confidence: <number between 0 and 1>`.";

/// Confidence assumed when a reply carries no confidence line.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Render the user prompt for an explanation request.
pub fn build_explain_prompt(request: &ExplainRequest) -> String {
    let mut prompt = format!("Subject: {}\n\nQuestion: {}\n\n", request.subject, request.stem);
    for option in &request.options {
        prompt.push_str(&format!("({}) {}\n", option.key, option.text));
    }
    match &request.answer {
        Some(answer) => prompt.push_str(&format!("\nCorrect answer: {answer}\n")),
        None => prompt.push_str("\nThe answer key is unknown; determine the most likely answer.\n"),
    }
    if let Some(selected) = &request.selected {
        prompt.push_str(&format!("The student chose: {selected}\n"));
    }
    prompt
}

/// Split a trailing `Confidence: x` line from a provider reply.
///
/// Returns the reply without that line and the parsed value clamped to
/// `[0, 1]`, or the reply untouched and `None` when no such line exists.
pub fn extract_confidence(response: &str) -> (String, Option<f64>) {
    let trimmed = response.trim_end();
    let (body, last) = trimmed.rsplit_once('\n').unwrap_or(("", trimmed));

    let line = last.trim().trim_matches('*').trim();
    let value = line
        .strip_prefix("Confidence:")
        .or_else(|| line.strip_prefix("confidence:"))
        .and_then(|v| v.trim().trim_end_matches('%').parse::<f64>().ok());

    match value {
        Some(v) => {
            let v = if v > 1.0 { v / 100.0 } else { v };
            (body.trim_end().to_string(), Some(v.clamp(0.0, 1.0)))
        }
        None => (response.to_string(), None),
    }
}

/// Ask a provider for an explanation, never failing.
///
/// Provider errors and timeouts become `success = false` so callers can show
/// the failure without it touching session state.
pub async fn request_explanation(
    provider: &dyn ExplanationProvider,
    request: &ExplainRequest,
    timeout: Duration,
) -> Explanation {
    match tokio::time::timeout(timeout, provider.explain(request)).await {
        Ok(Ok(explanation)) => explanation,
        Ok(Err(e)) => {
            tracing::warn!(
                provider = provider.name(),
                question_id = %request.question_id,
                "explanation failed: {e:#}"
            );
            Explanation::failed(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                provider = provider.name(),
                question_id = %request.question_id,
                "explanation timed out after {}ms",
                timeout.as_millis()
            );
            Explanation::failed(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}
