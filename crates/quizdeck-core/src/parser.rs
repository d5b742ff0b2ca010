//! JSON question corpus parser.
//!
//! Loads a corpus from a JSON document, drops malformed records with a
//! warning, and validates what survives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CorpusError;
use crate::model::{Question, QuestionOption, MAX_OPTIONS, MIN_OPTIONS};

/// Intermediate structure for one corpus record.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<RawScalar>,
    #[serde(default, alias = "exam_subject")]
    subject: Option<String>,
    #[serde(default, alias = "question")]
    stem: Option<String>,
    #[serde(default)]
    options: Option<RawOptions>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    difficulty: Option<RawScalar>,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Number(serde_json::Number),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Text(s) => s,
            RawScalar::Number(n) => n.to_string(),
        }
    }
}

/// Options come either as an ordered list or as a key → text map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOptions {
    List(Vec<RawOption>),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct RawOption {
    key: String,
    #[serde(alias = "label")]
    text: String,
}

/// A record that was skipped while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    /// Position of the record in the source list.
    pub position: usize,
    /// The record's id, when it had a readable one.
    pub id: Option<String>,
    pub reason: String,
}

/// The usable questions of a corpus plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub questions: Vec<Question>,
    pub dropped: Vec<DroppedRecord>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Read and parse a corpus file.
pub fn load_corpus_file(path: &Path) -> Result<Corpus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus file: {}", path.display()))?;

    parse_corpus_str(&content)
        .with_context(|| format!("failed to load corpus: {}", path.display()))
}

/// Parse a corpus document.
///
/// Accepts a bare array of records or an object with a `questions` array.
/// Records that cannot be turned into a valid question are dropped and logged;
/// the call only fails when the document itself is malformed or nothing
/// usable remains.
pub fn parse_corpus_str(content: &str) -> Result<Corpus, CorpusError> {
    let document: Value =
        serde_json::from_str(content).map_err(|e| CorpusError::Parse(e.to_string()))?;

    let records = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CorpusError::Parse(
                    "expected a list of question records or an object with a `questions` list"
                        .into(),
                ))
            }
        },
        _ => {
            return Err(CorpusError::Parse(
                "expected a list of question records".into(),
            ))
        }
    };

    let mut questions = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();
    let mut seen_ids = HashSet::new();

    for (position, record) in records.into_iter().enumerate() {
        let result = serde_json::from_value::<RawQuestion>(record)
            .map_err(|e| (None, format!("not a question record: {e}")))
            .and_then(into_question);

        match result {
            Ok(question) if !seen_ids.insert(question.id.clone()) => {
                let reason = format!("duplicate question id: {}", question.id);
                tracing::warn!(position, id = %question.id, "dropping corpus record: {reason}");
                dropped.push(DroppedRecord {
                    position,
                    id: Some(question.id),
                    reason,
                });
            }
            Ok(question) => questions.push(question),
            Err((id, reason)) => {
                tracing::warn!(position, id = ?id, "dropping corpus record: {reason}");
                dropped.push(DroppedRecord {
                    position,
                    id,
                    reason,
                });
            }
        }
    }

    if questions.is_empty() {
        return Err(CorpusError::Empty {
            dropped: dropped.len(),
        });
    }

    if !dropped.is_empty() {
        tracing::info!(
            kept = questions.len(),
            dropped = dropped.len(),
            "corpus parsed with skipped records"
        );
    }

    Ok(Corpus { questions, dropped })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn into_question(raw: RawQuestion) -> Result<Question, (Option<String>, String)> {
    let id = non_blank(raw.id.map(RawScalar::into_string));
    let fail = |reason: &str| Err((id.clone(), reason.to_string()));

    let Some(question_id) = id.clone() else {
        return fail("missing id");
    };
    let Some(subject) = non_blank(raw.subject) else {
        return fail("missing subject");
    };
    let Some(stem) = non_blank(raw.stem) else {
        return fail("missing stem");
    };

    let options: Vec<QuestionOption> = match raw.options {
        Some(RawOptions::List(list)) => list
            .into_iter()
            .map(|o| QuestionOption {
                key: o.key.trim().to_string(),
                text: o.text,
            })
            .collect(),
        Some(RawOptions::Map(map)) => map
            .into_iter()
            .map(|(key, text)| QuestionOption {
                key: key.trim().to_string(),
                text,
            })
            .collect(),
        None => return fail("missing options"),
    };

    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err((
            id,
            format!(
                "expected {MIN_OPTIONS}-{MAX_OPTIONS} options, found {}",
                options.len()
            ),
        ));
    }
    if options.iter().any(|o| o.key.is_empty()) {
        return fail("blank option key");
    }
    let mut keys = HashSet::new();
    if !options.iter().all(|o| keys.insert(o.key.as_str())) {
        return fail("duplicate option keys");
    }

    let answer = non_blank(raw.answer);
    if let Some(answer) = &answer {
        if !keys.contains(answer.as_str()) {
            return Err((id, format!("answer '{answer}' is not one of the options")));
        }
    }

    Ok(Question {
        id: question_id,
        subject,
        stem,
        options,
        answer,
        explanation: non_blank(raw.explanation),
        difficulty: non_blank(raw.difficulty.map(RawScalar::into_string)),
        weight: raw.weight,
    })
}

/// A warning from corpus validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a parsed corpus for quality issues that do not block loading.
pub fn validate_corpus(corpus: &Corpus) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for record in &corpus.dropped {
        warnings.push(ValidationWarning {
            question_id: record.id.clone(),
            message: format!("record #{} dropped: {}", record.position, record.reason),
        });
    }

    // Practice-only questions are legal but excluded from scoring
    for q in &corpus.questions {
        if !q.is_gradable() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "no answer key; question is practice-only".into(),
            });
        }
    }

    for q in &corpus.questions {
        if q.explanation.is_none() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "no explanation provided".into(),
            });
        }
    }

    // Same stem under different ids usually means a merge went wrong
    let mut stems: HashMap<String, &str> = HashMap::new();
    for q in &corpus.questions {
        let normalized: String = q
            .stem
            .split_whitespace()
            .collect::<String>()
            .to_lowercase();
        if let Some(first) = stems.get(&normalized) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("stem duplicates question {first}"),
            });
        } else {
            stems.insert(normalized, &q.id);
        }
    }

    warnings
}
