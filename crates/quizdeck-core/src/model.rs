//! Core data model types for quizdeck.
//!
//! These are the fundamental types that the entire quizdeck system uses to
//! represent questions, cached chunks, recorded answers, and session settings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of options a question must offer.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of options a question may offer.
pub const MAX_OPTIONS: usize = 6;

/// One selectable option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Option key (e.g. "A").
    pub key: String,
    /// Option text shown to the user.
    pub text: String,
}

/// A single exam question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier.
    pub id: String,
    /// Exam subject the question belongs to.
    pub subject: String,
    /// The question text.
    pub stem: String,
    /// Ordered options, 2 to 6 entries with unique keys.
    pub options: Vec<QuestionOption>,
    /// Key of the correct option. `None` marks a practice-only question.
    #[serde(default)]
    pub answer: Option<String>,
    /// Explanation of the correct answer.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Free-form difficulty label.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Relative weight of the question.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Question {
    /// Whether this question has an answer key and counts towards the score.
    pub fn is_gradable(&self) -> bool {
        self.answer.is_some()
    }

    /// Look up an option by key.
    pub fn option(&self, key: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.key == key)
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.option(key).is_some()
    }
}

/// Identifier of a chunk, i.e. a partition number of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for ChunkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ChunkId)
            .map_err(|_| format!("invalid chunk id: {s}"))
    }
}

/// A group of questions from one partition, cached as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub questions: Vec<Question>,
    /// When this copy of the chunk was produced or written.
    pub cached_at: DateTime<Utc>,
}

impl Chunk {
    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// One recorded attempt at a question.
///
/// Records are append-only. Re-answering a question produces a new record and
/// flags the previous one as superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    /// Option the user picked; `None` for a skipped or timed-out question.
    pub selected_option: Option<String>,
    /// Answer key at the time of grading.
    pub correct_option: Option<String>,
    /// `None` when the question is ungraded.
    pub is_correct: Option<bool>,
    pub time_spent_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Position in the session's answer stream.
    pub sequence: u64,
    #[serde(default)]
    pub superseded: bool,
}

impl AnswerRecord {
    /// Grade a selection against a question.
    ///
    /// A `None` selection or a key the question does not offer is recorded as
    /// incorrect (or ungraded when the question has no answer key).
    pub fn grade(
        question: &Question,
        selected: Option<&str>,
        time_spent_ms: u64,
        timestamp: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        let is_correct = question
            .answer
            .as_deref()
            .map(|answer| selected == Some(answer));
        Self {
            question_id: question.id.clone(),
            selected_option: selected.map(str::to_string),
            correct_option: question.answer.clone(),
            is_correct,
            time_spent_ms,
            timestamp,
            sequence,
            superseded: false,
        }
    }

    pub fn is_gradable(&self) -> bool {
        self.is_correct.is_some()
    }
}

/// Phases of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Active,
    Answered,
    Completed,
    Review,
}

impl Phase {
    /// Whether answers may be submitted in this phase.
    pub fn accepts_answers(self) -> bool {
        matches!(self, Phase::Active | Phase::Answered)
    }

    /// Whether the session has been started and not yet finished.
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Active | Phase::Answered)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Active => write!(f, "active"),
            Phase::Answered => write!(f, "answered"),
            Phase::Completed => write!(f, "completed"),
            Phase::Review => write!(f, "review"),
        }
    }
}

/// Settings a session is started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Restrict questions to one subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// Maximum number of questions in the session.
    #[serde(default = "default_question_count")]
    pub question_count: usize,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    /// Per-question countdown in seconds.
    #[serde(default = "default_time_per_question")]
    pub time_per_question_secs: u32,
    #[serde(default)]
    pub timer_enabled: bool,
    /// Allow re-answering a question; the earlier record is superseded.
    #[serde(default)]
    pub allow_answer_change: bool,
    /// Seed for question/option shuffling. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_question_count() -> usize {
    50
}

fn default_time_per_question() -> u32 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subject: None,
            question_count: default_question_count(),
            shuffle_questions: false,
            shuffle_options: false,
            time_per_question_secs: default_time_per_question(),
            timer_enabled: false,
            allow_answer_change: false,
            seed: None,
        }
    }
}
