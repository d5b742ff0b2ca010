//! Error types for the cache and session layers.
//!
//! Each concern gets its own enum so callers can decide what is recoverable:
//! storage errors are absorbed by the cache manager, configuration errors are
//! returned to the caller of `start`, and corpus errors are fatal only when
//! nothing usable survives parsing.

use thiserror::Error;

use crate::model::Phase;

/// Errors raised while reading a question corpus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorpusError {
    /// The source is not a well-formed list of question-like records.
    #[error("failed to parse corpus: {0}")]
    Parse(String),

    /// Every record was dropped as malformed.
    #[error("corpus contains no usable questions ({dropped} records dropped)")]
    Empty { dropped: usize },
}

/// Invalid session configuration passed to `start`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("question count must be at least 1, got {0}")]
    QuestionCount(usize),

    #[error("no questions match subject '{0}'")]
    UnknownSubject(String),

    #[error("time per question must be at least 1 second when the timer is enabled")]
    TimeLimit,
}

/// Failures of the durable key-value tiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backing store refused the write for lack of space.
    #[error("storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to (de)serialize '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

impl StorageError {
    /// Returns `true` for failures that freeing space could resolve.
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Errors surfaced by the chunk cache manager.
///
/// Storage problems never appear here: the manager falls back to recomputing
/// from the corpus instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("corpus source '{source_name}' unavailable: {reason}")]
    Source { source_name: String, reason: String },

    #[error("chunk {chunk_id} is outside the {partitions} known partitions")]
    UnknownChunk { chunk_id: String, partitions: u32 },

    #[error("question '{0}' not found in corpus")]
    UnknownQuestion(String),
}

/// Errors returned by session engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot {operation} while session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("question '{0}' has already been answered")]
    AlreadyAnswered(String),

    #[error("question '{0}' is not loaded in this session")]
    MissingQuestion(String),

    #[error("no saved session to resume")]
    NoSnapshot,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
