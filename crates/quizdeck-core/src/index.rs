//! Lightweight question index.
//!
//! Built once from the full corpus; keeps only `{id, subject, chunk}` and
//! whether the question has an answer key, so subject filtering and scoring
//! never have to touch question bodies.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::model::{ChunkId, Question};
use crate::parser::{parse_corpus_str, Corpus};
use crate::traits::CorpusSource;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Stable mapping from question id to chunk.
///
/// Membership depends only on the id and the partition count, never on the
/// order questions appear in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioner {
    partitions: u32,
}

impl Partitioner {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    /// Partition count for a corpus: `ceil(len / chunk_size)`, at least 1.
    pub fn for_corpus(len: usize, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let partitions = len.div_ceil(chunk_size);
        Self::new(u32::try_from(partitions).unwrap_or(u32::MAX))
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn chunk_of(&self, question_id: &str) -> ChunkId {
        let slot = fnv1a64(question_id.as_bytes()) % u64::from(self.partitions);
        // slot < partitions, which is a u32
        ChunkId(slot as u32)
    }

    pub fn contains(&self, chunk_id: ChunkId) -> bool {
        chunk_id.0 < self.partitions
    }
}

/// Index metadata for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub subject: String,
    pub chunk_id: ChunkId,
    /// The question has an answer key.
    #[serde(default)]
    pub gradable: bool,
}

/// Per-subject question count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectCount {
    pub subject: String,
    pub questions: usize,
}

/// The question index.
#[derive(Debug, Clone)]
pub struct QuestionIndex {
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
    partitioner: Partitioner,
}

impl QuestionIndex {
    /// Project questions onto index entries. Corpus order is preserved.
    pub fn build(questions: &[Question], chunk_size: usize) -> Self {
        let partitioner = Partitioner::for_corpus(questions.len(), chunk_size);
        let entries: Vec<IndexEntry> = questions
            .iter()
            .map(|q| IndexEntry {
                id: q.id.clone(),
                subject: q.subject.clone(),
                chunk_id: partitioner.chunk_of(&q.id),
                gradable: q.is_gradable(),
            })
            .collect();
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        Self {
            entries,
            positions,
            partitioner,
        }
    }

    pub fn from_corpus(corpus: &Corpus, chunk_size: usize) -> Self {
        Self::build(&corpus.questions, chunk_size)
    }

    /// Read the whole corpus from `source` and index it.
    #[tracing::instrument(skip(source), fields(source = source.name()))]
    pub async fn load(source: &dyn CorpusSource, chunk_size: usize) -> Result<Self, CacheError> {
        let raw = source.fetch().await.map_err(|e| CacheError::Source {
            source_name: source.name().to_string(),
            reason: format!("{e:#}"),
        })?;
        let corpus = parse_corpus_str(&raw)?;
        let index = Self::from_corpus(&corpus, chunk_size);
        tracing::info!(
            questions = index.len(),
            partitions = index.partitioner.partitions(),
            "question index built"
        );
        Ok(index)
    }

    /// Ids of all questions in `subject` (or all questions), in corpus order.
    pub fn filter_by_subject(&self, subject: Option<&str>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| subject.is_none_or(|s| e.subject == s))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Subjects in order of first appearance, with question counts.
    pub fn subjects(&self) -> Vec<SubjectCount> {
        let mut counts: Vec<SubjectCount> = Vec::new();
        for entry in &self.entries {
            match counts.iter_mut().find(|c| c.subject == entry.subject) {
                Some(count) => count.questions += 1,
                None => counts.push(SubjectCount {
                    subject: entry.subject.clone(),
                    questions: 1,
                }),
            }
        }
        counts
    }

    /// Distinct chunk ids that hold at least one question, ascending.
    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.entries
            .iter()
            .map(|e| e.chunk_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn entry(&self, question_id: &str) -> Option<&IndexEntry> {
        self.positions.get(question_id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.positions.contains_key(question_id)
    }

    pub fn chunk_of(&self, question_id: &str) -> Option<ChunkId> {
        self.entry(question_id).map(|e| e.chunk_id)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{corpus_json, question};
    use crate::traits::StaticCorpus;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn partition_count_rounds_up() {
        assert_eq!(Partitioner::for_corpus(0, 50).partitions(), 1);
        assert_eq!(Partitioner::for_corpus(50, 50).partitions(), 1);
        assert_eq!(Partitioner::for_corpus(51, 50).partitions(), 2);
        assert_eq!(Partitioner::for_corpus(719, 50).partitions(), 15);
        assert_eq!(Partitioner::for_corpus(10, 0).partitions(), 10);
    }

    #[test]
    fn membership_ignores_corpus_order() {
        let mut questions: Vec<Question> = (0..120)
            .map(|i| question(&format!("id-{i}"), "carbon", Some("A")))
            .collect();
        let forward = QuestionIndex::build(&questions, 25);
        questions.reverse();
        let backward = QuestionIndex::build(&questions, 25);

        for entry in forward.entries() {
            assert_eq!(backward.chunk_of(&entry.id), Some(entry.chunk_id));
            assert!(entry.chunk_id.0 < 5);
        }
    }

    #[test]
    fn filter_by_subject_keeps_corpus_order() {
        let questions = vec![
            question("q1", "carbon", Some("A")),
            question("q2", "policy", Some("A")),
            question("q3", "carbon", None),
        ];
        let index = QuestionIndex::build(&questions, 50);
        assert_eq!(index.filter_by_subject(Some("carbon")), vec!["q1", "q3"]);
        assert_eq!(index.filter_by_subject(None), vec!["q1", "q2", "q3"]);
        assert!(index.filter_by_subject(Some("finance")).is_empty());
        assert!(index.entry("q1").unwrap().gradable);
        assert!(!index.entry("q3").unwrap().gradable);
    }

    #[test]
    fn subjects_in_first_appearance_order() {
        let questions = vec![
            question("q1", "policy", Some("A")),
            question("q2", "carbon", Some("A")),
            question("q3", "policy", Some("A")),
        ];
        let subjects = QuestionIndex::build(&questions, 50).subjects();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].subject, "policy");
        assert_eq!(subjects[0].questions, 2);
        assert_eq!(subjects[1].subject, "carbon");
    }

    #[tokio::test]
    async fn load_from_source() {
        let source = StaticCorpus::new("inline", corpus_json(12));
        let index = QuestionIndex::load(&source, 5).await.unwrap();
        assert_eq!(index.len(), 12);
        assert_eq!(index.partitioner().partitions(), 3);
        assert!(index.contains("q011"));
        assert_eq!(index.filter_by_subject(Some("carbon")).len(), 6);
    }

    #[tokio::test]
    async fn load_rejects_empty_corpus() {
        let source = StaticCorpus::new("inline", "[]");
        let err = QuestionIndex::load(&source, 5).await.unwrap_err();
        assert!(matches!(err, CacheError::Corpus(_)));
    }
}
