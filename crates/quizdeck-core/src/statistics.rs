//! Score and statistics derived from recorded answers.
//!
//! Everything here is a pure function of the answer records; nothing keeps
//! its own counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnswerRecord, Question};

/// Percentage score over gradable questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    /// Number of gradable questions.
    pub total: usize,
    pub percentage: u32,
}

/// `round(correct / total * 100)`, or 0 when nothing is gradable.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// Score a session.
///
/// Only questions with an answer key count towards `total`; unanswered
/// gradable questions count as not correct.
pub fn score<'a>(
    questions: impl IntoIterator<Item = &'a Question>,
    answers: &BTreeMap<String, AnswerRecord>,
) -> Score {
    score_by(
        questions
            .into_iter()
            .map(|q| (q.id.as_str(), q.is_gradable())),
        answers,
    )
}

/// [`score`] over `(question id, gradable)` pairs, for callers that hold
/// index entries rather than question bodies.
pub fn score_by<'a>(
    questions: impl IntoIterator<Item = (&'a str, bool)>,
    answers: &BTreeMap<String, AnswerRecord>,
) -> Score {
    let mut correct = 0;
    let mut total = 0;
    for (question_id, _) in questions.into_iter().filter(|(_, gradable)| *gradable) {
        total += 1;
        if answers
            .get(question_id)
            .is_some_and(|a| a.is_correct == Some(true))
        {
            correct += 1;
        }
    }
    Score {
        correct,
        total,
        percentage: percentage(correct, total),
    }
}

/// Per-subject breakdown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubjectStats {
    pub answered: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub ungraded: usize,
    /// `correct / (correct + incorrect)`, 0 when nothing was graded.
    pub accuracy: f64,
}

/// Aggregate statistics over a session's answers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub answered: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub ungraded: usize,
    /// Answers with no option selected (skips and timeouts).
    pub skipped: usize,
    pub accuracy: f64,
    /// Correct answers in a row at the end of the answer stream.
    pub current_streak: usize,
    pub max_streak: usize,
    pub average_time_ms: u64,
    pub total_time_ms: u64,
    pub by_subject: BTreeMap<String, SubjectStats>,
}

fn accuracy(correct: usize, incorrect: usize) -> f64 {
    let graded = correct + incorrect;
    if graded == 0 {
        0.0
    } else {
        correct as f64 / graded as f64
    }
}

/// Compute statistics from answer records.
///
/// Superseded records are ignored. Streaks follow answer order (`sequence`);
/// ungraded answers neither extend nor break a streak. `subject_of` maps a
/// question id to its subject for the breakdown.
pub fn compute_statistics<'a, F>(
    records: impl IntoIterator<Item = &'a AnswerRecord>,
    subject_of: F,
) -> Statistics
where
    F: Fn(&str) -> Option<String>,
{
    let mut records: Vec<&AnswerRecord> = records.into_iter().filter(|r| !r.superseded).collect();
    records.sort_by_key(|r| r.sequence);

    let mut stats = Statistics::default();
    let mut streak = 0;

    for record in &records {
        stats.answered += 1;
        stats.total_time_ms += record.time_spent_ms;
        if record.selected_option.is_none() {
            stats.skipped += 1;
        }

        let subject = subject_of(&record.question_id).unwrap_or_else(|| "unknown".into());
        let by_subject = stats.by_subject.entry(subject).or_default();
        by_subject.answered += 1;

        match record.is_correct {
            Some(true) => {
                stats.correct += 1;
                by_subject.correct += 1;
                streak += 1;
                stats.max_streak = stats.max_streak.max(streak);
            }
            Some(false) => {
                stats.incorrect += 1;
                by_subject.incorrect += 1;
                streak = 0;
            }
            None => {
                stats.ungraded += 1;
                by_subject.ungraded += 1;
            }
        }
    }

    stats.current_streak = streak;
    stats.accuracy = accuracy(stats.correct, stats.incorrect);
    if stats.answered > 0 {
        stats.average_time_ms = stats.total_time_ms / stats.answered as u64;
    }
    for subject in stats.by_subject.values_mut() {
        subject.accuracy = accuracy(subject.correct, subject.incorrect);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_now;
    use crate::fixtures::question;

    fn record(
        id: &str,
        selected: Option<&str>,
        is_correct: Option<bool>,
        seq: u64,
    ) -> AnswerRecord {
        AnswerRecord {
            question_id: id.into(),
            selected_option: selected.map(str::to_string),
            correct_option: None,
            is_correct,
            time_spent_ms: 1_000 * (seq + 1),
            timestamp: fixed_now(),
            sequence: seq,
            superseded: false,
        }
    }

    fn answers(records: Vec<AnswerRecord>) -> BTreeMap<String, AnswerRecord> {
        records
            .into_iter()
            .map(|r| (r.question_id.clone(), r))
            .collect()
    }

    #[test]
    fn percentage_rounds_and_handles_zero() {
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn three_question_scenario() {
        let questions = vec![
            question("q1", "carbon", Some("A")),
            question("q2", "carbon", Some("C")),
            question("q3", "carbon", Some("B")),
        ];
        let answers = answers(vec![
            record("q1", Some("A"), Some(true), 0),
            record("q2", Some("B"), Some(false), 1),
            record("q3", Some("B"), Some(true), 2),
        ]);
        assert_eq!(
            score(&questions, &answers),
            Score {
                correct: 2,
                total: 3,
                percentage: 67
            }
        );
    }

    #[test]
    fn ungraded_questions_are_outside_the_denominator() {
        let questions = vec![
            question("q1", "carbon", Some("A")),
            question("q2", "carbon", None),
        ];
        let answers = answers(vec![
            record("q1", Some("A"), Some(true), 0),
            record("q2", Some("D"), None, 1),
        ]);
        let s = score(&questions, &answers);
        assert_eq!(s.total, 1);
        assert_eq!(s.percentage, 100);
    }

    #[test]
    fn nothing_gradable_scores_zero() {
        let questions = vec![question("q1", "carbon", None), question("q2", "carbon", None)];
        let answers = answers(vec![record("q1", Some("A"), None, 0)]);
        let s = score(&questions, &answers);
        assert_eq!(s, Score::default());
    }

    #[test]
    fn score_by_index_flags_matches_score_by_bodies() {
        let answers = answers(vec![
            record("q1", Some("A"), Some(true), 0),
            record("q3", Some("C"), None, 1),
        ]);
        let flags = [("q1", true), ("q2", true), ("q3", false)];
        assert_eq!(
            score_by(flags, &answers),
            Score {
                correct: 1,
                total: 2,
                percentage: 50
            }
        );
    }

    #[test]
    fn unanswered_gradable_questions_count_against_score() {
        let questions = vec![
            question("q1", "carbon", Some("A")),
            question("q2", "carbon", Some("A")),
        ];
        let answers = answers(vec![record("q1", Some("A"), Some(true), 0)]);
        assert_eq!(score(&questions, &answers).percentage, 50);
    }

    #[test]
    fn streaks_follow_sequence_and_skip_ungraded() {
        // Passed out of order on purpose
        let records = vec![
            record("q4", Some("A"), Some(true), 4),
            record("q1", Some("A"), Some(true), 0),
            record("q3", Some("A"), None, 3),
            record("q2", Some("B"), Some(true), 1),
            record("q5", None, Some(false), 5),
            record("q6", Some("A"), Some(true), 6),
            record("q2b", Some("A"), Some(true), 2),
        ];
        let stats = compute_statistics(&records, |_| Some("carbon".into()));
        assert_eq!(stats.max_streak, 4);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.answered, 7);
        assert_eq!(stats.correct, 5);
        assert_eq!(stats.incorrect, 1);
        assert_eq!(stats.ungraded, 1);
        assert_eq!(stats.skipped, 1);
        assert!((stats.accuracy - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn superseded_records_are_ignored() {
        let mut first = record("q1", Some("B"), Some(false), 0);
        first.superseded = true;
        let second = record("q1", Some("A"), Some(true), 1);
        let stats = compute_statistics(&[first, second], |_| None);
        assert_eq!(stats.answered, 1);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.incorrect, 0);
        assert_eq!(stats.by_subject["unknown"].answered, 1);
    }

    #[test]
    fn time_and_subject_breakdown() {
        let records = vec![
            record("c1", Some("A"), Some(true), 0),
            record("p1", Some("B"), Some(false), 1),
            record("p2", Some("A"), Some(true), 2),
        ];
        let stats = compute_statistics(&records, |id| {
            Some(if id.starts_with('c') { "carbon" } else { "policy" }.to_string())
        });
        assert_eq!(stats.total_time_ms, 6_000);
        assert_eq!(stats.average_time_ms, 2_000);
        assert_eq!(stats.by_subject["carbon"].accuracy, 1.0);
        assert_eq!(stats.by_subject["policy"].answered, 2);
        assert_eq!(stats.by_subject["policy"].accuracy, 0.5);
    }

    #[test]
    fn empty_answers_give_zeroes() {
        let stats = compute_statistics(std::iter::empty(), |_| None);
        assert_eq!(stats, Statistics::default());
    }
}
