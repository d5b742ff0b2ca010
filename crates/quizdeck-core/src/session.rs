//! Quiz session state and its transition function.
//!
//! [`transition`] is pure: it takes the current state, an event, the loaded
//! questions and the current time, and returns the next state. Side effects
//! (persistence, timers, preloading) belong to the engine.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, SessionError};
use crate::index::{fnv1a64, QuestionIndex};
use crate::model::{AnswerRecord, Phase, Question, QuestionOption, SessionConfig};

/// Everything the engine knows about a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub config: SessionConfig,
    pub question_ids: Vec<String>,
    pub current_index: usize,
    /// Latest answer per question.
    pub answers: BTreeMap<String, AnswerRecord>,
    /// Every answer ever recorded, in order, including superseded ones.
    pub history: Vec<AnswerRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub question_started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_elapsed_ms: u64,
    pub phase: Phase,
    pub next_sequence: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: Uuid::nil(),
            config: SessionConfig::default(),
            question_ids: Vec::new(),
            current_index: 0,
            answers: BTreeMap::new(),
            history: Vec::new(),
            started_at: None,
            question_started_at: None,
            finished_at: None,
            total_elapsed_ms: 0,
            phase: Phase::Idle,
            next_sequence: 0,
        }
    }
}

impl SessionState {
    pub fn current_question_id(&self) -> Option<&str> {
        if self.phase == Phase::Idle {
            return None;
        }
        self.question_ids.get(self.current_index).map(String::as_str)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn answer_for(&self, question_id: &str) -> Option<&AnswerRecord> {
        self.answers.get(question_id)
    }

    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.question_ids.len()
    }

    /// `(answered, total)` question counts.
    pub fn progress(&self) -> (usize, usize) {
        (self.answers.len(), self.question_ids.len())
    }

    /// Index `direction` moves the pointer to, or `None` when it stays put.
    pub fn target_index(&self, direction: Direction) -> Option<usize> {
        let target = match direction {
            Direction::Next => self.current_index.checked_add(1),
            Direction::Previous => self.current_index.checked_sub(1),
            Direction::Goto(index) => Some(index),
        }?;
        (target < self.question_ids.len() && target != self.current_index).then_some(target)
    }

    /// Phase for a running session pointing at `index`.
    fn running_phase_at(&self, index: usize) -> Phase {
        match self.question_ids.get(index) {
            Some(id) if self.is_answered(id) => Phase::Answered,
            _ => Phase::Active,
        }
    }
}

/// Where `advance` moves the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
    Goto(usize),
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start {
        session_id: Uuid,
        config: SessionConfig,
        question_ids: Vec<String>,
    },
    Answer {
        option: Option<String>,
    },
    Advance(Direction),
    /// The current question's countdown ran out.
    Timeout,
    Finish,
    Review,
    ExitReview,
    Reset,
}

/// Question bodies loaded for a session, by id.
///
/// Holds the questions around the pointer, not necessarily the whole session.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    questions: HashMap<String, Question>,
}

impl QuestionSet {
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        Self {
            questions: questions.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.questions.get(question_id)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.questions.contains_key(question_id)
    }


    /// Options of a question in presentation order.
    pub fn options_in_order<'a>(
        &'a self,
        question_id: &str,
        state: &SessionState,
    ) -> Vec<&'a QuestionOption> {
        let Some(question) = self.get(question_id) else {
            return Vec::new();
        };
        if !state.config.shuffle_options {
            return question.options.iter().collect();
        }
        shuffled_option_keys(question, state.config.seed.unwrap_or_default())
            .iter()
            .filter_map(|k| question.option(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Pick the ids for a new session: subject filter, optional shuffle, then
/// truncation to `question_count`.
pub fn resolve_question_ids<R: Rng + ?Sized>(
    index: &QuestionIndex,
    config: &SessionConfig,
    rng: &mut R,
) -> Result<Vec<String>, ConfigError> {
    validate_config(config)?;

    let mut ids = index.filter_by_subject(config.subject.as_deref());
    if ids.is_empty() {
        return Err(ConfigError::UnknownSubject(
            config.subject.clone().unwrap_or_default(),
        ));
    }
    if config.shuffle_questions {
        ids.shuffle(rng);
    }
    ids.truncate(config.question_count);
    Ok(ids)
}

/// Option keys of `question` in shuffled order.
///
/// Depends only on the session seed and the question id, so a question shows
/// the same order every time it is loaded.
pub fn shuffled_option_keys(question: &Question, seed: u64) -> Vec<String> {
    let mut keys: Vec<String> = question.options.iter().map(|o| o.key.clone()).collect();
    let mut rng = StdRng::seed_from_u64(seed ^ fnv1a64(question.id.as_bytes()));
    keys.shuffle(&mut rng);
    keys
}

fn validate_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.question_count < 1 {
        return Err(ConfigError::QuestionCount(config.question_count));
    }
    if config.timer_enabled && config.time_per_question_secs == 0 {
        return Err(ConfigError::TimeLimit);
    }
    Ok(())
}

fn elapsed_ms(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    since
        .map(|t| (now - t).num_milliseconds().max(0) as u64)
        .unwrap_or(0)
}

fn invalid(operation: &'static str, phase: Phase) -> SessionError {
    SessionError::InvalidPhase { operation, phase }
}

/// Apply one event to a session.
pub fn transition(
    state: &SessionState,
    event: SessionEvent,
    questions: &QuestionSet,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    match event {
        SessionEvent::Start {
            session_id,
            config,
            question_ids,
        } => start(state, session_id, config, question_ids, questions, now),
        SessionEvent::Answer { option } => answer(state, option, questions, now),
        SessionEvent::Advance(direction) => advance(state, direction, now),
        SessionEvent::Timeout => timeout(state, questions, now),
        SessionEvent::Finish => finish(state, now),
        SessionEvent::Review => match state.phase {
            Phase::Completed => Ok(SessionState {
                phase: Phase::Review,
                current_index: 0,
                ..state.clone()
            }),
            Phase::Review => Ok(state.clone()),
            phase => Err(invalid("review", phase)),
        },
        SessionEvent::ExitReview => match state.phase {
            Phase::Review => Ok(SessionState {
                phase: Phase::Completed,
                ..state.clone()
            }),
            Phase::Completed => Ok(state.clone()),
            phase => Err(invalid("exit review", phase)),
        },
        SessionEvent::Reset => Ok(SessionState::default()),
    }
}

fn start(
    state: &SessionState,
    session_id: Uuid,
    config: SessionConfig,
    question_ids: Vec<String>,
    questions: &QuestionSet,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    if state.phase != Phase::Idle {
        return Err(invalid("start", state.phase));
    }
    validate_config(&config)?;
    if question_ids.is_empty() {
        return Err(ConfigError::UnknownSubject(config.subject.clone().unwrap_or_default()).into());
    }
    // Later questions are loaded as the pointer reaches them
    if let Some(first) = question_ids.first().filter(|id| !questions.contains(id)) {
        return Err(SessionError::MissingQuestion(first.clone()));
    }

    Ok(SessionState {
        session_id,
        config,
        question_ids,
        current_index: 0,
        answers: BTreeMap::new(),
        history: Vec::new(),
        started_at: Some(now),
        question_started_at: Some(now),
        finished_at: None,
        total_elapsed_ms: 0,
        phase: Phase::Active,
        next_sequence: 0,
    })
}

fn answer(
    state: &SessionState,
    option: Option<String>,
    questions: &QuestionSet,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    if !state.phase.accepts_answers() {
        return Err(invalid("submit an answer", state.phase));
    }
    let Some(question_id) = state.current_question_id() else {
        return Err(invalid("submit an answer", state.phase));
    };
    let question = questions
        .get(question_id)
        .ok_or_else(|| SessionError::MissingQuestion(question_id.to_string()))?;

    let previous = state.answers.get(question_id);
    if previous.is_some() && !state.config.allow_answer_change {
        return Err(SessionError::AlreadyAnswered(question_id.to_string()));
    }

    let record = AnswerRecord::grade(
        question,
        option.as_deref(),
        elapsed_ms(state.question_started_at, now),
        now,
        state.next_sequence,
    );

    let mut next = state.clone();
    if let Some(previous) = previous {
        if let Some(old) = next
            .history
            .iter_mut()
            .find(|r| r.sequence == previous.sequence)
        {
            old.superseded = true;
        }
    }
    next.history.push(record.clone());
    next.answers.insert(question.id.clone(), record);
    next.next_sequence += 1;
    next.total_elapsed_ms = elapsed_ms(state.started_at, now);
    next.phase = Phase::Answered;
    Ok(next)
}

fn advance(
    state: &SessionState,
    direction: Direction,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    if matches!(state.phase, Phase::Idle | Phase::Completed) {
        return Err(invalid("move between questions", state.phase));
    }

    let Some(target) = state.target_index(direction) else {
        return Ok(state.clone());
    };

    let mut next = state.clone();
    next.current_index = target;
    if state.phase.is_running() {
        next.phase = state.running_phase_at(target);
        next.question_started_at = Some(now);
        next.total_elapsed_ms = elapsed_ms(state.started_at, now);
    }
    Ok(next)
}

fn timeout(
    state: &SessionState,
    questions: &QuestionSet,
    now: DateTime<Utc>,
) -> Result<SessionState, SessionError> {
    // A countdown can only matter while the session is running
    if !state.phase.is_running() {
        return Ok(state.clone());
    }

    let answered = match state.current_question_id() {
        Some(id) if !state.is_answered(id) => answer(state, None, questions, now)?,
        _ => state.clone(),
    };

    if answered.is_last() {
        finish(&answered, now)
    } else {
        advance(&answered, Direction::Next, now)
    }
}

fn finish(state: &SessionState, now: DateTime<Utc>) -> Result<SessionState, SessionError> {
    match state.phase {
        Phase::Active | Phase::Answered => Ok(SessionState {
            phase: Phase::Completed,
            finished_at: Some(now),
            total_elapsed_ms: elapsed_ms(state.started_at, now),
            ..state.clone()
        }),
        Phase::Completed | Phase::Review => Ok(state.clone()),
        Phase::Idle => Err(invalid("finish", state.phase)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::fixed_now;
    use crate::fixtures::question;

    fn questions() -> QuestionSet {
        QuestionSet::new(vec![
            question("q1", "carbon", Some("A")),
            question("q2", "carbon", Some("C")),
            question("q3", "policy", None),
        ])
    }

    fn started(config: SessionConfig) -> SessionState {
        let event = SessionEvent::Start {
            session_id: Uuid::new_v4(),
            config,
            question_ids: vec!["q1".into(), "q2".into(), "q3".into()],
        };
        transition(&SessionState::default(), event, &questions(), fixed_now()).unwrap()
    }

    fn apply(state: &SessionState, event: SessionEvent) -> Result<SessionState, SessionError> {
        transition(state, event, &questions(), fixed_now() + Duration::seconds(5))
    }

    fn answer_with(option: &str) -> SessionEvent {
        SessionEvent::Answer {
            option: Some(option.into()),
        }
    }

    #[test]
    fn start_enters_active_at_first_question() {
        let state = started(SessionConfig::default());
        assert_eq!(state.phase, Phase::Active);
        assert_eq!(state.current_question_id(), Some("q1"));
        assert_eq!(state.started_at, Some(fixed_now()));
    }

    #[test]
    fn start_requires_idle() {
        let state = started(SessionConfig::default());
        let again = SessionEvent::Start {
            session_id: Uuid::new_v4(),
            config: SessionConfig::default(),
            question_ids: vec!["q1".into()],
        };
        let err = apply(&state, again).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { operation: "start", .. }));
    }

    #[test]
    fn start_rejects_bad_config() {
        let event = |config, ids: Vec<String>| SessionEvent::Start {
            session_id: Uuid::new_v4(),
            config,
            question_ids: ids,
        };
        let idle = SessionState::default();

        let zero = SessionConfig {
            question_count: 0,
            ..SessionConfig::default()
        };
        let err = apply(&idle, event(zero, vec!["q1".into()])).unwrap_err();
        assert_eq!(err, SessionError::Config(ConfigError::QuestionCount(0)));

        let nothing = SessionConfig {
            subject: Some("finance".into()),
            ..SessionConfig::default()
        };
        let err = apply(&idle, event(nothing, vec![])).unwrap_err();
        assert_eq!(
            err,
            SessionError::Config(ConfigError::UnknownSubject("finance".into()))
        );

        let err = apply(&idle, event(SessionConfig::default(), vec!["zz".into()])).unwrap_err();
        assert_eq!(err, SessionError::MissingQuestion("zz".into()));
    }

    #[test]
    fn answer_records_and_moves_to_answered() {
        let state = apply(&started(SessionConfig::default()), answer_with("A")).unwrap();
        assert_eq!(state.phase, Phase::Answered);
        let record = state.answer_for("q1").unwrap();
        assert_eq!(record.is_correct, Some(true));
        assert_eq!(record.time_spent_ms, 5_000);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn second_answer_is_rejected_by_default() {
        let state = apply(&started(SessionConfig::default()), answer_with("A")).unwrap();
        let err = apply(&state, answer_with("B")).unwrap_err();
        assert_eq!(err, SessionError::AlreadyAnswered("q1".into()));
    }

    #[test]
    fn answer_change_supersedes_previous_record() {
        let config = SessionConfig {
            allow_answer_change: true,
            ..SessionConfig::default()
        };
        let state = apply(&started(config), answer_with("B")).unwrap();
        let state = apply(&state, answer_with("A")).unwrap();

        assert_eq!(state.history.len(), 2);
        assert!(state.history[0].superseded);
        assert!(!state.history[1].superseded);
        assert_eq!(state.answer_for("q1").unwrap().selected_option.as_deref(), Some("A"));
        assert_eq!(state.answer_for("q1").unwrap().sequence, 1);
    }

    #[test]
    fn null_and_unknown_options_are_recorded() {
        let skip = SessionEvent::Answer { option: None };
        let state = apply(&started(SessionConfig::default()), skip).unwrap();
        assert_eq!(state.answer_for("q1").unwrap().is_correct, Some(false));

        let state = apply(&state, SessionEvent::Advance(Direction::Next)).unwrap();
        let state = apply(&state, answer_with("Z")).unwrap();
        let record = state.answer_for("q2").unwrap();
        assert_eq!(record.selected_option.as_deref(), Some("Z"));
        assert_eq!(record.is_correct, Some(false));
    }

    #[test]
    fn answers_rejected_outside_running_phases() {
        let err = apply(&SessionState::default(), answer_with("A")).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { phase: Phase::Idle, .. }));

        let done = apply(&started(SessionConfig::default()), SessionEvent::Finish).unwrap();
        let err = apply(&done, answer_with("A")).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { phase: Phase::Completed, .. }));

        let review = apply(&done, SessionEvent::Review).unwrap();
        assert!(apply(&review, answer_with("A")).is_err());
    }

    #[test]
    fn advance_within_bounds_only() {
        let state = started(SessionConfig::default());
        let back = apply(&state, SessionEvent::Advance(Direction::Previous)).unwrap();
        assert_eq!(back, state);

        let last = apply(&state, SessionEvent::Advance(Direction::Goto(2))).unwrap();
        assert_eq!(last.current_index, 2);
        let past = apply(&last, SessionEvent::Advance(Direction::Next)).unwrap();
        assert_eq!(past, last);

        let far = apply(&state, SessionEvent::Advance(Direction::Goto(9))).unwrap();
        assert_eq!(far, state);
    }

    #[test]
    fn advance_onto_answered_question_is_answered_phase() {
        let state = apply(&started(SessionConfig::default()), answer_with("A")).unwrap();
        let next = apply(&state, SessionEvent::Advance(Direction::Next)).unwrap();
        assert_eq!(next.phase, Phase::Active);
        let back = apply(&next, SessionEvent::Advance(Direction::Previous)).unwrap();
        assert_eq!(back.phase, Phase::Answered);
    }

    #[test]
    fn advance_in_review_moves_pointer_only() {
        let done = apply(&started(SessionConfig::default()), SessionEvent::Finish).unwrap();
        let review = apply(&done, SessionEvent::Review).unwrap();
        let moved = apply(&review, SessionEvent::Advance(Direction::Next)).unwrap();
        assert_eq!(moved.phase, Phase::Review);
        assert_eq!(moved.current_index, 1);
        assert_eq!(moved.answers, review.answers);

        let err = apply(&done, SessionEvent::Advance(Direction::Next)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { .. }));
    }

    #[test]
    fn timeout_records_null_answer_and_advances_once() {
        let state = started(SessionConfig::default());
        let next = apply(&state, SessionEvent::Timeout).unwrap();
        assert_eq!(next.current_index, 1);
        assert_eq!(next.phase, Phase::Active);
        let record = next.answer_for("q1").unwrap();
        assert_eq!(record.selected_option, None);
        assert_eq!(record.is_correct, Some(false));
        assert_eq!(next.history.len(), 1);
    }

    #[test]
    fn timeout_on_last_question_finishes() {
        let state = started(SessionConfig::default());
        let last = apply(&state, SessionEvent::Advance(Direction::Goto(2))).unwrap();
        let done = apply(&last, SessionEvent::Timeout).unwrap();
        assert_eq!(done.phase, Phase::Completed);
        assert_eq!(done.answer_for("q3").unwrap().is_correct, None);
    }

    #[test]
    fn timeout_after_finish_is_ignored() {
        let done = apply(&started(SessionConfig::default()), SessionEvent::Finish).unwrap();
        assert_eq!(apply(&done, SessionEvent::Timeout).unwrap(), done);
    }

    #[test]
    fn finish_is_idempotent() {
        let done = apply(&started(SessionConfig::default()), SessionEvent::Finish).unwrap();
        assert_eq!(done.phase, Phase::Completed);
        assert_eq!(done.total_elapsed_ms, 5_000);

        let an_hour_later = fixed_now() + Duration::hours(1);
        let later = transition(&done, SessionEvent::Finish, &questions(), an_hour_later).unwrap();
        assert_eq!(later, done);

        let review = apply(&done, SessionEvent::Review).unwrap();
        assert_eq!(apply(&review, SessionEvent::Finish).unwrap(), review);
    }

    #[test]
    fn review_round_trip_keeps_answers() {
        let answered = apply(&started(SessionConfig::default()), answer_with("A")).unwrap();
        let done = apply(&answered, SessionEvent::Finish).unwrap();
        let review = apply(&done, SessionEvent::Review).unwrap();
        assert_eq!(review.phase, Phase::Review);
        let back = apply(&review, SessionEvent::ExitReview).unwrap();
        assert_eq!(back.phase, Phase::Completed);
        assert_eq!(back.answers, answered.answers);

        let err = apply(&answered, SessionEvent::Review).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { operation: "review", .. }));
    }

    #[test]
    fn reset_from_any_phase() {
        let answered = apply(&started(SessionConfig::default()), answer_with("A")).unwrap();
        assert_eq!(apply(&answered, SessionEvent::Reset).unwrap(), SessionState::default());
    }

    #[test]
    fn resolve_limits_filters_and_shuffles_deterministically() {
        let corpus: Vec<Question> = (0..20)
            .map(|i| {
                let subject = if i < 12 { "carbon" } else { "policy" };
                question(&format!("q{i:02}"), subject, Some("A"))
            })
            .collect();
        let index = QuestionIndex::build(&corpus, 5);

        let config = SessionConfig {
            subject: Some("policy".into()),
            question_count: 50,
            ..SessionConfig::default()
        };
        let ids = resolve_question_ids(&index, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(ids.len(), 8);

        let config = SessionConfig {
            question_count: 5,
            shuffle_questions: true,
            ..SessionConfig::default()
        };
        let a = resolve_question_ids(&index, &config, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = resolve_question_ids(&index, &config, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);

        let config = SessionConfig {
            subject: Some("finance".into()),
            ..SessionConfig::default()
        };
        let err = resolve_question_ids(&index, &config, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, ConfigError::UnknownSubject("finance".into()));
    }

    #[test]
    fn shuffled_option_order_is_a_stable_permutation() {
        let set = questions();
        let q1 = set.get("q1").unwrap();
        let order = shuffled_option_keys(q1, 3);
        let mut keys = order.clone();
        keys.sort();
        assert_eq!(keys, vec!["A", "B", "C", "D"]);
        assert_eq!(shuffled_option_keys(q1, 3), order);

        let config = SessionConfig {
            shuffle_options: true,
            seed: Some(3),
            ..SessionConfig::default()
        };
        let presented: Vec<&str> = set
            .options_in_order("q1", &started(config))
            .iter()
            .map(|o| o.key.as_str())
            .collect();
        assert_eq!(presented, order);

        let plain: Vec<&str> = set
            .options_in_order("q1", &started(SessionConfig::default()))
            .iter()
            .map(|o| o.key.as_str())
            .collect();
        assert_eq!(plain, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn start_needs_only_the_first_question_loaded() {
        let first_only = QuestionSet::new(vec![question("q1", "carbon", Some("A"))]);
        let event = SessionEvent::Start {
            session_id: Uuid::new_v4(),
            config: SessionConfig::default(),
            question_ids: vec!["q1".into(), "q2".into(), "q3".into()],
        };
        let state = transition(&SessionState::default(), event, &first_only, fixed_now()).unwrap();
        assert_eq!(state.question_ids.len(), 3);

        // Answering a question that is not loaded is refused
        let moved = transition(
            &state,
            SessionEvent::Advance(Direction::Next),
            &first_only,
            fixed_now(),
        )
        .unwrap();
        let err = transition(&moved, answer_with("A"), &first_only, fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::MissingQuestion("q2".into()));
    }

    #[test]
    fn target_index_ignores_moves_that_stay_put() {
        let state = started(SessionConfig::default());
        assert_eq!(state.target_index(Direction::Next), Some(1));
        assert_eq!(state.target_index(Direction::Previous), None);
        assert_eq!(state.target_index(Direction::Goto(0)), None);
        assert_eq!(state.target_index(Direction::Goto(2)), Some(2));
        assert_eq!(state.target_index(Direction::Goto(3)), None);
    }
}
