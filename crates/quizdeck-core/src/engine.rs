//! Quiz session engine.
//!
//! Owns the session state and drives it through [`transition`]. Question
//! bodies are loaded a chunk at a time as the pointer moves. After each
//! committed transition the engine syncs the question timer, persists the
//! session snapshot, and warms the chunk of the next question not yet loaded.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::cache::ChunkCacheManager;
use crate::clock::Clock;
use crate::error::SessionError;
use crate::index::QuestionIndex;
use crate::model::{AnswerRecord, ChunkId, Phase, Question, QuestionOption, SessionConfig};
use crate::session::{
    resolve_question_ids, transition, Direction, QuestionSet, SessionEvent, SessionState,
};
use crate::statistics::{compute_statistics, score_by, Score, Statistics};
use crate::store::{
    PersistentStore, CONFIG_KEY, SESSION_STATE_KEY, STATISTICS_KEY, USER_ANSWERS_KEY,
};
use crate::timer::{TimerFence, TimerFired, TimerScheduler};
use crate::traits::{request_explanation, ExplainRequest, Explanation, ExplanationProvider};

/// Drives one quiz session at a time.
///
/// Mutating operations take `&mut self`. The only awaits are question loads,
/// which happen before any state is committed: a failed load leaves the
/// session where it was.
pub struct SessionEngine {
    index: Arc<QuestionIndex>,
    cache: Arc<ChunkCacheManager>,
    store: PersistentStore,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn TimerScheduler>,
    fence: TimerFence,
    state: SessionState,
    /// Session questions from the loaded chunks.
    questions: QuestionSet,
    loaded: BTreeSet<ChunkId>,
    last_preload: Option<ChunkId>,
}

impl SessionEngine {
    pub fn new(
        index: Arc<QuestionIndex>,
        cache: Arc<ChunkCacheManager>,
        timer: Arc<dyn TimerScheduler>,
    ) -> Self {
        let store = cache.store().clone();
        let clock = Arc::clone(store.clock());
        Self {
            index,
            cache,
            store,
            clock,
            timer,
            fence: TimerFence::default(),
            state: SessionState::default(),
            questions: QuestionSet::default(),
            loaded: BTreeSet::new(),
            last_preload: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn index(&self) -> &QuestionIndex {
        &self.index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.state
            .current_question_id()
            .and_then(|id| self.questions.get(id))
    }

    /// Options of the current question in presentation order.
    pub fn current_options(&self) -> Vec<&QuestionOption> {
        match self.state.current_question_id() {
            Some(id) => self.questions.options_in_order(id, &self.state),
            None => Vec::new(),
        }
    }

    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.state
            .current_question_id()
            .and_then(|id| self.state.answer_for(id))
    }

    /// Generation of the running question timer, if any.
    pub fn armed_timer(&self) -> Option<u64> {
        self.fence.armed()
    }

    /// Chunks whose session questions are currently held, ascending.
    pub fn loaded_chunks(&self) -> Vec<ChunkId> {
        self.loaded.iter().copied().collect()
    }

    /// The chunk most recently handed to the cache for preloading.
    pub fn last_preload(&self) -> Option<ChunkId> {
        self.last_preload
    }

    /// Start a new session.
    #[tracing::instrument(skip(self, config), fields(subject = ?config.subject))]
    pub async fn start(
        &mut self,
        mut config: SessionConfig,
    ) -> Result<&SessionState, SessionError> {
        if self.state.phase != Phase::Idle {
            return Err(SessionError::InvalidPhase {
                operation: "start",
                phase: self.state.phase,
            });
        }

        // The drawn seed is stored with the config in the snapshot
        let seed = *config.seed.get_or_insert_with(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let ids = resolve_question_ids(&self.index, &config, &mut rng)?;
        let (set, loaded) = self.load_window(&ids, &[0]).await?;
        let event = SessionEvent::Start {
            session_id: Uuid::new_v4(),
            config: config.clone(),
            question_ids: ids,
        };
        let next = transition(&self.state, event, &set, self.clock.now())?;
        self.questions = set;
        self.loaded = loaded;
        self.commit(next);

        if let Err(e) = self.store.save(CONFIG_KEY, &config) {
            tracing::warn!("failed to save session config: {e}");
        }

        tracing::info!(
            session_id = %self.state.session_id,
            questions = self.state.question_ids.len(),
            "session started"
        );
        Ok(&self.state)
    }

    /// Restore the persisted session, if one is in progress or finished.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<&SessionState, SessionError> {
        let snapshot = self.store.load::<SessionState>(SESSION_STATE_KEY)?;
        let Some(state) = snapshot.map(|e| e.value).filter(|s| s.phase != Phase::Idle) else {
            return Err(SessionError::NoSnapshot);
        };

        let (set, loaded) = self
            .load_window(&state.question_ids, &[state.current_index])
            .await?;
        self.questions = set;
        self.loaded = loaded;
        self.state = state;
        self.fence.disarm();
        self.sync_timer(None);
        self.preload_ahead();

        tracing::info!(
            session_id = %self.state.session_id,
            phase = %self.state.phase,
            "session resumed"
        );
        Ok(&self.state)
    }

    /// Record an answer for the current question. `None` records a skip.
    pub fn submit_answer(&mut self, option: Option<&str>) -> Result<&AnswerRecord, SessionError> {
        let Some(question_id) = self.state.current_question_id().map(str::to_string) else {
            return Err(SessionError::InvalidPhase {
                operation: "submit an answer",
                phase: self.state.phase,
            });
        };
        self.apply(SessionEvent::Answer {
            option: option.map(str::to_string),
        })?;

        self.state
            .answer_for(&question_id)
            .ok_or_else(|| SessionError::MissingQuestion(question_id.clone()))
    }

    /// Move the question pointer. Returns whether it moved.
    pub async fn advance(&mut self, direction: Direction) -> Result<bool, SessionError> {
        if matches!(self.state.phase, Phase::Active | Phase::Answered | Phase::Review) {
            if let Some(target) = self.state.target_index(direction) {
                self.ensure_loaded(target).await?;
            }
        }
        let before = self.state.current_index;
        self.apply(SessionEvent::Advance(direction))?;
        Ok(self.state.current_index != before)
    }

    /// Complete the session and return the final statistics.
    pub fn finish(&mut self) -> Result<Statistics, SessionError> {
        let was_running = self.state.phase.is_running();
        self.apply(SessionEvent::Finish)?;
        let stats = self.statistics();
        if was_running {
            let score = self.score();
            tracing::info!(
                session_id = %self.state.session_id,
                correct = score.correct,
                total = score.total,
                percentage = score.percentage,
                "session finished"
            );
        }
        Ok(stats)
    }

    /// Enter review at the first question.
    pub async fn review(&mut self) -> Result<(), SessionError> {
        if self.state.phase == Phase::Completed {
            self.ensure_loaded(0).await?;
        }
        self.apply(SessionEvent::Review)
    }

    pub fn exit_review(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::ExitReview)
    }

    /// Drop the session and its durable snapshot. The question cache stays.
    pub fn reset(&mut self) {
        if let Some(generation) = self.fence.disarm() {
            self.timer.cancel(generation);
        }
        self.state = SessionState::default();
        self.questions = QuestionSet::default();
        self.loaded.clear();
        self.last_preload = None;

        for key in [SESSION_STATE_KEY, USER_ANSWERS_KEY, STATISTICS_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, "failed to clear session record: {e}");
            }
        }
        tracing::info!("session reset");
    }

    /// Handle a timer firing. Returns `false` for stale firings.
    pub async fn on_timer_fired(&mut self, fired: TimerFired) -> Result<bool, SessionError> {
        if self.fence.armed() != Some(fired.generation) {
            tracing::debug!(generation = fired.generation, "ignoring stale timer");
            return Ok(false);
        }
        // The timeout moves on to the next question, so load it first
        if !self.state.is_last() {
            self.ensure_loaded(self.state.current_index + 1).await?;
        }
        if !self.fence.accept(fired) {
            return Ok(false);
        }
        tracing::debug!(generation = fired.generation, "question timer expired");
        self.apply(SessionEvent::Timeout)?;
        Ok(true)
    }

    pub fn score(&self) -> Score {
        let questions = self
            .state
            .question_ids
            .iter()
            .filter_map(|id| self.index.entry(id))
            .map(|e| (e.id.as_str(), e.gradable));
        score_by(questions, &self.state.answers)
    }

    pub fn statistics(&self) -> Statistics {
        compute_statistics(self.state.answers.values(), |id| {
            self.index.entry(id).map(|e| e.subject.clone())
        })
    }

    /// Ask the explanation service about the current question.
    ///
    /// Never touches session state; failures come back as an unsuccessful
    /// [`Explanation`]. `None` when there is no current question.
    pub async fn explain_current(
        &self,
        provider: &dyn ExplanationProvider,
        timeout: Duration,
    ) -> Option<Explanation> {
        let question = self.current_question()?;
        let selected = self
            .current_answer()
            .and_then(|a| a.selected_option.as_deref());
        let request = ExplainRequest::for_question(question, selected);
        Some(request_explanation(provider, &request, timeout).await)
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let next = transition(&self.state, event, &self.questions, self.clock.now())?;
        if next != self.state {
            self.commit(next);
        }
        Ok(())
    }

    fn commit(&mut self, next: SessionState) {
        let previous = std::mem::replace(&mut self.state, next);
        self.sync_timer(Some(&previous));
        self.persist();
        self.preload_ahead();
    }

    /// Load the session questions living in the chunks of `positions`.
    ///
    /// Returns the new question set and its chunks without touching the
    /// engine, so a failed load changes nothing.
    async fn load_window(
        &self,
        question_ids: &[String],
        positions: &[usize],
    ) -> Result<(QuestionSet, BTreeSet<ChunkId>), SessionError> {
        let wanted: Vec<&str> = positions
            .iter()
            .filter_map(|&i| question_ids.get(i))
            .map(String::as_str)
            .collect();
        let mut chunks = BTreeSet::new();
        for id in &wanted {
            let chunk_id = self
                .index
                .chunk_of(id)
                .ok_or_else(|| SessionError::MissingQuestion(id.to_string()))?;
            chunks.insert(chunk_id);
        }

        let loads = join_all(chunks.iter().map(|&c| self.cache.load_chunk(c))).await;
        let session: HashSet<&str> = question_ids.iter().map(String::as_str).collect();
        let mut bodies = Vec::new();
        for chunk in loads {
            let chunk = chunk?;
            bodies.extend(
                chunk
                    .questions
                    .iter()
                    .filter(|q| session.contains(q.id.as_str()))
                    .cloned(),
            );
        }

        let set = QuestionSet::new(bodies);
        if let Some(missing) = wanted.iter().find(|id| !set.contains(id)) {
            return Err(SessionError::MissingQuestion(missing.to_string()));
        }
        tracing::debug!(chunks = ?chunks, questions = set.len(), "question window loaded");
        Ok((set, chunks))
    }

    /// Load the question at `index` if its body is not held yet. The current
    /// question's chunk stays loaded alongside it.
    async fn ensure_loaded(&mut self, index: usize) -> Result<(), SessionError> {
        match self.state.question_ids.get(index) {
            Some(id) if !self.questions.contains(id) => {}
            _ => return Ok(()),
        }
        let positions = [self.state.current_index, index];
        let (set, loaded) = self
            .load_window(&self.state.question_ids, &positions)
            .await?;
        self.questions = set;
        self.loaded = loaded;
        Ok(())
    }

    /// Keep the countdown in line with the current question.
    ///
    /// A timer keeps running while the session stays on the same unanswered
    /// question; any other change cancels it and arms a fresh one if needed.
    fn sync_timer(&mut self, previous: Option<&SessionState>) {
        let wants_timer = self.state.config.timer_enabled
            && self.state.phase == Phase::Active
            && self
                .state
                .current_question_id()
                .is_some_and(|id| !self.state.is_answered(id));
        let same_question = previous.is_some_and(|p| {
            p.current_index == self.state.current_index && p.phase == self.state.phase
        });

        if wants_timer && same_question && self.fence.armed().is_some() {
            return;
        }
        if let Some(generation) = self.fence.disarm() {
            self.timer.cancel(generation);
        }
        if wants_timer {
            let generation = self.fence.arm();
            let secs = u64::from(self.state.config.time_per_question_secs);
            self.timer.schedule(generation, Duration::from_secs(secs));
        }
    }

    /// Write the session snapshot. Failures are logged, never returned.
    fn persist(&self) {
        if let Err(e) = self.store.save(SESSION_STATE_KEY, &self.state) {
            tracing::warn!("failed to persist session state: {e}");
        }
        if let Err(e) = self.store.save(USER_ANSWERS_KEY, &self.state.history) {
            tracing::warn!("failed to persist answers: {e}");
        }
        if let Err(e) = self.store.save(STATISTICS_KEY, &self.statistics()) {
            tracing::warn!("failed to persist statistics: {e}");
        }
    }

    /// Warm the chunk of the next question in the session whose body is not
    /// loaded yet.
    fn preload_ahead(&mut self) {
        if !matches!(self.state.phase, Phase::Active | Phase::Answered | Phase::Review) {
            return;
        }
        let next = self
            .state
            .question_ids
            .iter()
            .skip(self.state.current_index + 1)
            .filter_map(|id| self.index.chunk_of(id))
            .find(|c| !self.loaded.contains(c));
        if let Some(chunk_id) = next {
            self.cache.preload(chunk_id);
            self.last_preload = Some(chunk_id);
        }
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("session_id", &self.state.session_id)
            .field("phase", &self.state.phase)
            .field("current_index", &self.state.current_index)
            .finish_non_exhaustive()
    }
}
