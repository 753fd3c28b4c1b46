//! crates/lexicon_core/src/quiz/engine.rs
//!
//! Drives quiz sessions: one live session per learner, advanced by `reveal` and
//! `rate` events coming back from the chat collaborator.
//!
//! The registry maps learner ids to sessions. Each session sits behind its own
//! async mutex, so events for one learner are handled one at a time while other
//! learners proceed in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::domain::{ChatTarget, Control, JournalEntry, LearnerId, Page, SessionId};
use crate::error::{CoreError, CoreResult};
use crate::journal::JournalStore;
use crate::ports::ChatPresenter;
use crate::quiz::question::Question;
use crate::quiz::session::{QuizSession, QuizState, SessionSnapshot};
use crate::scheduler;
use crate::word_cache::WordCache;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sessions untouched for longer than this are treated as abandoned.
    pub idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Which kind of question a review quiz is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionKind {
    #[default]
    Flashcard,
    Recall,
}

impl QuestionKind {
    pub fn build(&self, entry: &JournalEntry) -> Question {
        match self {
            QuestionKind::Flashcard => Question::flashcard(entry),
            QuestionKind::Recall => Question::recall(entry),
        }
    }
}

/// Result of an accepted rating.
#[derive(Debug, Clone, PartialEq)]
pub struct RateOutcome {
    /// The journal entry after the review was applied.
    pub entry: JournalEntry,
    /// Whether that was the last question.
    pub finished: bool,
}

#[derive(Clone)]
struct LiveSession {
    id: SessionId,
    handle: Arc<Mutex<QuizSession>>,
}

pub struct QuizEngine {
    sessions: DashMap<LearnerId, LiveSession>,
    journal: Arc<JournalStore>,
    cache: WordCache,
    presenter: Arc<dyn ChatPresenter>,
    config: EngineConfig,
}

impl QuizEngine {
    pub fn new(
        journal: Arc<JournalStore>,
        cache: WordCache,
        presenter: Arc<dyn ChatPresenter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            journal,
            cache,
            presenter,
            config,
        }
    }

    /// Starts a quiz for `learner_id`, replacing any session they already have, and
    /// renders the first prompt.
    ///
    /// Every question must be about a word in the learner's journal.
    /// `LookupFailed` means the session is live but its first prompt could not be
    /// built, so nothing was rendered.
    pub async fn start(
        &self,
        learner_id: LearnerId,
        target: ChatTarget,
        questions: Vec<Question>,
    ) -> CoreResult<SessionId> {
        self.start_as(SessionId::new(), learner_id, target, questions)
            .await
    }

    /// Like [`QuizEngine::start`], with a caller-chosen session id so the caller can
    /// announce the session before its first page goes out.
    pub async fn start_as(
        &self,
        id: SessionId,
        learner_id: LearnerId,
        target: ChatTarget,
        questions: Vec<Question>,
    ) -> CoreResult<SessionId> {
        if questions.is_empty() {
            return Err(CoreError::EmptyQuiz);
        }
        self.ensure_saved(&learner_id, &questions).await?;

        let session = QuizSession::new(id, learner_id.clone(), target, questions);
        let total = session.questions.len();
        let handle = Arc::new(Mutex::new(session));

        // Lock before publishing so no event can overtake the first render.
        let mut session = handle.clone().lock_owned().await;
        let replaced = self
            .sessions
            .insert(learner_id.clone(), LiveSession { id, handle });
        if let Some(previous) = replaced {
            self.retire(previous).await;
        }

        info!(
            "Started quiz {} for learner {} with {} question(s)",
            id, learner_id, total
        );
        self.show_question(&mut session).await?;
        Ok(id)
    }

    /// Builds questions over the learner's due journal words, soonest first.
    pub async fn review_questions(
        &self,
        learner_id: &LearnerId,
        limit: usize,
        kind: QuestionKind,
    ) -> CoreResult<Vec<Question>> {
        let due = self.journal.due_entries(learner_id, limit).await?;
        Ok(due.iter().map(|entry| kind.build(entry)).collect())
    }

    /// Starts a quiz over the learner's due journal words, soonest first.
    pub async fn start_review(
        &self,
        learner_id: LearnerId,
        target: ChatTarget,
        limit: usize,
        kind: QuestionKind,
    ) -> CoreResult<SessionId> {
        let questions = self.review_questions(&learner_id, limit, kind).await?;
        self.start(learner_id, target, questions).await
    }

    /// Shows the answer to the current question along with the rating controls.
    ///
    /// The session moves to awaiting a rating even when the answer cannot be
    /// looked up; that case returns `LookupFailed` and renders nothing.
    pub async fn reveal(&self, learner_id: &LearnerId, session_id: SessionId) -> CoreResult<()> {
        let mut session = self.acquire(learner_id, session_id).await?;
        if session.state != QuizState::AwaitingReveal {
            return Err(CoreError::InvalidTransition {
                event: "reveal",
                state: session.state.name(),
            });
        }

        session.state = QuizState::AwaitingRating;
        self.show_answer(&mut session).await
    }

    /// Records the learner's rating of the current question and moves on.
    ///
    /// The state only advances once the review has been persisted; on any other
    /// error the session stays where it was. `LookupFailed` is the exception: the
    /// review was saved and the session advanced, but the next prompt could not be
    /// built.
    pub async fn rate(
        &self,
        learner_id: &LearnerId,
        session_id: SessionId,
        quality: i32,
    ) -> CoreResult<RateOutcome> {
        let mut session = self.acquire(learner_id, session_id).await?;
        if session.state != QuizState::AwaitingRating {
            return Err(CoreError::InvalidTransition {
                event: "rate",
                state: session.state.name(),
            });
        }
        scheduler::validate_quality(quality)?;

        let word = session
            .current_question()
            .map(|q| q.word().to_string())
            .ok_or(CoreError::SessionExpired(session_id))?;
        let entry = self.journal.record_review(learner_id, &word, quality).await?;

        session.current_index += 1;
        if session.current_index < session.questions.len() {
            session.state = QuizState::AwaitingReveal;
            self.show_question(&mut session).await?;
            return Ok(RateOutcome {
                entry,
                finished: false,
            });
        }

        session.state = QuizState::Finished;
        self.sessions
            .remove_if(learner_id, |_, live| live.id == session_id);
        self.show_summary(&mut session).await;
        info!("Learner {} finished quiz {}", learner_id, session_id);
        Ok(RateOutcome {
            entry,
            finished: true,
        })
    }

    /// A snapshot of the learner's live session, if any.
    pub async fn session(&self, learner_id: &LearnerId) -> Option<SessionSnapshot> {
        let live = self.sessions.get(learner_id).map(|e| e.value().clone())?;
        let session = live.handle.lock().await;
        Some(session.snapshot())
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Removes every session that has been idle past the timeout. Sessions busy
    /// handling an event are skipped.
    pub async fn evict_idle(&self) -> usize {
        let candidates: Vec<(LearnerId, LiveSession)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut evicted = 0;
        for (learner_id, live) in candidates {
            let Ok(mut session) = live.handle.try_lock() else {
                continue;
            };
            if !session.is_idle(self.config.idle_timeout) {
                continue;
            }
            if self
                .sessions
                .remove_if(&learner_id, |_, current| current.id == live.id)
                .is_some()
            {
                self.close(&mut session).await;
                info!("Evicted idle quiz {} of learner {}", live.id, learner_id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Locks the learner's session if `session_id` is still the live one.
    async fn acquire(
        &self,
        learner_id: &LearnerId,
        session_id: SessionId,
    ) -> CoreResult<OwnedMutexGuard<QuizSession>> {
        let live = match self.sessions.get(learner_id) {
            Some(entry) if entry.id == session_id => entry.value().clone(),
            _ => return Err(CoreError::SessionExpired(session_id)),
        };

        let mut session = live.handle.lock_owned().await;
        // Replaced or finished while this event was waiting for the lock.
        if session.state == QuizState::Finished {
            return Err(CoreError::SessionExpired(session_id));
        }

        if session.is_idle(self.config.idle_timeout) {
            self.sessions
                .remove_if(learner_id, |_, current| current.id == session_id);
            self.close(&mut session).await;
            info!("Quiz {} of learner {} expired after being idle", session_id, learner_id);
            return Err(CoreError::SessionExpired(session_id));
        }

        session.touch();
        Ok(session)
    }

    async fn retire(&self, previous: LiveSession) {
        let mut session = previous.handle.lock().await;
        self.close(&mut session).await;
        info!(
            "Quiz {} of learner {} was replaced by a new one",
            session.id, session.learner_id
        );
    }

    async fn close(&self, session: &mut QuizSession) {
        session.state = QuizState::Finished;
        if let Some(message) = session.last_message.take() {
            if let Err(e) = self.presenter.delete_message(&session.target, &message).await {
                warn!("Failed to delete message of quiz {}: {}", session.id, e);
            }
        }
    }

    async fn ensure_saved(&self, learner_id: &LearnerId, questions: &[Question]) -> CoreResult<()> {
        let mut checked: Vec<&str> = Vec::new();
        for question in questions {
            let word = question.word();
            if checked.contains(&word) {
                continue;
            }
            if self.journal.get(learner_id, word).await?.is_none() {
                return Err(CoreError::EntryNotFound {
                    learner_id: learner_id.clone(),
                    word: word.to_string(),
                });
            }
            checked.push(word);
        }
        Ok(())
    }

    async fn show_question(&self, session: &mut QuizSession) -> CoreResult<()> {
        let Some(question) = session.current_question().cloned() else {
            return Ok(());
        };
        let (number, total) = (session.current_index, session.questions.len());
        let page = question.prompt(&self.cache, number, total).await;
        let page = content_or_skip(&question, page, session.id)?;
        self.render(session, page, Control::reveal_row()).await;
        Ok(())
    }

    async fn show_answer(&self, session: &mut QuizSession) -> CoreResult<()> {
        let Some(question) = session.current_question().cloned() else {
            return Ok(());
        };
        let (number, total) = (session.current_index, session.questions.len());
        let page = question.answer(&self.cache, number, total).await;
        let page = content_or_skip(&question, page, session.id)?;
        self.render(session, page, Control::rating_row()).await;
        Ok(())
    }

    async fn show_summary(&self, session: &mut QuizSession) {
        let page = Page::titled("Quiz complete")
            .with_description(format!("You reviewed {} word(s).", session.questions.len()));
        self.render(session, page, Vec::new()).await;
    }

    /// Replaces the session's outstanding message with a new one. Failures are
    /// logged only; the caller's state change stands either way.
    async fn render(&self, session: &mut QuizSession, page: Page, controls: Vec<Control>) {
        if let Some(previous) = session.last_message.take() {
            if let Err(e) = self.presenter.delete_message(&session.target, &previous).await {
                warn!("Failed to delete message of quiz {}: {}", session.id, e);
            }
        }
        match self
            .presenter
            .render_prompt(&session.target, &page, &controls)
            .await
        {
            Ok(handle) => session.last_message = Some(handle),
            Err(e) => warn!("Failed to render quiz {}: {}", session.id, e),
        }
    }
}

/// Turns a failed or empty page build into `LookupFailed`. The caller skips the
/// render and leaves the previous message on screen.
fn content_or_skip(
    question: &Question,
    page: CoreResult<Option<Page>>,
    session_id: SessionId,
) -> CoreResult<Page> {
    match page {
        Ok(Some(page)) => Ok(page),
        Ok(None) => {
            let sense = question.sense_ref();
            warn!("Sense {:?} no longer exists; quiz {} not rendered", sense, session_id);
            Err(CoreError::LookupFailed {
                word: question.word().to_string(),
                reason: format!("sense {} no longer exists", sense.index),
            })
        }
        Err(e) => {
            warn!("Could not build page of quiz {} for '{}': {}", session_id, question.word(), e);
            Err(e)
        }
    }
}
