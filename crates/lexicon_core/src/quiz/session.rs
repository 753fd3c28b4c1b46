//! The per-learner quiz session and its state.

use std::time::{Duration, Instant};

use crate::domain::{ChatTarget, LearnerId, MessageHandle, SessionId};
use crate::quiz::question::Question;

/// Where a live session is in its question/answer cycle. A learner without a live
/// session is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    AwaitingReveal,
    AwaitingRating,
    Finished,
}

impl QuizState {
    pub fn name(&self) -> &'static str {
        match self {
            QuizState::AwaitingReveal => "awaiting reveal",
            QuizState::AwaitingRating => "awaiting rating",
            QuizState::Finished => "finished",
        }
    }
}

pub struct QuizSession {
    pub id: SessionId,
    pub learner_id: LearnerId,
    pub target: ChatTarget,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub state: QuizState,
    /// The one interactive message this session currently has on screen.
    pub last_message: Option<MessageHandle>,
    pub last_activity: Instant,
}

impl QuizSession {
    pub fn new(
        id: SessionId,
        learner_id: LearnerId,
        target: ChatTarget,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id,
            learner_id,
            target,
            questions,
            current_index: 0,
            state: QuizState::AwaitingReveal,
            last_message: None,
            last_activity: Instant::now(),
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            current_index: self.current_index,
            total: self.questions.len(),
        }
    }
}

/// A read-only view of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: QuizState,
    pub current_index: usize,
    pub total: usize,
}
