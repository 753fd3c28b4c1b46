//! crates/lexicon_core/src/error.rs
//!
//! Errors surfaced by the core operations. None of them are fatal; each one is
//! recovered at the operation boundary by the caller.

use crate::domain::{LearnerId, SessionId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// The event does not apply to the session's current state.
    #[error("Cannot {event} while the quiz is {state}")]
    InvalidTransition { event: &'static str, state: &'static str },

    /// The session handle is stale (replaced, finished or idle for too long).
    #[error("Quiz session {0} has expired")]
    SessionExpired(SessionId),

    /// The dictionary was unreachable and nothing was cached for the word.
    #[error("Lookup failed for '{word}': {reason}")]
    LookupFailed { word: String, reason: String },

    #[error("Quality {0} is outside the range 0..=5")]
    InvalidQuality(i32),

    /// The journal store stayed unavailable after a retry.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("'{word}' is not in the journal of learner {learner_id}")]
    EntryNotFound { learner_id: LearnerId, word: String },

    #[error("A quiz needs at least one question")]
    EmptyQuiz,
}

pub type CoreResult<T> = Result<T, CoreError>;
