//! crates/lexicon_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific chat platform, dictionary API or database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChatTarget, Control, JournalEntry, LearnerId, MessageHandle, Page, Sense};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DictionaryService: Send + Sync {
    /// Fetches the ordered senses of a (normalized) word.
    async fn fetch_definitions(&self, word: &str) -> PortResult<Vec<Sense>>;
}

#[async_trait]
pub trait ChatPresenter: Send + Sync {
    /// Sends a page with its interactive controls and returns the new message's handle.
    async fn render_prompt(
        &self,
        target: &ChatTarget,
        page: &Page,
        controls: &[Control],
    ) -> PortResult<MessageHandle>;

    async fn delete_message(&self, target: &ChatTarget, handle: &MessageHandle) -> PortResult<()>;
}

/// Document store for learner journals, keyed by learner id.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn learner_exists(&self, learner_id: &LearnerId) -> PortResult<bool>;

    /// Entries ordered by next practice time, soonest first.
    async fn list_entries(
        &self,
        learner_id: &LearnerId,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>>;

    /// Entries whose next practice time is at or before `now`, soonest first.
    async fn due_entries(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>>;

    async fn get_entry(&self, learner_id: &LearnerId, word: &str) -> PortResult<Option<JournalEntry>>;

    /// Inserts or replaces the entry keyed by (learner, word).
    async fn save_entry(&self, entry: &JournalEntry) -> PortResult<()>;
}
