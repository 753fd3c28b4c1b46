//! crates/lexicon_core/src/memory.rs
//!
//! An in-process `JournalRepository`: one document per learner, held behind an
//! async `RwLock`. Used when no database is configured and throughout the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::{JournalEntry, LearnerId};
use crate::ports::{JournalRepository, PortResult};

#[derive(Default)]
pub struct InMemoryJournalRepository {
    documents: RwLock<HashMap<LearnerId, HashMap<String, JournalEntry>>>,
}

impl InMemoryJournalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one learner sorted due-soonest first; ties broken by word.
    async fn sorted(&self, learner_id: &LearnerId) -> Vec<JournalEntry> {
        let documents = self.documents.read().await;
        let mut entries: Vec<JournalEntry> = documents
            .get(learner_id)
            .map(|doc| doc.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            a.next_practice
                .cmp(&b.next_practice)
                .then_with(|| a.word.cmp(&b.word))
        });
        entries
    }
}

#[async_trait]
impl JournalRepository for InMemoryJournalRepository {
    async fn learner_exists(&self, learner_id: &LearnerId) -> PortResult<bool> {
        Ok(self.documents.read().await.contains_key(learner_id))
    }

    async fn list_entries(
        &self,
        learner_id: &LearnerId,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        Ok(self
            .sorted(learner_id)
            .await
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn due_entries(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        Ok(self
            .sorted(learner_id)
            .await
            .into_iter()
            .filter(|e| e.is_due(now))
            .take(limit)
            .collect())
    }

    async fn get_entry(&self, learner_id: &LearnerId, word: &str) -> PortResult<Option<JournalEntry>> {
        Ok(self
            .documents
            .read()
            .await
            .get(learner_id)
            .and_then(|doc| doc.get(word))
            .cloned())
    }

    async fn save_entry(&self, entry: &JournalEntry) -> PortResult<()> {
        self.documents
            .write()
            .await
            .entry(entry.learner_id.clone())
            .or_default()
            .insert(entry.word.clone(), entry.clone());
        Ok(())
    }
}
