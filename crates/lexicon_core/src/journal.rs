//! crates/lexicon_core/src/journal.rs
//!
//! The journal store: a learner's saved words and their review schedule, on top of
//! a `JournalRepository`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{normalize_word, JournalEntry, LearnerId};
use crate::error::{CoreError, CoreResult};
use crate::ports::{JournalRepository, PortResult};
use crate::scheduler::{self, ReviewState};

type EntryKey = (LearnerId, String);

pub struct JournalStore {
    repository: Arc<dyn JournalRepository>,
    /// One lock per (learner, word) so reviews of the same entry run one at a time.
    entry_locks: DashMap<EntryKey, Arc<Mutex<()>>>,
}

impl JournalStore {
    pub fn new(repository: Arc<dyn JournalRepository>) -> Self {
        Self {
            repository,
            entry_locks: DashMap::new(),
        }
    }

    pub async fn exists(&self, learner_id: &LearnerId) -> CoreResult<bool> {
        self.repository
            .learner_exists(learner_id)
            .await
            .map_err(|e| CoreError::PersistenceFailure(e.to_string()))
    }

    /// One page of the journal, due-soonest first. Pages are 0-based.
    pub async fn recent_entries(
        &self,
        learner_id: &LearnerId,
        page: usize,
        page_size: usize,
    ) -> CoreResult<Vec<JournalEntry>> {
        if page_size == 0 {
            return Ok(Vec::new());
        }
        self.repository
            .list_entries(learner_id, page.saturating_mul(page_size), page_size)
            .await
            .map_err(|e| CoreError::PersistenceFailure(e.to_string()))
    }

    pub async fn due_entries(
        &self,
        learner_id: &LearnerId,
        limit: usize,
    ) -> CoreResult<Vec<JournalEntry>> {
        self.repository
            .due_entries(learner_id, Utc::now(), limit)
            .await
            .map_err(|e| CoreError::PersistenceFailure(e.to_string()))
    }

    pub async fn get(&self, learner_id: &LearnerId, word: &str) -> CoreResult<Option<JournalEntry>> {
        self.repository
            .get_entry(learner_id, &normalize_word(word))
            .await
            .map_err(|e| CoreError::PersistenceFailure(e.to_string()))
    }

    pub async fn upsert(&self, entry: JournalEntry) -> CoreResult<JournalEntry> {
        self.locked(&entry.learner_id, &entry.word, async {
            self.persist("save", || self.repository.save_entry(&entry))
                .await
        })
        .await?;
        Ok(entry)
    }

    /// Saves a word to the learner's journal. An existing entry keeps its review
    /// history and is only re-pointed at the new sense.
    pub async fn add_word(
        &self,
        learner_id: &LearnerId,
        word: &str,
        definition_index: usize,
    ) -> CoreResult<JournalEntry> {
        let word = normalize_word(word);
        let entry = self
            .locked(learner_id, &word, async {
                let existing = self
                    .persist("load", || self.repository.get_entry(learner_id, &word))
                    .await?;
                let entry = match existing {
                    Some(mut entry) => {
                        entry.definition_index = definition_index;
                        entry
                    }
                    None => JournalEntry::new(learner_id.clone(), &word, definition_index, Utc::now()),
                };
                self.persist("save", || self.repository.save_entry(&entry))
                    .await?;
                Ok(entry)
            })
            .await?;

        info!("Learner {} saved '{}' (sense {})", learner_id, word, definition_index);
        Ok(entry)
    }

    /// Applies one review to the (learner, word) entry and persists it.
    ///
    /// Reviews of the same entry are serialized. If the store fails, the save is
    /// retried once before `PersistenceFailure` is returned, in which case nothing
    /// has changed.
    pub async fn record_review(
        &self,
        learner_id: &LearnerId,
        word: &str,
        quality: i32,
    ) -> CoreResult<JournalEntry> {
        scheduler::validate_quality(quality)?;
        let word = normalize_word(word);
        let updated = self
            .locked(learner_id, &word, async {
                let current = self
                    .persist("load", || self.repository.get_entry(learner_id, &word))
                    .await?
                    .ok_or_else(|| CoreError::EntryNotFound {
                        learner_id: learner_id.clone(),
                        word: word.clone(),
                    })?;
                let updated = apply_review(&current, quality, Utc::now())?;
                self.persist("save", || self.repository.save_entry(&updated))
                    .await?;
                Ok(updated)
            })
            .await?;

        info!(
            "Learner {} reviewed '{}' with quality {}: repetitions {}, next practice in {} day(s)",
            learner_id, word, quality, updated.repetitions, updated.interval_days
        );
        Ok(updated)
    }

    /// Runs `work` while holding the (learner, word) lock.
    async fn locked<T, Fut>(&self, learner_id: &LearnerId, word: &str, work: Fut) -> CoreResult<T>
    where
        Fut: Future<Output = CoreResult<T>>,
    {
        let key = (learner_id.clone(), word.to_string());
        let lock = self.entry_locks.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        // Forget the lock once nobody else is holding or waiting on it.
        self.entry_locks
            .remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    /// Runs a repository call, retrying it once on failure.
    async fn persist<T, F, Fut>(&self, op: &str, mut call: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        match call().await {
            Ok(value) => Ok(value),
            Err(first) => {
                warn!("Journal {} failed, retrying once: {}", op, first);
                call().await.map_err(|e| {
                    error!("Journal {} failed again: {}", op, e);
                    CoreError::PersistenceFailure(e.to_string())
                })
            }
        }
    }
}

/// Applies a review to an entry at time `now`. The next practice time always moves
/// strictly forward, even if the clock has not.
pub fn apply_review(
    entry: &JournalEntry,
    quality: i32,
    now: DateTime<Utc>,
) -> CoreResult<JournalEntry> {
    let state = ReviewState {
        repetitions: entry.repetitions,
        ease_factor: entry.ease_factor,
        interval_days: entry.interval_days,
    };
    let next = scheduler::review(&state, quality)?;

    let mut next_practice = now + Duration::days(i64::from(next.interval_days));
    if next_practice <= entry.next_practice {
        next_practice = entry.next_practice + Duration::seconds(1);
    }

    let mut updated = entry.clone();
    updated.repetitions = next.repetitions;
    updated.ease_factor = next.ease_factor;
    updated.interval_days = next.interval_days;
    updated.next_practice = next_practice;
    updated.quality_history.push(quality);
    Ok(updated)
}
