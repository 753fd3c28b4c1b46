//! Test doubles for the core's ports.
//!
//! - `MockDictionary` serves scripted definitions and can be taken offline
//! - `RecordingPresenter` records every render/delete instead of talking to a chat platform
//! - `FlakyRepository` wraps the in-memory journal and fails saves on demand

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::{ChatTarget, Control, JournalEntry, LearnerId, MessageHandle, Page, Sense};
use crate::memory::InMemoryJournalRepository;
use crate::ports::{ChatPresenter, DictionaryService, JournalRepository, PortError, PortResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//=========================================================================================
// Dictionary
//=========================================================================================

/// A dictionary with a fixed vocabulary.
#[derive(Default)]
pub struct MockDictionary {
    words: Mutex<HashMap<String, Vec<Sense>>>,
    delay: Option<Duration>,
    offline: AtomicBool,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MockDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a word with `(part_of_speech, definition)` senses, indexed in order.
    pub fn with_word(self, word: &str, senses: &[(&str, &str)]) -> Self {
        self.set_word(word, senses);
        self
    }

    /// Makes every lookup take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_word(&self, word: &str, senses: &[(&str, &str)]) {
        let senses = senses
            .iter()
            .enumerate()
            .map(|(index, (pos, definition))| Sense {
                index,
                part_of_speech: pos.to_string(),
                definition: definition.to_string(),
            })
            .collect();
        lock(&self.words).insert(word.to_string(), senses);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fails the next `n` lookups regardless of the vocabulary.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Number of lookups that reached the dictionary.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DictionaryService for MockDictionary {
    async fn fetch_definitions(&self, word: &str) -> PortResult<Vec<Sense>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("dictionary offline".to_string()));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PortError::Unavailable("scripted failure".to_string()));
        }
        lock(&self.words)
            .get(word)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No definitions for '{}'", word)))
    }
}

//=========================================================================================
// Chat presenter
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Rendered {
        target: ChatTarget,
        handle: MessageHandle,
        page: Page,
        controls: Vec<Control>,
    },
    Deleted {
        target: ChatTarget,
        handle: MessageHandle,
    },
}

/// Records what would have been shown in the chat.
#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every render and delete fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        lock(&self.events).clone()
    }

    /// Pages rendered so far, oldest first.
    pub fn pages(&self) -> Vec<Page> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                PresenterEvent::Rendered { page, .. } => Some(page.clone()),
                PresenterEvent::Deleted { .. } => None,
            })
            .collect()
    }

    pub fn last_page(&self) -> Option<Page> {
        self.pages().pop()
    }

    /// Controls attached to the most recent render.
    pub fn last_controls(&self) -> Vec<Control> {
        lock(&self.events)
            .iter()
            .rev()
            .find_map(|e| match e {
                PresenterEvent::Rendered { controls, .. } => Some(controls.clone()),
                PresenterEvent::Deleted { .. } => None,
            })
            .unwrap_or_default()
    }

    /// Messages rendered on `target` and not deleted since.
    pub fn live_messages(&self, target: &ChatTarget) -> Vec<MessageHandle> {
        let mut live = Vec::new();
        for event in lock(&self.events).iter() {
            match event {
                PresenterEvent::Rendered { target: t, handle, .. } if t == target => {
                    live.push(handle.clone())
                }
                PresenterEvent::Deleted { target: t, handle } if t == target => {
                    live.retain(|h| h != handle)
                }
                _ => {}
            }
        }
        live
    }
}

#[async_trait]
impl ChatPresenter for RecordingPresenter {
    async fn render_prompt(
        &self,
        target: &ChatTarget,
        page: &Page,
        controls: &[Control],
    ) -> PortResult<MessageHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("chat offline".to_string()));
        }
        let handle = MessageHandle(format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        lock(&self.events).push(PresenterEvent::Rendered {
            target: target.clone(),
            handle: handle.clone(),
            page: page.clone(),
            controls: controls.to_vec(),
        });
        Ok(handle)
    }

    async fn delete_message(&self, target: &ChatTarget, handle: &MessageHandle) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("chat offline".to_string()));
        }
        lock(&self.events).push(PresenterEvent::Deleted {
            target: target.clone(),
            handle: handle.clone(),
        });
        Ok(())
    }
}

//=========================================================================================
// Journal repository
//=========================================================================================

/// In-memory journal whose saves can be made to fail, and which logs every save.
#[derive(Default)]
pub struct FlakyRepository {
    inner: InMemoryJournalRepository,
    failures_left: AtomicUsize,
    saves: Mutex<Vec<JournalEntry>>,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` calls to `save_entry`.
    pub fn fail_next_saves(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Every successfully saved entry, in save order.
    pub fn saves(&self) -> Vec<JournalEntry> {
        lock(&self.saves).clone()
    }
}

#[async_trait]
impl JournalRepository for FlakyRepository {
    async fn learner_exists(&self, learner_id: &LearnerId) -> PortResult<bool> {
        self.inner.learner_exists(learner_id).await
    }

    async fn list_entries(
        &self,
        learner_id: &LearnerId,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        self.inner.list_entries(learner_id, offset, limit).await
    }

    async fn due_entries(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        self.inner.due_entries(learner_id, now, limit).await
    }

    async fn get_entry(&self, learner_id: &LearnerId, word: &str) -> PortResult<Option<JournalEntry>> {
        self.inner.get_entry(learner_id, word).await
    }

    async fn save_entry(&self, entry: &JournalEntry) -> PortResult<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PortError::Unavailable("journal store offline".to_string()));
        }
        self.inner.save_entry(entry).await?;
        lock(&self.saves).push(entry.clone());
        Ok(())
    }
}
