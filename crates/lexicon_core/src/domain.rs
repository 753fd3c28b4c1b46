//! crates/lexicon_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Ease factor every new journal entry starts with.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Number of recent reviews that feed into [`JournalEntry::recall_strength`].
const RECALL_WINDOW: usize = 5;

//=========================================================================================
// Identifiers
//=========================================================================================

/// Stable, platform-assigned identifier of a learner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LearnerId(pub String);

impl LearnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LearnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LearnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of one quiz session. Events carry it so stale interactions can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where the chat collaborator should post messages (a channel, a DM, a socket...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatTarget(pub String);

impl From<&str> for ChatTarget {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque id of a message the chat collaborator has sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

//=========================================================================================
// Dictionary data
//=========================================================================================

/// One definition / part-of-speech entry for a word.
#[derive(Debug, Clone, PartialEq)]
pub struct Sense {
    pub index: usize,
    pub part_of_speech: String,
    pub definition: String,
}

/// A memoized dictionary lookup. Owned by the word cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedWordEntry {
    pub word: String,
    pub senses: Vec<Sense>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedWordEntry {
    /// Finds a sense by its index. Indices are matched by value, not position,
    /// so a re-fetch that reorders senses still resolves correctly.
    pub fn sense(&self, index: usize) -> Option<&Sense> {
        self.senses.iter().find(|s| s.index == index)
    }
}

/// A weak (word, index) reference into the word cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenseRef {
    pub word: String,
    pub index: usize,
}

/// Lower-cases and trims a word so it can be used as a cache or journal key.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

//=========================================================================================
// Journal
//=========================================================================================

/// A word a learner has saved to their journal, with its review metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub learner_id: LearnerId,
    pub word: String,
    pub definition_index: usize,
    pub time_added: DateTime<Utc>,
    pub next_practice: DateTime<Utc>,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub quality_history: Vec<i32>,
}

impl JournalEntry {
    /// A freshly saved word, due for practice immediately.
    pub fn new(
        learner_id: LearnerId,
        word: &str,
        definition_index: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            word: normalize_word(word),
            definition_index,
            time_added: now,
            next_practice: now,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 0,
            quality_history: Vec::new(),
        }
    }

    pub fn sense_ref(&self) -> SenseRef {
        SenseRef {
            word: self.word.clone(),
            index: self.definition_index,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_practice <= now
    }

    /// How well the learner currently remembers this word, from 0 (never reviewed)
    /// up to 4, based on the mean of the most recent review qualities.
    pub fn recall_strength(&self) -> u8 {
        let recent: Vec<i32> = self
            .quality_history
            .iter()
            .rev()
            .take(RECALL_WINDOW)
            .copied()
            .collect();
        if recent.is_empty() {
            return 0;
        }
        let mean = recent.iter().sum::<i32>() as f64 / recent.len() as f64;
        match mean {
            m if m < 2.0 => 1,
            m if m < 3.0 => 2,
            m if m < 4.0 => 3,
            _ => 4,
        }
    }
}

//=========================================================================================
// Presentation
//=========================================================================================

/// Abstract page content handed to the chat collaborator for rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<PageField>,
    pub footer: Option<String>,
}

impl Page {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(PageField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// An interactive trigger attached to a rendered page. The chat collaborator maps it
/// back to `reveal` / `rate` on the session that rendered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Reveal,
    Rate(i32),
}

impl Control {
    /// The "Reveal" button shown under a prompt.
    pub fn reveal_row() -> Vec<Control> {
        vec![Control::Reveal]
    }

    /// One rating button per quality, 0 through 5.
    pub fn rating_row() -> Vec<Control> {
        (0..=5).map(Control::Rate).collect()
    }

    pub fn label(&self) -> String {
        match self {
            Control::Reveal => "Reveal".to_string(),
            Control::Rate(q) => q.to_string(),
        }
    }
}
