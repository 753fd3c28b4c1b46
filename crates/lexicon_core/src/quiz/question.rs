//! Quiz content. Each question kind knows how to build its prompt and answer pages;
//! the session state machine never looks inside.

use crate::domain::{JournalEntry, Page, Sense, SenseRef};
use crate::error::CoreResult;
use crate::word_cache::WordCache;

#[derive(Debug, Clone, PartialEq)]
pub enum Question {
    /// Shows the word, reveals its definition.
    Flashcard(SenseRef),
    /// Shows the definition, reveals the word.
    Recall(SenseRef),
}

impl Question {
    pub fn flashcard(entry: &JournalEntry) -> Self {
        Question::Flashcard(entry.sense_ref())
    }

    pub fn recall(entry: &JournalEntry) -> Self {
        Question::Recall(entry.sense_ref())
    }

    pub fn sense_ref(&self) -> &SenseRef {
        match self {
            Question::Flashcard(sense) | Question::Recall(sense) => sense,
        }
    }

    /// The journal word this question reviews.
    pub fn word(&self) -> &str {
        &self.sense_ref().word
    }

    /// Page shown before the answer is revealed. `Ok(None)` when the referenced sense
    /// no longer exists.
    pub async fn prompt(&self, cache: &WordCache, number: usize, total: usize) -> CoreResult<Option<Page>> {
        let page = match self {
            Question::Flashcard(sense_ref) => Page::titled(&sense_ref.word)
                .with_description("Do you remember what this word means?"),
            Question::Recall(sense_ref) => {
                let Some(sense) = cache.resolve(sense_ref).await? else {
                    return Ok(None);
                };
                Page::titled("Which word is this?")
                    .with_description(sense.definition)
                    .with_field("Part of speech", sense.part_of_speech, false)
            }
        };
        Ok(Some(page.with_footer(progress(number, total))))
    }

    /// Page shown once the learner asks for the answer.
    pub async fn answer(&self, cache: &WordCache, number: usize, total: usize) -> CoreResult<Option<Page>> {
        let sense_ref = self.sense_ref();
        let Some(sense) = cache.resolve(sense_ref).await? else {
            return Ok(None);
        };
        Ok(Some(
            answer_page(&sense_ref.word, sense)
                .with_footer(format!("{} · How well did you remember? 0 = blackout, 5 = perfect", progress(number, total))),
        ))
    }
}

fn answer_page(word: &str, sense: Sense) -> Page {
    Page::titled(word)
        .with_field("Part of speech", sense.part_of_speech, false)
        .with_field("Definition", sense.definition, false)
}

fn progress(number: usize, total: usize) -> String {
    format!("Card {} of {}", number + 1, total)
}
