//! Journal pages: each saved word rendered with its definition and review status.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{JournalEntry, LearnerId, Page};
use crate::error::CoreResult;
use crate::journal::JournalStore;
use crate::word_cache::WordCache;

/// Renders one page of a learner's journal, one `Page` per word.
///
/// Words whose definition cannot be looked up, or whose saved sense has
/// disappeared from the dictionary, are left out of the page.
pub async fn render_journal_page(
    journal: &JournalStore,
    cache: &WordCache,
    learner_id: &LearnerId,
    page: usize,
    page_size: usize,
) -> CoreResult<Vec<Page>> {
    if !journal.exists(learner_id).await? {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let mut pages = Vec::new();
    for entry in journal.recent_entries(learner_id, page, page_size).await? {
        match cache.resolve(&entry.sense_ref()).await {
            Ok(Some(sense)) => pages.push(
                entry_page(&entry, now)
                    .with_field("Part of speech", sense.part_of_speech, false)
                    .with_field("Definition", sense.definition, false)
                    .with_field("Quality", quality_bar(entry.recall_strength()), false)
                    .with_field("Stored time", relative_time(entry.time_added, now), true)
                    .with_field("Times practiced", entry.repetitions.to_string(), true)
                    .with_field("Next practice", relative_time(entry.next_practice, now), true),
            ),
            Ok(None) => warn!(
                "Skipping '{}': sense {} is gone",
                entry.word, entry.definition_index
            ),
            Err(e) => warn!("Skipping '{}': {}", entry.word, e),
        }
    }
    Ok(pages)
}

fn entry_page(entry: &JournalEntry, now: DateTime<Utc>) -> Page {
    let page = Page::titled(&entry.word);
    if entry.is_due(now) {
        page.with_description("Due for practice")
    } else {
        page
    }
}

pub fn quality_bar(strength: u8) -> &'static str {
    match strength {
        1 => "🟥",
        2 => "🟧 🟧",
        3 => "🟨 🟨 🟨",
        4 => "🟩 🟩 🟩 🟩",
        _ => "🚫",
    }
}

/// Human-friendly distance between `then` and `now`: "just now", "3 days ago", "in 2 weeks".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = then - now;
    let future = delta.num_seconds() > 0;
    let seconds = delta.num_seconds().unsigned_abs();

    let (amount, unit) = match seconds {
        s if s < 60 => return "just now".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 7 * 86_400 => (s / 86_400, "day"),
        s if s < 30 * 86_400 => (s / (7 * 86_400), "week"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let plural = if amount == 1 { "" } else { "s" };

    if future {
        format!("in {} {}{}", amount, unit, plural)
    } else {
        format!("{} {}{} ago", amount, unit, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryJournalRepository;
    use crate::testing::MockDictionary;
    use crate::word_cache::CacheConfig;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time(now + Duration::days(1), now), "in 1 day");
        assert_eq!(relative_time(now + Duration::days(15), now), "in 2 weeks");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(relative_time(now - Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn quality_bars() {
        assert_eq!(quality_bar(0), "🚫");
        assert_eq!(quality_bar(3), "🟨 🟨 🟨");
    }

    #[tokio::test]
    async fn pages_skip_words_without_a_definition() {
        let learner = LearnerId::from("learner");
        let journal = JournalStore::new(Arc::new(InMemoryJournalRepository::new()));
        let dictionary = MockDictionary::new().with_word("apple", &[("noun", "A round fruit")]);
        let cache = WordCache::new(Arc::new(dictionary), CacheConfig::default());

        journal.add_word(&learner, "apple", 0).await.unwrap();
        journal.add_word(&learner, "apple2", 0).await.unwrap();
        journal.add_word(&learner, "ghost", 0).await.unwrap();
        journal.record_review(&learner, "apple", 5).await.unwrap();

        let pages = render_journal_page(&journal, &cache, &learner, 0, 10).await.unwrap();

        assert_eq!(pages.len(), 1);
        let apple = &pages[0];
        assert_eq!(apple.title, "apple");
        assert_eq!(apple.field("Definition"), Some("A round fruit"));
        assert_eq!(apple.field("Times practiced"), Some("1"));
        assert_eq!(apple.field("Quality"), Some("🟩 🟩 🟩 🟩"));
        assert!(apple
            .field("Next practice")
            .map_or(false, |v| v.starts_with("in ")));
    }

    #[tokio::test]
    async fn unknown_learner_has_no_pages() {
        let journal = JournalStore::new(Arc::new(InMemoryJournalRepository::new()));
        let cache = WordCache::new(Arc::new(MockDictionary::new()), CacheConfig::default());

        let pages = render_journal_page(&journal, &cache, &LearnerId::from("nobody"), 0, 10)
            .await
            .unwrap();

        assert!(pages.is_empty());
    }
}
