//! End-to-end quiz flows against the in-process test doubles.
//!
//! Run with: `cargo test -p lexicon_core --test quiz_flow`

use futures::future::join_all;
use lexicon_core::quiz::QuizState;
use lexicon_core::testing::{FlakyRepository, MockDictionary, RecordingPresenter};
use lexicon_core::{
    CacheConfig, ChatTarget, Control, CoreError, EngineConfig, JournalStore, LearnerId, Question,
    QuestionKind, QuizEngine, SenseRef, WordCache,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: QuizEngine,
    journal: Arc<JournalStore>,
    repository: Arc<FlakyRepository>,
    presenter: Arc<RecordingPresenter>,
    dictionary: Arc<MockDictionary>,
    learner: LearnerId,
    target: ChatTarget,
}

const WORDS: [&str; 3] = ["apple", "banana", "cherry"];

async fn harness_with(idle_timeout: Duration) -> Harness {
    let dictionary = Arc::new(
        MockDictionary::new()
            .with_word("apple", &[("noun", "A round fruit")])
            .with_word("banana", &[("noun", "A long yellow fruit")])
            .with_word("cherry", &[("noun", "A small red fruit"), ("adjective", "Bright red")]),
    );
    let repository = Arc::new(FlakyRepository::new());
    let journal = Arc::new(JournalStore::new(repository.clone()));
    let presenter = Arc::new(RecordingPresenter::new());
    let cache = WordCache::new(dictionary.clone(), CacheConfig::default());
    let engine = QuizEngine::new(
        journal.clone(),
        cache,
        presenter.clone(),
        EngineConfig { idle_timeout },
    );

    let learner = LearnerId::from("learner-1");
    for word in WORDS {
        journal.add_word(&learner, word, 0).await.unwrap();
    }

    Harness {
        engine,
        journal,
        repository,
        presenter,
        dictionary,
        learner,
        target: ChatTarget::from("dm-learner-1"),
    }
}

async fn harness() -> Harness {
    harness_with(Duration::from_secs(600)).await
}

fn flashcards() -> Vec<Question> {
    WORDS
        .iter()
        .map(|w| Question::Flashcard(SenseRef { word: w.to_string(), index: 0 }))
        .collect()
}

// =============================================================================
// Full session
// =============================================================================

#[tokio::test]
async fn test_three_question_session_runs_to_completion() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    assert_eq!(h.presenter.last_controls(), vec![Control::Reveal]);

    let mut outcomes = Vec::new();
    for quality in [5, 1, 5] {
        h.engine.reveal(&h.learner, id).await.unwrap();
        assert_eq!(h.presenter.last_controls(), Control::rating_row());
        outcomes.push(h.engine.rate(&h.learner, id, quality).await.unwrap());
    }

    assert_eq!(
        outcomes.iter().map(|o| o.finished).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert!(h.engine.session(&h.learner).await.is_none());
    assert_eq!(h.engine.live_sessions(), 0);

    // The three adds come first, then one save per rating, in order.
    let reviews: Vec<(String, i32)> = h.repository.saves()[WORDS.len()..]
        .iter()
        .map(|e| (e.word.clone(), *e.quality_history.last().unwrap()))
        .collect();
    assert_eq!(
        reviews,
        vec![
            ("apple".to_string(), 5),
            ("banana".to_string(), 1),
            ("cherry".to_string(), 5)
        ]
    );

    let banana = h.journal.get(&h.learner, "banana").await.unwrap().unwrap();
    assert_eq!(banana.repetitions, 0);

    // Only the completion page is left on screen.
    assert_eq!(h.presenter.live_messages(&h.target).len(), 1);
    assert_eq!(h.presenter.last_page().unwrap().title, "Quiz complete");
    assert!(h.presenter.last_controls().is_empty());
}

#[tokio::test]
async fn test_at_most_one_message_on_screen() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    h.engine.reveal(&h.learner, id).await.unwrap();
    assert_eq!(h.presenter.live_messages(&h.target).len(), 1);
    h.engine.rate(&h.learner, id, 4).await.unwrap();
    assert_eq!(h.presenter.live_messages(&h.target).len(), 1);
    assert_eq!(h.presenter.last_page().unwrap().title, "banana");
}

// =============================================================================
// Transition rules
// =============================================================================

#[tokio::test]
async fn test_rate_before_reveal_is_rejected() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    let result = h.engine.rate(&h.learner, id, 5).await;

    assert!(matches!(
        result,
        Err(CoreError::InvalidTransition { event: "rate", .. })
    ));
    let snapshot = h.engine.session(&h.learner).await.unwrap();
    assert_eq!(snapshot.state, QuizState::AwaitingReveal);
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(h.repository.saves().len(), WORDS.len());
}

#[tokio::test]
async fn test_double_reveal_is_rejected() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    h.engine.reveal(&h.learner, id).await.unwrap();
    let result = h.engine.reveal(&h.learner, id).await;

    assert!(matches!(
        result,
        Err(CoreError::InvalidTransition { event: "reveal", .. })
    ));
    let snapshot = h.engine.session(&h.learner).await.unwrap();
    assert_eq!(snapshot.state, QuizState::AwaitingRating);
}

#[tokio::test]
async fn test_out_of_range_rating_keeps_waiting() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    h.engine.reveal(&h.learner, id).await.unwrap();

    assert_eq!(
        h.engine.rate(&h.learner, id, 6).await,
        Err(CoreError::InvalidQuality(6))
    );
    assert_eq!(
        h.engine.session(&h.learner).await.unwrap().state,
        QuizState::AwaitingRating
    );

    let outcome = h.engine.rate(&h.learner, id, 3).await.unwrap();
    assert_eq!(outcome.entry.word, "apple");
}

#[tokio::test]
async fn test_empty_quiz_is_rejected() {
    let h = harness().await;
    let result = h.engine.start(h.learner.clone(), h.target.clone(), Vec::new()).await;
    assert_eq!(result, Err(CoreError::EmptyQuiz));
    assert_eq!(h.engine.live_sessions(), 0);
}

// =============================================================================
// Session replacement and expiry
// =============================================================================

#[tokio::test]
async fn test_new_session_replaces_old_one() {
    let h = harness().await;
    let first = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    let second = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    assert_eq!(
        h.engine.reveal(&h.learner, first).await,
        Err(CoreError::SessionExpired(first))
    );
    h.engine.reveal(&h.learner, second).await.unwrap();

    assert_eq!(h.engine.live_sessions(), 1);
    assert_eq!(h.engine.session(&h.learner).await.unwrap().id, second);
    assert_eq!(h.presenter.live_messages(&h.target).len(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_session() {
    let h = harness().await;

    let ids = join_all(
        (0..10).map(|_| h.engine.start(h.learner.clone(), h.target.clone(), flashcards())),
    )
    .await;

    assert!(ids.iter().all(|r| r.is_ok()));
    assert_eq!(h.engine.live_sessions(), 1);
    assert_eq!(h.presenter.live_messages(&h.target).len(), 1);

    let live = h.engine.session(&h.learner).await.unwrap().id;
    let expired = ids
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|id| *id != live)
        .count();
    assert_eq!(expired, 9);
}

#[tokio::test]
async fn test_idle_session_expires_on_next_event() {
    let h = harness_with(Duration::from_millis(50)).await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(
        h.engine.reveal(&h.learner, id).await,
        Err(CoreError::SessionExpired(id))
    );
    assert_eq!(h.engine.live_sessions(), 0);
    assert!(h.presenter.live_messages(&h.target).is_empty());
}

#[tokio::test]
async fn test_sweep_evicts_only_idle_sessions() {
    let h = harness_with(Duration::from_millis(50)).await;
    h.engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let other = LearnerId::from("learner-2");
    h.journal.add_word(&other, "apple", 0).await.unwrap();
    h.engine
        .start_review(other.clone(), ChatTarget::from("dm-2"), 5, QuestionKind::Flashcard)
        .await
        .unwrap();

    assert_eq!(h.engine.evict_idle().await, 1);
    assert!(h.engine.session(&h.learner).await.is_none());
    assert!(h.engine.session(&other).await.is_some());
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_persistence_failure_keeps_state_for_retry() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    h.engine.reveal(&h.learner, id).await.unwrap();

    h.repository.fail_next_saves(2);
    let result = h.engine.rate(&h.learner, id, 4).await;

    assert!(matches!(result, Err(CoreError::PersistenceFailure(_))));
    let snapshot = h.engine.session(&h.learner).await.unwrap();
    assert_eq!(snapshot.state, QuizState::AwaitingRating);
    assert_eq!(snapshot.current_index, 0);

    let outcome = h.engine.rate(&h.learner, id, 4).await.unwrap();
    assert_eq!(outcome.entry.repetitions, 1);
    assert_eq!(h.engine.session(&h.learner).await.unwrap().current_index, 1);
}

#[tokio::test]
async fn test_render_failure_does_not_roll_back() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    h.presenter.set_failing(true);
    h.engine.reveal(&h.learner, id).await.unwrap();

    assert_eq!(
        h.engine.session(&h.learner).await.unwrap().state,
        QuizState::AwaitingRating
    );
}

#[tokio::test]
async fn test_lookup_failure_skips_render_but_commits_reveal() {
    let h = harness().await;
    h.dictionary.set_offline(true);
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    let renders_before = h.presenter.pages().len();

    let result = h.engine.reveal(&h.learner, id).await;
    assert!(
        matches!(&result, Err(CoreError::LookupFailed { word, .. }) if word == "apple"),
        "unexpected result {:?}",
        result
    );

    // Nothing new was drawn; the prompt stays on screen.
    assert_eq!(h.presenter.pages().len(), renders_before);
    let page = h.presenter.last_page().unwrap();
    assert_eq!(page.title, "apple");
    assert_eq!(h.presenter.last_controls(), Control::reveal_row());

    // The reveal still counted, so the learner can rate.
    assert_eq!(
        h.engine.session(&h.learner).await.unwrap().state,
        QuizState::AwaitingRating
    );
    assert_eq!(
        h.engine.reveal(&h.learner, id).await,
        Err(CoreError::InvalidTransition {
            event: "reveal",
            state: "awaiting rating"
        })
    );
    let outcome = h.engine.rate(&h.learner, id, 2).await.unwrap();
    assert!(!outcome.finished);
    assert_eq!(h.presenter.last_page().unwrap().title, "banana");
}

#[tokio::test]
async fn test_missing_sense_reports_lookup_failure() {
    let h = harness().await;
    let questions = vec![Question::Flashcard(SenseRef {
        word: "apple".to_string(),
        index: 7,
    })];
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), questions)
        .await
        .unwrap();

    let result = h.engine.reveal(&h.learner, id).await;
    assert_eq!(
        result,
        Err(CoreError::LookupFailed {
            word: "apple".to_string(),
            reason: "sense 7 no longer exists".to_string(),
        })
    );
    assert_eq!(h.presenter.last_page().unwrap().title, "apple");

    let outcome = h.engine.rate(&h.learner, id, 4).await.unwrap();
    assert!(outcome.finished);
}

#[tokio::test]
async fn test_unreachable_first_prompt_still_opens_session() {
    let h = harness().await;
    h.dictionary.set_offline(true);

    let result = h
        .engine
        .start_review(h.learner.clone(), h.target.clone(), 10, QuestionKind::Recall)
        .await;
    assert!(matches!(result, Err(CoreError::LookupFailed { .. })));
    assert!(h.presenter.last_page().is_none());

    let snapshot = h.engine.session(&h.learner).await.unwrap();
    assert_eq!(snapshot.state, QuizState::AwaitingReveal);
    assert_eq!(snapshot.total, 3);

    // Once the dictionary is back the learner can carry on.
    h.dictionary.set_offline(false);
    h.engine.reveal(&h.learner, snapshot.id).await.unwrap();
    assert!(h.presenter.last_page().is_some());
}

#[tokio::test]
async fn test_quiz_over_unsaved_word_is_rejected() {
    let h = harness().await;
    let mut questions = flashcards();
    questions.push(Question::Flashcard(SenseRef {
        word: "pear".to_string(),
        index: 0,
    }));

    let result = h
        .engine
        .start(h.learner.clone(), h.target.clone(), questions)
        .await;
    assert_eq!(
        result,
        Err(CoreError::EntryNotFound {
            learner_id: h.learner.clone(),
            word: "pear".to_string(),
        })
    );
    assert!(h.engine.session(&h.learner).await.is_none());
    assert!(h.presenter.pages().is_empty());
}

#[tokio::test]
async fn test_quiz_over_unsaved_word_keeps_previous_session() {
    let h = harness().await;
    let id = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();

    let pear = vec![Question::Flashcard(SenseRef {
        word: "pear".to_string(),
        index: 0,
    })];
    let result = h.engine.start(h.learner.clone(), h.target.clone(), pear).await;
    assert!(matches!(result, Err(CoreError::EntryNotFound { .. })));

    assert_eq!(h.engine.session(&h.learner).await.unwrap().id, id);
    h.engine.reveal(&h.learner, id).await.unwrap();
}

// =============================================================================
// Review quizzes from the journal
// =============================================================================

#[tokio::test]
async fn test_review_quiz_uses_due_words() {
    let h = harness().await;
    h.journal.record_review(&h.learner, "banana", 5).await.unwrap();

    let id = h
        .engine
        .start_review(h.learner.clone(), h.target.clone(), 10, QuestionKind::Recall)
        .await
        .unwrap();

    let snapshot = h.engine.session(&h.learner).await.unwrap();
    assert_eq!(snapshot.id, id);
    // banana is scheduled for tomorrow.
    assert_eq!(snapshot.total, 2);
    let prompt = h.presenter.last_page().unwrap();
    assert_eq!(prompt.title, "Which word is this?");
}

#[tokio::test]
async fn test_review_quiz_with_nothing_due() {
    let h = harness().await;
    let result = h
        .engine
        .start_review(LearnerId::from("new-learner"), h.target.clone(), 10, QuestionKind::Flashcard)
        .await;
    assert_eq!(result, Err(CoreError::EmptyQuiz));
}

#[tokio::test]
async fn test_learners_do_not_block_each_other() {
    let h = harness().await;
    let other = LearnerId::from("learner-2");
    for word in WORDS {
        h.journal.add_word(&other, word, 0).await.unwrap();
    }

    let first = h
        .engine
        .start(h.learner.clone(), h.target.clone(), flashcards())
        .await
        .unwrap();
    let second = h
        .engine
        .start(other.clone(), ChatTarget::from("dm-2"), flashcards())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.engine.reveal(&h.learner, first),
        h.engine.reveal(&other, second)
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.engine.live_sessions(), 2);

    let (a, b) = tokio::join!(
        h.engine.rate(&h.learner, first, 5),
        h.engine.rate(&other, second, 0)
    );
    assert_eq!(a.unwrap().entry.repetitions, 1);
    assert_eq!(b.unwrap().entry.repetitions, 0);
}
