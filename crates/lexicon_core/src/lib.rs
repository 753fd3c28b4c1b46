pub mod domain;
pub mod error;
pub mod journal;
pub mod memory;
pub mod pages;
pub mod ports;
pub mod quiz;
pub mod scheduler;
pub mod testing;
pub mod word_cache;

pub use domain::{
    normalize_word, CachedWordEntry, ChatTarget, Control, JournalEntry, LearnerId, MessageHandle,
    Page, PageField, Sense, SenseRef, SessionId,
};
pub use error::{CoreError, CoreResult};
pub use journal::JournalStore;
pub use memory::InMemoryJournalRepository;
pub use ports::{ChatPresenter, DictionaryService, JournalRepository, PortError, PortResult};
pub use quiz::{EngineConfig, Question, QuestionKind, QuizEngine, QuizState, RateOutcome};
pub use word_cache::{CacheConfig, WordCache};
