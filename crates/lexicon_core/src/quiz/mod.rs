pub mod engine;
pub mod question;
pub mod session;

pub use engine::{EngineConfig, QuestionKind, QuizEngine, RateOutcome};
pub use question::Question;
pub use session::{QuizSession, QuizState, SessionSnapshot};
