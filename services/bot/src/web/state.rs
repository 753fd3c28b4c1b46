//! services/bot/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::presenter::WsPresenter;
use lexicon_core::{JournalStore, QuizEngine, WordCache};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub journal: Arc<JournalStore>,
    pub cache: WordCache,
    pub engine: Arc<QuizEngine>,
    pub presenter: Arc<WsPresenter>,
}
