pub mod middleware;
pub mod presenter;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_learner;
pub use rest::{add_word_handler, journal_page_handler, word_handler};
pub use ws_handler::ws_handler;
