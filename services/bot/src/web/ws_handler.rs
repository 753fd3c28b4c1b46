//! services/bot/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! The connection is registered as a chat target, quiz pages flow out through
//! its outbox, and control presses flow back into the quiz engine.

use crate::web::{
    presenter::Outbox,
    protocol::{ClientMessage, PageDto, ServerMessage},
    rest::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use lexicon_core::{pages::render_journal_page, ChatTarget, CoreError, LearnerId, SessionId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(learner_id): Extension<LearnerId>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, learner_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, learner_id: LearnerId) {
    let (sender, mut receiver) = socket.split();
    let (target, outbox) = app_state.presenter.register();
    info!(
        "New WebSocket connection {} established for learner {}",
        target.0, learner_id
    );

    // --- 1. Writer Task ---
    let writer = tokio::spawn(forward_outbox(outbox, sender));

    reply(
        &app_state,
        &target,
        ServerMessage::Connected {
            connection_id: target.0.clone(),
            learner_id: learner_id.to_string(),
        },
    );

    // --- 2. Main Message Loop ---
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &learner_id, &target).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error on {}: {}", target.0, e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    app_state.presenter.unregister(&target);
    writer.abort();
    info!("WebSocket connection {} closed.", target.0);
}

/// Serializes queued frames onto the socket until either side goes away.
async fn forward_outbox(mut outbox: Outbox, mut sender: SplitSink<WebSocket, Message>) {
    while let Some(message) = outbox.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            warn!("Failed to send frame; client went away.");
            break;
        }
    }
}

fn reply(app_state: &AppState, target: &ChatTarget, message: ServerMessage) {
    if let Err(e) = app_state.presenter.send(target, message) {
        warn!("Dropped reply to {}: {}", target.0, e);
    }
}

/// Reports a failed event. `LookupFailed` from a quiz event means the event was
/// applied but its page could not be built.
fn reply_error(app_state: &AppState, target: &ChatTarget, e: &CoreError) {
    match e {
        CoreError::PersistenceFailure(_) => error!("Quiz event failed: {}", e),
        _ => warn!("Quiz event rejected: {}", e),
    }
    reply(
        app_state,
        target,
        ServerMessage::Error {
            message: e.to_string(),
        },
    );
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    learner_id: &LearnerId,
    target: &ChatTarget,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            reply(
                app_state,
                target,
                ServerMessage::Error {
                    message: format!("Unrecognized message: {}", e),
                },
            );
            return;
        }
    };

    match client_msg {
        ClientMessage::StartQuiz { size, kind } => {
            let size = size.unwrap_or(app_state.config.quiz_size).max(1);
            let questions = match app_state
                .engine
                .review_questions(learner_id, size, kind.into())
                .await
            {
                Ok(questions) if questions.is_empty() => {
                    reply_error(app_state, target, &CoreError::EmptyQuiz);
                    return;
                }
                Ok(questions) => questions,
                Err(e) => {
                    reply_error(app_state, target, &e);
                    return;
                }
            };

            // Announce the session before its first page is rendered.
            let session_id = SessionId::new();
            reply(
                app_state,
                target,
                ServerMessage::QuizStarted {
                    session_id: session_id.0,
                },
            );
            if let Err(e) = app_state
                .engine
                .start_as(session_id, learner_id.clone(), target.clone(), questions)
                .await
            {
                reply_error(app_state, target, &e);
            }
        }
        ClientMessage::Reveal { session_id } => {
            if let Err(e) = app_state
                .engine
                .reveal(learner_id, SessionId(session_id))
                .await
            {
                reply_error(app_state, target, &e);
            }
        }
        ClientMessage::Rate {
            session_id,
            quality,
        } => {
            if let Err(e) = app_state
                .engine
                .rate(learner_id, SessionId(session_id), quality)
                .await
            {
                reply_error(app_state, target, &e);
            }
        }
        ClientMessage::JournalPage { page, page_size } => {
            let page_size = page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE);
            match render_journal_page(
                &app_state.journal,
                &app_state.cache,
                learner_id,
                page,
                page_size,
            )
            .await
            {
                Ok(pages) => reply(
                    app_state,
                    target,
                    ServerMessage::Journal {
                        page,
                        entries: pages.iter().map(PageDto::from).collect(),
                    },
                ),
                Err(e) => reply_error(app_state, target, &e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_DICTIONARY_API_URL};
    use crate::web::presenter::WsPresenter;
    use lexicon_core::testing::MockDictionary;
    use lexicon_core::{
        CacheConfig, EngineConfig, InMemoryJournalRepository, JournalStore, QuizEngine, WordCache,
    };
    use std::time::Duration;
    use tracing::Level;

    fn test_state(dictionary: Arc<MockDictionary>) -> Arc<AppState> {
        let config = Arc::new(Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            log_level: Level::INFO,
            dictionary_api_url: DEFAULT_DICTIONARY_API_URL.to_string(),
            word_cache_ttl: Duration::from_secs(60),
            word_cache_capacity: 100,
            session_idle_timeout: Duration::from_secs(600),
            quiz_size: 10,
        });
        let journal = Arc::new(JournalStore::new(Arc::new(InMemoryJournalRepository::new())));
        let cache = WordCache::new(dictionary, CacheConfig::default());
        let presenter = Arc::new(WsPresenter::new());
        let engine = Arc::new(QuizEngine::new(
            journal.clone(),
            cache.clone(),
            presenter.clone(),
            EngineConfig::default(),
        ));
        Arc::new(AppState {
            config,
            journal,
            cache,
            engine,
            presenter,
        })
    }

    fn drain(outbox: &mut Outbox) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbox.try_recv() {
            frames.push(frame);
        }
        frames
    }

    async fn saved_apple(dictionary: Arc<MockDictionary>) -> (Arc<AppState>, LearnerId) {
        let state = test_state(dictionary);
        let learner = LearnerId::from("learner-1");
        state.journal.add_word(&learner, "apple", 0).await.unwrap();
        (state, learner)
    }

    #[tokio::test]
    async fn quiz_started_precedes_first_page() {
        let dictionary =
            Arc::new(MockDictionary::new().with_word("apple", &[("noun", "A round fruit")]));
        let (state, learner) = saved_apple(dictionary).await;
        let (target, mut outbox) = state.presenter.register();

        handle_text_message(r#"{"type":"start_quiz"}"#, &state, &learner, &target).await;

        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 2, "unexpected frames {:?}", frames);
        let ServerMessage::QuizStarted { session_id } = &frames[0] else {
            panic!("expected quiz_started first, got {:?}", frames[0]);
        };
        let ServerMessage::Render { page, .. } = &frames[1] else {
            panic!("expected a render frame, got {:?}", frames[1]);
        };
        assert_eq!(page.title, "apple");
        assert_eq!(
            state.engine.session(&learner).await.map(|s| s.id.0),
            Some(*session_id)
        );
    }

    #[tokio::test]
    async fn unreachable_answer_is_reported_to_the_client() {
        let dictionary = Arc::new(MockDictionary::new());
        dictionary.set_offline(true);
        let (state, learner) = saved_apple(dictionary).await;
        let (target, mut outbox) = state.presenter.register();

        handle_text_message(r#"{"type":"start_quiz"}"#, &state, &learner, &target).await;
        let session_id = match drain(&mut outbox).first() {
            Some(ServerMessage::QuizStarted { session_id }) => *session_id,
            other => panic!("expected quiz_started, got {:?}", other),
        };

        let reveal = format!(r#"{{"type":"reveal","session_id":"{}"}}"#, session_id);
        handle_text_message(&reveal, &state, &learner, &target).await;

        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 1, "unexpected frames {:?}", frames);
        assert!(matches!(&frames[0], ServerMessage::Error { message } if message.contains("apple")));
    }

    #[tokio::test]
    async fn unreachable_first_prompt_follows_announcement_with_error() {
        let dictionary = Arc::new(MockDictionary::new());
        dictionary.set_offline(true);
        let (state, learner) = saved_apple(dictionary).await;
        let (target, mut outbox) = state.presenter.register();

        handle_text_message(
            r#"{"type":"start_quiz","kind":"recall"}"#,
            &state,
            &learner,
            &target,
        )
        .await;

        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 2, "unexpected frames {:?}", frames);
        assert!(matches!(frames[0], ServerMessage::QuizStarted { .. }));
        assert!(matches!(frames[1], ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn empty_journal_is_not_announced() {
        let state = test_state(Arc::new(MockDictionary::new()));
        let learner = LearnerId::from("learner-1");
        let (target, mut outbox) = state.presenter.register();

        handle_text_message(r#"{"type":"start_quiz"}"#, &state, &learner, &target).await;

        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 1, "unexpected frames {:?}", frames);
        assert!(matches!(frames[0], ServerMessage::Error { .. }));
        assert_eq!(state.engine.live_sessions(), 0);
    }
}
