//! services/bot/src/bin/bot.rs

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware as axum_middleware,
    routing::get,
    Router,
};
use bot_lib::{
    adapters::{HttpDictionaryAdapter, PgJournalRepository},
    config::Config,
    error::BotError,
    web::{
        add_word_handler, journal_page_handler, middleware::LEARNER_HEADER,
        presenter::WsPresenter, require_learner, rest::ApiDoc, state::AppState, word_handler,
        ws_handler,
    },
};
use lexicon_core::{
    CacheConfig, EngineConfig, InMemoryJournalRepository, JournalRepository, JournalStore,
    QuizEngine, WordCache,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting bot...");

    // --- 2. Journal Storage ---
    let repository: Arc<dyn JournalRepository> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let repository = PgJournalRepository::new(db_pool);
            info!("Running database migrations...");
            repository.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(repository)
        }
        None => {
            warn!("DATABASE_URL is not set; the journal is kept in memory only.");
            Arc::new(InMemoryJournalRepository::new())
        }
    };
    let journal = Arc::new(JournalStore::new(repository));

    // --- 3. Dictionary & Word Cache ---
    let dictionary = Arc::new(HttpDictionaryAdapter::new(&config.dictionary_api_url)?);
    let cache = WordCache::new(
        dictionary,
        CacheConfig {
            ttl: Some(config.word_cache_ttl),
            capacity: Some(config.word_cache_capacity),
        },
    );

    // --- 4. Quiz Engine ---
    let presenter = Arc::new(WsPresenter::new());
    let engine = Arc::new(QuizEngine::new(
        journal.clone(),
        cache.clone(),
        presenter.clone(),
        EngineConfig {
            idle_timeout: config.session_idle_timeout,
        },
    ));

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_idle_sessions(
        engine.clone(),
        cache.clone(),
        sweep_period(config.session_idle_timeout),
        shutdown.clone(),
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        journal,
        cache,
        engine,
        presenter,
    });

    // --- 6. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(LEARNER_HEADER)]);

    let public_routes = Router::new().route("/words/{word}", get(word_handler));

    let learner_routes = Router::new()
        .route("/journal", get(journal_page_handler).post(add_word_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn(require_learner));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(learner_routes)
        .layer(cors)
        .with_state(app_state);

    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Idle session sweeper ended abnormally: {}", e);
    }
    info!("Bot stopped.");
    Ok(())
}

/// Sweeps a few times per idle timeout, but never more than once a second.
fn sweep_period(idle_timeout: Duration) -> Duration {
    (idle_timeout / 4).max(Duration::from_secs(1))
}

/// Periodically evicts abandoned quiz sessions until `shutdown` fires, reporting
/// the word cache counters along the way.
async fn sweep_idle_sessions(
    engine: Arc<QuizEngine>,
    cache: WordCache,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = engine.evict_idle().await;
                if evicted > 0 {
                    info!("Evicted {} idle quiz session(s); {} still live", evicted, engine.live_sessions());
                }
                let stats = cache.stats();
                debug!(
                    "Word cache: {} entries, {} hits, {} misses, {} fetches, {} evictions",
                    cache.len(),
                    stats.hits,
                    stats.misses,
                    stats.fetches,
                    stats.evictions
                );
            }
        }
    }
}
