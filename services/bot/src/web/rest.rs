//! services/bot/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{FieldDto, PageDto};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use lexicon_core::{pages::render_journal_page, CoreError, JournalEntry, LearnerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        journal_page_handler,
        add_word_handler,
        word_handler,
    ),
    components(
        schemas(
            JournalPageResponse,
            AddWordRequest,
            JournalEntryResponse,
            WordResponse,
            SenseDto,
            PageDto,
            FieldDto
        )
    ),
    tags(
        (name = "Lexicon API", description = "Vocabulary journal and dictionary lookups.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JournalQuery {
    /// Zero-based page number.
    pub page: Option<usize>,
    /// Entries per page, at most 50.
    pub page_size: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct JournalPageResponse {
    pub page: usize,
    pub entries: Vec<PageDto>,
}

/// Saves `word` to the journal, pointing at the sense with `definition_index`.
#[derive(Deserialize, ToSchema)]
pub struct AddWordRequest {
    pub word: String,
    #[serde(default)]
    pub definition_index: usize,
}

#[derive(Serialize, ToSchema)]
pub struct JournalEntryResponse {
    pub word: String,
    pub definition_index: usize,
    pub time_added: DateTime<Utc>,
    pub next_practice: DateTime<Utc>,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
}

impl From<JournalEntry> for JournalEntryResponse {
    fn from(entry: JournalEntry) -> Self {
        Self {
            word: entry.word,
            definition_index: entry.definition_index,
            time_added: entry.time_added,
            next_practice: entry.next_practice,
            repetitions: entry.repetitions,
            ease_factor: entry.ease_factor,
            interval_days: entry.interval_days,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SenseDto {
    pub index: usize,
    pub part_of_speech: String,
    pub definition: String,
}

#[derive(Serialize, ToSchema)]
pub struct WordResponse {
    pub word: String,
    pub fetched_at: DateTime<Utc>,
    pub senses: Vec<SenseDto>,
}

/// Maps a rejected core operation onto an HTTP status.
pub fn core_status(e: &CoreError) -> StatusCode {
    match e {
        CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoreError::SessionExpired(_) => StatusCode::GONE,
        CoreError::LookupFailed { .. } | CoreError::EntryNotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::InvalidQuality(_) | CoreError::EmptyQuiz => StatusCode::BAD_REQUEST,
        CoreError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn rejection(e: CoreError) -> (StatusCode, String) {
    let status = core_status(&e);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// One page of the learner's journal, soonest-due words first.
///
/// Words whose definition cannot currently be looked up are left out.
#[utoipa::path(
    get,
    path = "/journal",
    params(
        JournalQuery,
        ("x-learner-id" = String, Header, description = "The platform id of the learner.")
    ),
    responses(
        (status = 200, description = "Rendered journal page", body = JournalPageResponse),
        (status = 401, description = "Missing x-learner-id header"),
        (status = 503, description = "Journal storage unavailable")
    )
)]
pub async fn journal_page_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(learner_id): Extension<LearnerId>,
    Query(query): Query<JournalQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = query.page.unwrap_or(0);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let pages = render_journal_page(
        &app_state.journal,
        &app_state.cache,
        &learner_id,
        page,
        page_size,
    )
    .await
    .map_err(rejection)?;

    Ok(Json(JournalPageResponse {
        page,
        entries: pages.iter().map(PageDto::from).collect(),
    }))
}

/// Save a word to the learner's journal.
///
/// The word must be known to the dictionary and the chosen sense must exist.
/// Saving a word again keeps its review history.
#[utoipa::path(
    post,
    path = "/journal",
    request_body = AddWordRequest,
    params(
        ("x-learner-id" = String, Header, description = "The platform id of the learner.")
    ),
    responses(
        (status = 201, description = "Word saved", body = JournalEntryResponse),
        (status = 400, description = "The word has no sense with that index"),
        (status = 404, description = "The dictionary does not know the word"),
        (status = 503, description = "Journal storage unavailable")
    )
)]
pub async fn add_word_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(learner_id): Extension<LearnerId>,
    Json(req): Json<AddWordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cached = app_state.cache.get(&req.word).await.map_err(rejection)?;
    if cached.sense(req.definition_index).is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "'{}' has {} sense(s); index {} does not exist",
                cached.word,
                cached.senses.len(),
                req.definition_index
            ),
        ));
    }

    let entry = app_state
        .journal
        .add_word(&learner_id, &cached.word, req.definition_index)
        .await
        .map_err(rejection)?;
    info!("Learner {} saved '{}'", learner_id, entry.word);

    Ok((StatusCode::CREATED, Json(JournalEntryResponse::from(entry))))
}

/// Look up a word's senses through the word cache.
#[utoipa::path(
    get,
    path = "/words/{word}",
    params(
        ("word" = String, Path, description = "The word to look up.")
    ),
    responses(
        (status = 200, description = "Definitions of the word", body = WordResponse),
        (status = 404, description = "The dictionary does not know the word or is unreachable")
    )
)]
pub async fn word_handler(
    State(app_state): State<Arc<AppState>>,
    Path(word): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cached = app_state.cache.get(&word).await.map_err(rejection)?;
    Ok(Json(WordResponse {
        word: cached.word,
        fetched_at: cached.fetched_at,
        senses: cached
            .senses
            .into_iter()
            .map(|s| SenseDto {
                index: s.index,
                part_of_speech: s.part_of_speech,
                definition: s.definition,
            })
            .collect(),
    }))
}
