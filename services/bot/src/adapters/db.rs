//! services/bot/src/adapters/db.rs
//!
//! PostgreSQL implementation of the `JournalRepository` port. One row per
//! (learner, word); saves are upserts on that key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lexicon_core::{JournalEntry, JournalRepository, LearnerId, PortError, PortResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `JournalRepository` port.
#[derive(Clone)]
pub struct PgJournalRepository {
    pool: PgPool,
}

impl PgJournalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Database Record Struct
//=========================================================================================

const ENTRY_COLUMNS: &str = "learner_id, word, definition_index, time_added, next_practice, \
     repetitions, ease_factor, interval_days, quality_history";

#[derive(FromRow)]
struct JournalEntryRecord {
    learner_id: String,
    word: String,
    definition_index: i32,
    time_added: DateTime<Utc>,
    next_practice: DateTime<Utc>,
    repetitions: i32,
    ease_factor: f64,
    interval_days: i32,
    quality_history: Vec<i32>,
}

impl JournalEntryRecord {
    fn to_domain(self) -> JournalEntry {
        JournalEntry {
            learner_id: LearnerId(self.learner_id),
            word: self.word,
            definition_index: self.definition_index.max(0) as usize,
            time_added: self.time_added,
            next_practice: self.next_practice,
            repetitions: self.repetitions.max(0) as u32,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days.max(0) as u32,
            quality_history: self.quality_history,
        }
    }
}

fn to_i32(value: impl TryInto<i32>, column: &str) -> PortResult<i32> {
    value
        .try_into()
        .map_err(|_| PortError::Unexpected(format!("{} is out of range", column)))
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Connection-level failures are worth retrying; everything else is not.
fn map_db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Unavailable(e.to_string())
        }
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `JournalRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl JournalRepository for PgJournalRepository {
    async fn learner_exists(&self, learner_id: &LearnerId) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM journal_entries WHERE learner_id = $1)",
        )
        .bind(learner_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_entries(
        &self,
        learner_id: &LearnerId,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE learner_id = $1 \
             ORDER BY next_practice ASC, word ASC OFFSET $2 LIMIT $3",
            ENTRY_COLUMNS
        );
        let records = sqlx::query_as::<_, JournalEntryRecord>(&sql)
            .bind(learner_id.as_str())
            .bind(to_i64(offset))
            .bind(to_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn due_entries(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> PortResult<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE learner_id = $1 AND next_practice <= $2 \
             ORDER BY next_practice ASC, word ASC LIMIT $3",
            ENTRY_COLUMNS
        );
        let records = sqlx::query_as::<_, JournalEntryRecord>(&sql)
            .bind(learner_id.as_str())
            .bind(now)
            .bind(to_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_entry(&self, learner_id: &LearnerId, word: &str) -> PortResult<Option<JournalEntry>> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE learner_id = $1 AND word = $2",
            ENTRY_COLUMNS
        );
        let record = sqlx::query_as::<_, JournalEntryRecord>(&sql)
            .bind(learner_id.as_str())
            .bind(word)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn save_entry(&self, entry: &JournalEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO journal_entries (learner_id, word, definition_index, time_added, \
             next_practice, repetitions, ease_factor, interval_days, quality_history) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (learner_id, word) DO UPDATE SET \
             definition_index = EXCLUDED.definition_index, \
             next_practice = EXCLUDED.next_practice, \
             repetitions = EXCLUDED.repetitions, \
             ease_factor = EXCLUDED.ease_factor, \
             interval_days = EXCLUDED.interval_days, \
             quality_history = EXCLUDED.quality_history",
        )
        .bind(entry.learner_id.as_str())
        .bind(&entry.word)
        .bind(to_i32(entry.definition_index, "definition_index")?)
        .bind(entry.time_added)
        .bind(entry.next_practice)
        .bind(to_i32(entry.repetitions, "repetitions")?)
        .bind(entry.ease_factor)
        .bind(to_i32(entry.interval_days, "interval_days")?)
        .bind(entry.quality_history.clone())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }
}
