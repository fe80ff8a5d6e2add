//! SQLite store.
//!
//! One database holds two tables whose names come from
//! [`TableNameManager`]:
//! - `{env}_{layer}_transcripts` — one row per session, messages as JSON
//! - `{env}_{layer}_agent_runs` — one row per agent invocation

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reagent_config::{TableName, TableNameManager};
use reagent_core::error::StoreError;
use reagent_core::message::{Message, SessionId, Transcript};
use reagent_core::store::{
    AgentRun, AgentRunCreate, AgentRunFinish, RunStatus, RunStore, TranscriptStore,
    TranscriptSummary,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite-backed [`TranscriptStore`] and [`RunStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    transcripts: String,
    runs: String,
}

/// The database file behind a `sqlite:` URL, if it has one.
pub(crate) fn file_path(url: &str) -> Option<PathBuf> {
    if url.contains(":memory:") || url.contains("mode=memory") {
        return None;
    }
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Fixed-width RFC3339 so text ordering matches time ordering.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("{column} '{value}': {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Storage(format!("{what} serialization: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::InvalidRecord(format!("{what}: {e}")))
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// In-memory URLs (`sqlite::memory:`) use a single pinned connection,
    /// since every SQLite connection gets its own private memory database.
    pub async fn new(url: &str, pool_size: u32, tables: TableNameManager) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool_options = if file_path(url).is_some() {
            SqlitePoolOptions::new().max_connections(pool_size.max(1))
        } else {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool, tables).await?;
        info!(transcripts = %store.transcripts, runs = %store.runs, "SQLite store initialized");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool, tables: TableNameManager) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            transcripts: tables.get(TableName::Transcripts),
            runs: tables.get(TableName::AgentRuns),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn transcripts_table(&self) -> &str {
        &self.transcripts
    }

    pub fn runs_table(&self) -> &str {
        &self.runs
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let transcripts = &self.transcripts;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {transcripts} (
                id            TEXT PRIMARY KEY NOT NULL,
                messages      TEXT NOT NULL DEFAULT '[]',
                message_count INTEGER NOT NULL DEFAULT 0,
                metadata      TEXT NOT NULL DEFAULT '{{}}',
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("{transcripts} table: {e}")))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{transcripts}_updated_at ON {transcripts}(updated_at DESC)"
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("{transcripts} index: {e}")))?;

        let runs = &self.runs;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {runs} (
                run_id            TEXT PRIMARY KEY NOT NULL CHECK (length(run_id) <= 36),
                agent_type        TEXT NOT NULL DEFAULT 'react' CHECK (length(agent_type) <= 50),
                input_text        TEXT NOT NULL,
                output_text       TEXT,
                status            TEXT NOT NULL CHECK (status IN ('running', 'success', 'error')),
                error_message     TEXT,
                latency_ms        INTEGER,
                prompt_tokens     INTEGER,
                completion_tokens INTEGER,
                total_tokens      INTEGER,
                session_id        TEXT,
                metadata          TEXT NOT NULL DEFAULT '{{}}',
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("{runs} table: {e}")))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{runs}_created_at ON {runs}(created_at DESC)"
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("{runs} index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_run(row: &SqliteRow) -> Result<AgentRun, StoreError> {
        let status: String = column(row, "status")?;
        let metadata: String = column(row, "metadata")?;
        let created_at: String = column(row, "created_at")?;
        let updated_at: String = column(row, "updated_at")?;
        let latency_ms: Option<i64> = column(row, "latency_ms")?;
        let token = |name: &str| -> Result<Option<u32>, StoreError> {
            let value: Option<i64> = column(row, name)?;
            Ok(value.map(|v| v.clamp(0, i64::from(u32::MAX)) as u32))
        };

        Ok(AgentRun {
            run_id: column(row, "run_id")?,
            agent_type: column(row, "agent_type")?,
            input_text: column(row, "input_text")?,
            output_text: column(row, "output_text")?,
            status: status.parse::<RunStatus>()?,
            error_message: column(row, "error_message")?,
            latency_ms: latency_ms.map(|v| v.max(0) as u64),
            prompt_tokens: token("prompt_tokens")?,
            completion_tokens: token("completion_tokens")?,
            total_tokens: token("total_tokens")?,
            session_id: column(row, "session_id")?,
            metadata: from_json("run metadata", &metadata)?,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })
    }
}

#[async_trait]
impl TranscriptStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, transcript: &Transcript) -> Result<(), StoreError> {
        let messages = to_json("messages", &transcript.messages())?;
        let metadata = to_json("transcript metadata", &transcript.metadata)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, messages, message_count, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                messages = excluded.messages,
                message_count = excluded.message_count,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
            self.transcripts
        ))
        .bind(transcript.id().as_str())
        .bind(&messages)
        .bind(transcript.len() as i64)
        .bind(&metadata)
        .bind(timestamp(transcript.created_at()))
        .bind(timestamp(transcript.updated_at()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Transcript upsert failed: {e}")))?;

        debug!(session_id = %transcript.id(), messages = transcript.len(), "Saved transcript");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Transcript>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT id, messages, metadata, created_at, updated_at FROM {} WHERE id = ?1",
            self.transcripts
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Transcript load: {e}")))?;

        let Some(row) = row else { return Ok(None) };

        let messages: String = column(&row, "messages")?;
        let metadata: String = column(&row, "metadata")?;
        let created_at: String = column(&row, "created_at")?;
        let updated_at: String = column(&row, "updated_at")?;

        let mut transcript = Transcript::restore(
            id.clone(),
            from_json::<Vec<Message>>("messages", &messages)?,
            parse_timestamp("created_at", &created_at)?,
            parse_timestamp("updated_at", &updated_at)?,
        );
        transcript.metadata = from_json("transcript metadata", &metadata)?;
        Ok(Some(transcript))
    }

    async fn list(&self, limit: usize) -> Result<Vec<TranscriptSummary>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT id, message_count, created_at, updated_at FROM {} \
             ORDER BY updated_at DESC, rowid DESC LIMIT ?1",
            self.transcripts
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Transcript list: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = column(row, "id")?;
                let count: i64 = column(row, "message_count")?;
                let created_at: String = column(row, "created_at")?;
                let updated_at: String = column(row, "updated_at")?;
                Ok(TranscriptSummary {
                    id: SessionId(id),
                    message_count: count.max(0) as usize,
                    created_at: parse_timestamp("created_at", &created_at)?,
                    updated_at: parse_timestamp("updated_at", &updated_at)?,
                })
            })
            .collect()
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.transcripts))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Transcript delete: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn create(&self, run: AgentRunCreate) -> Result<AgentRun, StoreError> {
        run.validate()?;
        let record = AgentRun::from_create(run);
        let metadata = to_json("run metadata", &record.metadata)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (run_id, agent_type, input_text, status, session_id, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            self.runs
        ))
        .bind(&record.run_id)
        .bind(&record.agent_type)
        .bind(&record.input_text)
        .bind(record.status.as_str())
        .bind(record.session_id.as_deref())
        .bind(&metadata)
        .bind(timestamp(record.created_at))
        .bind(timestamp(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::InvalidRecord(format!("run '{}' already exists", record.run_id))
            }
            _ => StoreError::Storage(format!("Run insert failed: {e}")),
        })?;

        debug!(run_id = %record.run_id, "Created run record");
        Ok(record)
    }

    async fn finish(&self, run_id: &str, finish: AgentRunFinish) -> Result<AgentRun, StoreError> {
        let mut run = self
            .get(run_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run '{run_id}'")))?;
        run.apply(finish);

        sqlx::query(&format!(
            r#"
            UPDATE {} SET
                status = ?2,
                output_text = ?3,
                error_message = ?4,
                latency_ms = ?5,
                prompt_tokens = ?6,
                completion_tokens = ?7,
                total_tokens = ?8,
                updated_at = ?9
            WHERE run_id = ?1
            "#,
            self.runs
        ))
        .bind(&run.run_id)
        .bind(run.status.as_str())
        .bind(run.output_text.as_deref())
        .bind(run.error_message.as_deref())
        .bind(run.latency_ms.map(|v| v.min(i64::MAX as u64) as i64))
        .bind(run.prompt_tokens.map(i64::from))
        .bind(run.completion_tokens.map(i64::from))
        .bind(run.total_tokens.map(i64::from))
        .bind(timestamp(run.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Run update failed: {e}")))?;

        debug!(run_id, status = %run.status, "Finished run record");
        Ok(run)
    }

    async fn get(&self, run_id: &str) -> Result<Option<AgentRun>, StoreError> {
        let row = sqlx::query(&format!("SELECT * FROM {} WHERE run_id = ?1", self.runs))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Run lookup: {e}")))?;
        row.as_ref().map(Self::row_to_run).transpose()
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AgentRun>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM {} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            self.runs
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Recent runs: {e}")))?;

        rows.iter().map(Self::row_to_run).collect()
    }
}
