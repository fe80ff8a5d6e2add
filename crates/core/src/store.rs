//! Persistence contracts — transcripts and run records.
//!
//! The loop only ever calls these traits. Implementations: in-memory (for
//! tests and ephemeral runs) and SQLite, both in `reagent-store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{SessionId, Transcript};
use crate::provider::Usage;

/// Maximum length of a run id (a UUID string).
pub const MAX_RUN_ID_LEN: usize = 36;
/// Maximum length of an agent type label.
pub const MAX_AGENT_TYPE_LEN: usize = 50;

/// Summary row returned by [`TranscriptStore::list`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: SessionId,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transcript> for TranscriptSummary {
    fn from(t: &Transcript) -> Self {
        Self {
            id: t.id().clone(),
            message_count: t.len(),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
        }
    }
}

/// Stores whole session transcripts keyed by session id.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Insert or replace the transcript.
    async fn save(&self, transcript: &Transcript) -> std::result::Result<(), StoreError>;

    /// Load a transcript by id.
    async fn load(&self, id: &SessionId) -> std::result::Result<Option<Transcript>, StoreError>;

    /// Most recently updated transcripts first.
    async fn list(&self, limit: usize) -> std::result::Result<Vec<TranscriptSummary>, StoreError>;

    /// Delete a transcript. Returns whether one existed.
    async fn delete(&self, id: &SessionId) -> std::result::Result<bool, StoreError>;
}

/// Lifecycle of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(StoreError::InvalidRecord(format!("unknown run status '{other}'"))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunCreate {
    pub run_id: String,
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    pub input_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_agent_type() -> String {
    "react".into()
}

impl AgentRunCreate {
    pub fn new(run_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            agent_type: default_agent_type(),
            input_text: input_text.into(),
            session_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Check field limits before anything is written.
    pub fn validate(&self) -> std::result::Result<(), StoreError> {
        let id_len = self.run_id.chars().count();
        if id_len == 0 || id_len > MAX_RUN_ID_LEN {
            return Err(StoreError::InvalidRecord(format!(
                "run_id must be 1..={MAX_RUN_ID_LEN} characters, got {id_len}"
            )));
        }
        if self.agent_type.chars().count() > MAX_AGENT_TYPE_LEN {
            return Err(StoreError::InvalidRecord(format!(
                "agent_type must be at most {MAX_AGENT_TYPE_LEN} characters"
            )));
        }
        if self.input_text.trim().is_empty() {
            return Err(StoreError::InvalidRecord("input_text must not be empty".into()));
        }
        Ok(())
    }
}

/// Terminal fields written when a run ends.
#[derive(Debug, Clone, Default)]
pub struct AgentRunFinish {
    pub status: Option<RunStatus>,
    pub output_text: Option<String>,
    pub error_message: Option<String>,
    pub latency_ms: Option<u64>,
    pub usage: Option<Usage>,
}

impl AgentRunFinish {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Success),
            output_text: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Error),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// One row per agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub run_id: String,
    pub agent_type: String,
    pub input_text: String,
    pub output_text: Option<String>,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub latency_ms: Option<u64>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRun {
    /// A fresh `running` record built from validated input.
    pub fn from_create(create: AgentRunCreate) -> Self {
        let now = Utc::now();
        Self {
            run_id: create.run_id,
            agent_type: create.agent_type,
            input_text: create.input_text,
            output_text: None,
            status: RunStatus::Running,
            error_message: None,
            latency_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            session_id: create.session_id,
            metadata: create.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply terminal fields; unset fields keep their current value.
    pub fn apply(&mut self, finish: AgentRunFinish) {
        if let Some(status) = finish.status {
            self.status = status;
        }
        if finish.output_text.is_some() {
            self.output_text = finish.output_text;
        }
        if finish.error_message.is_some() {
            self.error_message = finish.error_message;
        }
        if finish.latency_ms.is_some() {
            self.latency_ms = finish.latency_ms;
        }
        if let Some(usage) = finish.usage {
            self.prompt_tokens = Some(usage.prompt_tokens);
            self.completion_tokens = Some(usage.completion_tokens);
            self.total_tokens = Some(usage.total_tokens);
        }
        self.updated_at = Utc::now();
    }
}

/// Stores run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Validate and insert a new `running` record.
    async fn create(&self, run: AgentRunCreate) -> std::result::Result<AgentRun, StoreError>;

    /// Write terminal fields for a run.
    async fn finish(
        &self,
        run_id: &str,
        finish: AgentRunFinish,
    ) -> std::result::Result<AgentRun, StoreError>;

    async fn get(&self, run_id: &str) -> std::result::Result<Option<AgentRun>, StoreError>;

    /// Most recent runs first.
    async fn recent(&self, limit: usize) -> std::result::Result<Vec<AgentRun>, StoreError>;
}
