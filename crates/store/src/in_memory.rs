//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use reagent_core::error::StoreError;
use reagent_core::message::{SessionId, Transcript};
use reagent_core::store::{
    AgentRun, AgentRunCreate, AgentRunFinish, RunStore, TranscriptStore, TranscriptSummary,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps transcripts and run records in process memory.
///
/// Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    transcripts: Arc<RwLock<HashMap<SessionId, Transcript>>>,
    runs: Arc<RwLock<Vec<AgentRun>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transcript_count(&self) -> usize {
        self.transcripts.read().await.len()
    }

    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, transcript: &Transcript) -> Result<(), StoreError> {
        self.transcripts
            .write()
            .await
            .insert(transcript.id().clone(), transcript.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Transcript>, StoreError> {
        Ok(self.transcripts.read().await.get(id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<TranscriptSummary>, StoreError> {
        let transcripts = self.transcripts.read().await;
        let mut summaries: Vec<TranscriptSummary> =
            transcripts.values().map(TranscriptSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.transcripts.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn create(&self, run: AgentRunCreate) -> Result<AgentRun, StoreError> {
        run.validate()?;
        let mut runs = self.runs.write().await;
        if runs.iter().any(|r| r.run_id == run.run_id) {
            return Err(StoreError::InvalidRecord(format!(
                "run '{}' already exists",
                run.run_id
            )));
        }
        let record = AgentRun::from_create(run);
        runs.push(record.clone());
        Ok(record)
    }

    async fn finish(&self, run_id: &str, finish: AgentRunFinish) -> Result<AgentRun, StoreError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run '{run_id}'")))?;
        run.apply(finish);
        Ok(run.clone())
    }

    async fn get(&self, run_id: &str) -> Result<Option<AgentRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AgentRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().rev().take(limit).cloned().collect())
    }
}
