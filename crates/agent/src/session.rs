//! Session state machine and turn outcomes.

use reagent_core::error::ProviderError;
use reagent_core::message::{Message, SessionId, Transcript};
use reagent_core::provider::Usage;
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::AgentError;

/// Why a turn ended in [`SessionState::Failed`], without the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provider,
    BudgetExceeded,
    Cancelled,
    Internal,
}

/// Where a turn is in the loop.
///
/// ```text
/// AwaitingModel ──tool calls──▶ ExecutingTools ──all results──▶ AwaitingModel
/// AwaitingModel ──final answer──▶ Done
/// AwaitingModel | ExecutingTools ──error / cancel / budget──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed(FailureKind),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// The next state, if `to` is a legal edge from `self`.
    pub fn transition(self, to: SessionState) -> Result<SessionState, AgentError> {
        use SessionState::*;
        match (self, to) {
            (AwaitingModel, ExecutingTools)
            | (AwaitingModel, Done)
            | (ExecutingTools, AwaitingModel)
            | (AwaitingModel | ExecutingTools, Failed(_)) => Ok(to),
            _ => Err(AgentError::InvalidTransition { from: self, to }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Done => "done",
            Self::Failed(FailureKind::Provider) => "failed(provider)",
            Self::Failed(FailureKind::BudgetExceeded) => "failed(budget_exceeded)",
            Self::Failed(FailureKind::Cancelled) => "failed(cancelled)",
            Self::Failed(FailureKind::Internal) => "failed(internal)",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a turn failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FailureReason {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Iteration budget exhausted after {max_iterations} model calls")]
    BudgetExceeded { max_iterations: u32 },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FailureReason {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Provider(_) => FailureKind::Provider,
            Self::BudgetExceeded { .. } => FailureKind::BudgetExceeded,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<AgentError> for FailureReason {
    fn from(e: AgentError) -> Self {
        Self::Internal(e.to_string())
    }
}

/// One conversation: its transcript plus the state of the current turn.
#[derive(Debug, Clone)]
pub struct Session {
    transcript: Transcript,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::resume(Transcript::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self::resume(Transcript::with_id(id))
    }

    /// Continue from a stored transcript.
    ///
    /// Tool calls left without a result (a process that died mid-turn) get
    /// an error result so the transcript is well formed again.
    pub fn resume(mut transcript: Transcript) -> Self {
        for call_id in transcript.pending_tool_calls() {
            warn!(session_id = %transcript.id(), %call_id, "Closing tool call left without a result");
            transcript.push(
                Message::tool_result(&call_id, "Error: interrupted before a result was recorded")
                    .with_metadata("is_error", serde_json::Value::Bool(true)),
            );
        }
        Self {
            transcript,
            state: SessionState::AwaitingModel,
        }
    }

    pub fn id(&self) -> &SessionId {
        self.transcript.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Every turn starts with a fresh machine.
    pub(crate) fn begin_turn(&mut self) {
        self.state = SessionState::AwaitingModel;
    }

    pub(crate) fn advance(&mut self, to: SessionState) -> Result<(), AgentError> {
        self.state = self.state.transition(to)?;
        Ok(())
    }
}

/// The result of one [`ReactAgent::run`](crate::ReactAgent::run) call.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    /// Run record id, when a run store is attached.
    pub run_id: Option<String>,
    pub state: SessionState,
    pub answer: Option<String>,
    pub failure: Option<FailureReason>,
    /// Model calls made during the turn.
    pub iterations: u32,
    pub tool_calls_made: usize,
    pub usage: Usage,
    pub latency_ms: u64,
}

impl SessionOutcome {
    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::message::MessageToolCall;
    use super::SessionState::*;

    #[test]
    fn legal_transitions() {
        assert_eq!(AwaitingModel.transition(ExecutingTools).unwrap(), ExecutingTools);
        assert_eq!(AwaitingModel.transition(Done).unwrap(), Done);
        assert_eq!(ExecutingTools.transition(AwaitingModel).unwrap(), AwaitingModel);
        assert!(AwaitingModel.transition(Failed(FailureKind::Provider)).is_ok());
        assert!(ExecutingTools.transition(Failed(FailureKind::Cancelled)).is_ok());
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(ExecutingTools.transition(Done).is_err());
        assert!(AwaitingModel.transition(AwaitingModel).is_err());
        assert!(Done.transition(AwaitingModel).is_err());
        assert!(Failed(FailureKind::Internal).transition(ExecutingTools).is_err());

        let err = Done.transition(Failed(FailureKind::Provider)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid state transition: done -> failed(provider)");
    }

    #[test]
    fn terminal_states() {
        assert!(Done.is_terminal());
        assert!(Failed(FailureKind::BudgetExceeded).is_terminal());
        assert!(!AwaitingModel.is_terminal());
        assert!(!ExecutingTools.is_terminal());
    }

    #[test]
    fn failure_reason_kinds() {
        assert_eq!(FailureReason::Cancelled.kind(), FailureKind::Cancelled);
        assert_eq!(
            FailureReason::BudgetExceeded { max_iterations: 3 }.kind(),
            FailureKind::BudgetExceeded
        );
        let provider: FailureReason = ProviderError::AuthenticationFailed("bad key".into()).into();
        assert_eq!(provider.kind(), FailureKind::Provider);
    }

    #[test]
    fn resume_closes_dangling_tool_calls() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        transcript.push(Message::assistant_with_tool_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "search".into(),
                arguments: "{}".into(),
            }],
        ));

        let session = Session::resume(transcript);
        assert!(session.transcript().pending_tool_calls().is_empty());
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.state(), AwaitingModel);
    }

    #[test]
    fn state_serializes_with_reason() {
        let json = serde_json::to_value(Failed(FailureKind::BudgetExceeded)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "budget_exceeded");
    }
}
