//! The ReAct reasoning loop.
//!
//! The agent alternates between the model and the tools:
//!
//! 1. **Receive** user input and append it to the session transcript
//! 2. **Ask the model** for the next turn, sending every registered tool
//! 3. **If tool calls**: run them concurrently, append one result per call,
//!    and go back to step 2
//! 4. **If a final answer**: the turn is done
//!
//! Each turn is tracked by a small state machine ([`SessionState`]) and ends
//! in a [`SessionOutcome`]. Provider errors, cancellation and an exhausted
//! iteration budget are terminal; tool errors are fed back to the model.

pub mod prompt;
pub mod react;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use prompt::{describe_tools, render_system_prompt};
pub use react::ReactAgent;
pub use session::{FailureKind, FailureReason, Session, SessionOutcome, SessionState};

pub use tokio_util::sync::CancellationToken;

use reagent_core::error::StoreError;

/// Errors from agent plumbing (not from a session's outcome).
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("No transcript store configured")]
    NoStore,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AgentError> for reagent_core::Error {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Store(s) => reagent_core::Error::Store(s),
            other => reagent_core::Error::Internal(other.to_string()),
        }
    }
}
