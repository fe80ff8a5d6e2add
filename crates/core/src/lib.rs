//! # Reagent Core
//!
//! Domain types, traits, and error definitions for the Reagent agent scaffold.
//! This crate has **no framework dependencies**: it defines the model that
//! the provider, tool, store and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: messages, tool-call references and the session transcript
//! - [`tool`]: the `Tool` trait and the name-keyed `ToolRegistry`
//! - [`schema`]: JSON Schema argument validation and schema alignment checks
//! - [`provider`]: the LLM client adapter trait
//! - [`store`]: persistence contracts for transcripts and run records
//! - [`event`]: domain events broadcast while a session runs

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod schema;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role, SessionId, Transcript};
pub use provider::{Completion, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use store::{
    AgentRun, AgentRunCreate, AgentRunFinish, RunStatus, RunStore, TranscriptStore,
    TranscriptSummary,
};
pub use tool::{FnTool, Tool, ToolCall, ToolRegistry, ToolResult};
