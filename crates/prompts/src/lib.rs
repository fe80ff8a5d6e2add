//! Versioned prompt templates for Reagent.
//!
//! Prompts live in YAML files (`name`, `version`, `description`,
//! `template`, `variables`) so they can be edited without a rebuild.
//! Placeholders are written `{name}`; `{{` and `}}` produce literal braces.

pub mod registry;
pub mod template;

use std::path::PathBuf;

pub use registry::{BUILTIN_PROMPTS, PromptRegistry};
pub use template::PromptTemplate;

/// Prompt errors.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt '{name}' not found. Available: [{}]", .available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Prompt '{prompt}' is missing required variables: {}", .missing.join(", "))]
    MissingVariables { prompt: String, missing: Vec<String> },

    #[error("Failed to read prompt file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse prompt from {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Invalid prompt: {0}")]
    Invalid(String),
}

impl From<PromptError> for reagent_core::Error {
    fn from(e: PromptError) -> Self {
        reagent_core::Error::Prompt(e.to_string())
    }
}
