//! LLM Provider implementations for Reagent.
//!
//! All providers implement the `reagent_core::Provider` trait.
//! [`build_from_config`] selects and wraps the configured one.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};
pub use router::build_from_config;
