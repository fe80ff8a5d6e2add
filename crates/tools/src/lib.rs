//! Built-in tool implementations for Reagent.
//!
//! Tools give the agent the ability to act: do math and look things up.
//! Applications register their own tools next to these, either as types
//! implementing `Tool` or as closures via `ToolRegistry::register_fn`.

pub mod calculator;
pub mod search;

use std::sync::Arc;

use reagent_core::error::ToolError;
use reagent_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use search::{Document, SearchTool};

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(calculator::CalculatorTool))?;
    registry.register(Arc::new(search::SearchTool::builtin()))?;
    Ok(registry)
}
