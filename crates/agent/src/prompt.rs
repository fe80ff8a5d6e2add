//! System prompt assembly.

use reagent_core::tool::ToolRegistry;
use reagent_prompts::{PromptError, PromptRegistry};
use std::collections::HashMap;

/// One `- name: description` line per tool, sorted by name.
pub fn describe_tools(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return "(no tools available)".into();
    }
    tools
        .definitions()
        .iter()
        .map(|def| format!("- {}: {}", def.name, def.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the prompt `name` with `{tools}` filled from the registry.
pub fn render_system_prompt(
    prompts: &PromptRegistry,
    name: &str,
    tools: &ToolRegistry,
) -> Result<String, PromptError> {
    let vars = HashMap::from([("tools".to_string(), describe_tools(tools))]);
    prompts.render(name, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_tools::default_registry;

    #[test]
    fn describes_tools_in_name_order() {
        let tools = default_registry().unwrap();
        let text = describe_tools(&tools);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- calculator: "));
        assert!(lines[1].starts_with("- search: "));
    }

    #[test]
    fn empty_registry_says_so() {
        assert_eq!(describe_tools(&ToolRegistry::new()), "(no tools available)");
    }

    #[test]
    fn renders_builtin_react_prompt() {
        let prompts = PromptRegistry::with_defaults().unwrap();
        let tools = default_registry().unwrap();
        let text = render_system_prompt(&prompts, "react_system", &tools).unwrap();
        assert!(text.contains("- search: "));
        assert!(!text.contains("{tools}"));
    }

    #[test]
    fn unknown_prompt_is_error() {
        let prompts = PromptRegistry::new();
        let err = render_system_prompt(&prompts, "missing", &ToolRegistry::new()).unwrap_err();
        assert!(matches!(err, PromptError::NotFound { .. }));
    }
}
