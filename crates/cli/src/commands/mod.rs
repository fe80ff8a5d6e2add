pub mod agent;
pub mod config_cmd;
pub mod onboard;
pub mod prompts;
pub mod runs;
pub mod session;
pub mod status;

use reagent_config::AppConfig;
use reagent_prompts::{PromptError, PromptRegistry};
use reagent_store::SqliteStore;

/// Built-in prompts overlaid with the prompts directory.
pub fn load_prompts(config: &AppConfig) -> Result<PromptRegistry, PromptError> {
    let mut registry = PromptRegistry::with_defaults()?;
    registry.load_from_directory(&config.prompts_dir())?;
    Ok(registry)
}

/// The configured store, or an error when persistence is switched off.
pub async fn require_store(config: &AppConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    reagent_store::open_from_config(config)
        .await?
        .ok_or_else(|| "Persistence is disabled (database.url = \"none\")".into())
}

/// First line of `text`, cut to `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_first_line() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("first\nsecond", 10), "first");
        assert_eq!(preview("abcdefghijkl", 5), "abcd…");
        assert_eq!(preview("", 5), "");
    }

    #[test]
    fn prompts_fall_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.agent.prompts_dir = Some(dir.path().join("missing"));
        let registry = load_prompts(&config).unwrap();
        assert_eq!(registry.list(), vec!["react_system"]);
    }
}
