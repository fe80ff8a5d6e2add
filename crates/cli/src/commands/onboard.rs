//! `reagent onboard` — First-time setup.

use reagent_config::AppConfig;
use reagent_prompts::BUILTIN_PROMPTS;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("🧪 Reagent — First-Time Setup");
    println!("============================\n");

    let written = scaffold(&config_dir)?;
    for path in &written {
        println!("✅ Created {}", path);
    }
    if written.is_empty() {
        println!("  Everything already exists under {}", config_dir.display());
        println!("  Edit the files manually or delete them and re-run onboard.\n");
    } else {
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", AppConfig::config_path().display());
        println!("   2. Run: reagent agent");
        println!();
    }

    println!("🎉 Setup complete. Run `reagent agent` to start chatting.\n");
    Ok(())
}

/// Create `dir`, `config.toml` and the built-in prompts, skipping anything
/// that already exists. Returns the paths written.
pub fn scaffold(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut written = Vec::new();
    let prompts_dir = dir.join("prompts");
    std::fs::create_dir_all(&prompts_dir)?;

    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        written.push(config_path.display().to_string());
    }

    for (file, yaml) in BUILTIN_PROMPTS {
        let path = prompts_dir.join(file);
        if !path.exists() {
            std::fs::write(&path, yaml)?;
            written.push(path.display().to_string());
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_writes_loadable_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".reagent");

        let first = scaffold(&root).unwrap();
        assert_eq!(first.len(), 2);
        assert!(scaffold(&root).unwrap().is_empty());

        let config = AppConfig::load_from(&root.join("config.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");

        let mut prompts = reagent_prompts::PromptRegistry::new();
        let loaded = prompts.load_from_directory(&root.join("prompts")).unwrap();
        assert_eq!(loaded[0].name, "react_system");
    }
}
