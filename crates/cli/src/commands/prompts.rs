//! `reagent prompts` — Inspect prompt templates.

use reagent_config::AppConfig;

pub fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let prompts = super::load_prompts(config)?;
    println!("📜 Prompts ({})", prompts.len());
    println!("  Directory: {}\n", config.prompts_dir().display());
    for name in prompts.list() {
        let prompt = prompts.get(&name)?;
        println!("  {:<20} v{:<8} {}", prompt.name, prompt.version, prompt.description);
    }
    Ok(())
}

pub fn validate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let prompts = super::load_prompts(config)?;
    let errors = prompts.validate_all();
    if errors.is_empty() {
        println!("✅ {} prompt(s) valid", prompts.len());
        return Ok(());
    }

    for (name, problems) in &errors {
        println!("❌ {name}");
        for problem in problems {
            println!("     {problem}");
        }
    }
    Err(format!("{} prompt(s) failed validation", errors.len()).into())
}

pub fn show(config: &AppConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let prompts = super::load_prompts(config)?;
    let prompt = prompts.get(name)?;
    println!("name:        {}", prompt.name);
    println!("version:     {}", prompt.version);
    if !prompt.description.is_empty() {
        println!("description: {}", prompt.description);
    }
    println!("variables:   {}", prompt.variables.join(", "));
    println!("---");
    println!("{}", prompt.template);
    Ok(())
}
