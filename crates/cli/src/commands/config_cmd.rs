//! `reagent config` — Configuration management commands.

use reagent_config::{AppConfig, ConfigError};
use std::path::Path;

pub fn validate(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed and validated");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Environment: {}", config.environment);
    println!("   Provider:    {}", config.llm.provider);
    println!("   Model:       {}", config.llm.model);
    println!("   Database:    {}", super::status::redact_url(&config.database.url));
    Ok(())
}

/// Problems that do not stop the config from loading.
pub fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() && config.llm.provider != "ollama" {
        warnings.push("No API key set (set OPENAI_API_KEY, OPENROUTER_API_KEY or REAGENT_API_KEY)".into());
    }
    if config.is_production() && config.database.is_disabled() {
        warnings.push("Persistence is disabled in production; runs will not be recorded".into());
    }
    if config.is_production() && config.database.url.contains(":memory:") {
        warnings.push("In-memory database in production; data is lost on exit".into());
    }
    if config.retry.max_retries == 0 {
        warnings.push("Retries disabled; rate limits will fail sessions immediately".into());
    }
    let problems = reagent_store::verify_record_schemas(&config.tables());
    warnings.extend(problems);
    warnings
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("[REDACTED]".into());
    }
    shown.database.url = super::status::redact_url(&shown.database.url);
    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

pub fn path(explicit: Option<&Path>) {
    match explicit {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", AppConfig::config_path().display()),
    }
}
