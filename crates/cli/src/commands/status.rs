//! `reagent status` — Show system status.

use reagent_config::AppConfig;

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Reagent Status");
    println!("=================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Environment:    {}", config.environment);
    println!("  Provider:       {}", config.llm.provider);
    println!("  Model:          {}", config.llm.model);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Max iterations: {}", config.agent.max_iterations);
    println!("  Tool timeout:   {}s", config.agent.tool_timeout_secs);
    println!(
        "  Retry:          {} retries, {}s initial delay, x{} backoff",
        config.retry.max_retries, config.retry.initial_delay_secs, config.retry.multiplier
    );
    println!("  Database:       {}", redact_url(&config.database.url));

    let tables = config.tables();
    for name in tables.all() {
        println!("    table         {name}");
    }
    let problems = reagent_store::verify_record_schemas(&tables);
    if problems.is_empty() {
        println!("  Record schemas: aligned");
    } else {
        for problem in &problems {
            println!("  ⚠️  {problem}");
        }
    }

    match super::load_prompts(config) {
        Ok(prompts) => println!("  Prompts:        {} ({})", prompts.len(), prompts.list().join(", ")),
        Err(e) => println!("  ⚠️  Prompts failed to load: {e}"),
    }
    let tools = reagent_tools::default_registry()?;
    println!("  Tools:          {}", tools.names().join(", "));

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `reagent onboard` first");
    }

    Ok(())
}

/// Replace any `user:password@` part of a URL.
pub fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://[REDACTED]@{host}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
