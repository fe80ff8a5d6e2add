//! `reagent runs` — Recent agent runs.

use reagent_config::AppConfig;
use reagent_core::store::RunStore;

pub async fn run(config: &AppConfig, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::require_store(config).await?;
    let runs = store.recent(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<9}  {:>8}  {:>7}  {:<20}  {}",
        "RUN", "STATUS", "LATENCY", "TOKENS", "CREATED", "INPUT"
    );
    for run in &runs {
        let latency = run.latency_ms.map(|ms| format!("{ms}ms")).unwrap_or_else(|| "-".into());
        let tokens = run.total_tokens.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<36}  {:<9}  {:>8}  {:>7}  {:<20}  {}",
            run.run_id,
            run.status.as_str(),
            latency,
            tokens,
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            super::preview(&run.input_text, 40),
        );
        if let Some(error) = &run.error_message {
            println!("    └─ {}", super::preview(error, 70));
        }
    }
    Ok(())
}
