//! `reagent session` — Inspect stored transcripts.

use reagent_config::AppConfig;
use reagent_core::message::{Role, SessionId};
use reagent_core::store::TranscriptStore;

pub async fn show(config: &AppConfig, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::require_store(config).await?;
    let transcript = store
        .load(&SessionId::from(id))
        .await?
        .ok_or_else(|| format!("Session not found: {id}"))?;

    println!("Session {} ({} messages)", transcript.id(), transcript.len());
    println!("  Created: {}", transcript.created_at().to_rfc3339());
    println!("  Updated: {}\n", transcript.updated_at().to_rfc3339());

    for message in transcript.messages() {
        match message.role {
            Role::Tool => {
                let call = message.tool_call_id.as_deref().unwrap_or("?");
                let failed = message.metadata.get("is_error").and_then(|v| v.as_bool()) == Some(true);
                let mark = if failed { "✗" } else { "✓" };
                println!("  [tool {call}] {mark} {}", super::preview(&message.content, 100));
            }
            role => {
                if !message.content.is_empty() {
                    println!("  [{}] {}", role.as_str(), message.content);
                }
                for call in &message.tool_calls {
                    println!("  [{}] → {}({}) #{}", role.as_str(), call.name, call.arguments, call.id);
                }
            }
        }
    }
    Ok(())
}

pub async fn list(config: &AppConfig, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::require_store(config).await?;
    let sessions = store.list(limit).await?;
    if sessions.is_empty() {
        println!("No sessions stored yet.");
        return Ok(());
    }

    println!("{:<36}  {:>8}  {}", "SESSION", "MESSAGES", "UPDATED");
    for summary in &sessions {
        println!(
            "{:<36}  {:>8}  {}",
            summary.id.as_str(),
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}
