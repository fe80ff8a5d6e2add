//! `reagent agent` — Interactive or single-message chat mode.

use reagent_agent::{CancellationToken, ReactAgent, Session, SessionOutcome, render_system_prompt};
use reagent_config::AppConfig;
use reagent_core::event::{DomainEvent, EventBus};
use reagent_core::message::SessionId;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(
    config: &AppConfig,
    message: Option<String>,
    session_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Fail early with setup instructions when no key is configured
    if !config.has_api_key() && config.llm.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENAI_API_KEY='sk-...'          (OpenAI)");
        eprintln!("    export OPENROUTER_API_KEY='sk-or-...'   (OpenRouter)");
        eprintln!("    export REAGENT_API_KEY='...'            (any provider)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = reagent_providers::build_from_config(config)?;
    let tools = Arc::new(reagent_tools::default_registry()?);
    let prompts = super::load_prompts(config)?;
    let system_prompt = render_system_prompt(&prompts, &config.agent.system_prompt, &tools)?;

    let bus = Arc::new(EventBus::default());
    let mut agent = ReactAgent::from_config(config, provider, tools.clone())
        .with_system_prompt(system_prompt)
        .with_event_bus(bus.clone());
    let store = reagent_store::open_from_config(config).await?;
    let persisted = store.is_some();
    if let Some(store) = store {
        let store = Arc::new(store);
        agent = agent.with_store(store.clone()).with_run_store(store);
    }

    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        tools = tools.len(),
        persisted,
        "Agent ready"
    );

    let mut session = match &session_id {
        Some(id) => agent.resume(&SessionId::from(id.as_str())).await?,
        None => Session::new(),
    };

    // Progress lines for tool calls
    let mut events = bus.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } = event.as_ref() {
                let mark = if *success { "ok" } else { "error" };
                eprintln!("  [tool] {tool_name} ({mark}, {duration_ms}ms)");
            }
        }
    });

    let mut interrupts = listen_for_interrupts();

    if let Some(msg) = message {
        let outcome = turn(&agent, &mut session, &msg, &mut interrupts).await;
        progress.abort();
        match (&outcome.answer, &outcome.failure) {
            (Some(answer), _) => println!("{answer}"),
            (None, Some(reason)) => return Err(reason.to_string().into()),
            (None, None) => return Err(format!("Session ended in state {}", outcome.state).into()),
        }
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Reagent Agent — Interactive Mode      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.llm.provider);
    println!("  Model:     {}", config.llm.model);
    println!("  Tools:     {}", tools.names().join(", "));
    println!("  Session:   {}", session.id());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels a running turn; at the prompt it quits, as does 'exit'.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        // Drop interrupts that arrived while the last turn was finishing
        while interrupts.try_recv().is_ok() {}
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupts.recv() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        let outcome = turn(&agent, &mut session, input, &mut interrupts).await;
        println!();
        match (&outcome.answer, &outcome.failure) {
            (Some(answer), _) => {
                for line in answer.lines() {
                    println!("  Assistant > {line}");
                }
            }
            (_, Some(reason)) => eprintln!("  [Error] {reason}"),
            (None, None) => eprintln!("  [Error] session ended in state {}", outcome.state),
        }
        println!();
    }

    progress.abort();
    println!();
    if persisted {
        println!("  Session {} saved. Resume with `reagent agent --session {}`.", session.id(), session.id());
    }
    println!();
    Ok(())
}

/// Forward every Ctrl+C for the rest of the process.
///
/// The signal handler stays installed once registered, so a single listener
/// serves both running turns and the idle prompt.
fn listen_for_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// One turn; an interrupt cancels it and the agent still records the outcome.
async fn turn(
    agent: &ReactAgent,
    session: &mut Session,
    input: &str,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> SessionOutcome {
    // Interrupts sent before the turn started belong to an earlier one
    while interrupts.try_recv().is_ok() {}
    let cancel = CancellationToken::new();
    let run = agent.run(session, input, &cancel);
    tokio::pin!(run);

    loop {
        tokio::select! {
            outcome = &mut run => return outcome,
            Some(()) = interrupts.recv(), if !cancel.is_cancelled() => {
                eprintln!("  [cancelling]");
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_agent::testing::{ScriptedProvider, text_response};
    use reagent_agent::{FailureKind, SessionState};
    use reagent_core::tool::ToolRegistry;
    use std::time::Duration;

    fn slow_agent(provider: Arc<ScriptedProvider>) -> ReactAgent {
        ReactAgent::new(provider, "scripted-model", Arc::new(ToolRegistry::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_cancels_running_turn() {
        let provider = Arc::new(
            ScriptedProvider::responses(vec![text_response("too late")])
                .with_delay(Duration::from_secs(30)),
        );
        let agent = slow_agent(provider);
        let mut session = Session::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(()).unwrap();
            tx
        });
        let outcome = turn(&agent, &mut session, "hi", &mut rx).await;

        assert_eq!(outcome.state, SessionState::Failed(FailureKind::Cancelled));
        drop(sender.await.unwrap());
    }

    #[tokio::test]
    async fn turns_keep_working_after_an_interrupt() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            text_response("first"),
            text_response("second"),
        ]));
        let agent = slow_agent(provider);
        let mut session = Session::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let first = turn(&agent, &mut session, "one", &mut rx).await;
        assert_eq!(first.answer.as_deref(), Some("first"));

        // Stale interrupts are discarded before the next turn starts
        tx.send(()).unwrap();
        let second = turn(&agent, &mut session, "two", &mut rx).await;
        assert_eq!(second.answer.as_deref(), Some("second"));
    }
}
