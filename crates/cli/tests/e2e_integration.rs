//! End-to-end integration tests for the Reagent agent runtime.
//!
//! These tests exercise the full pipeline from user input to agent output:
//! prompt rendering, the reasoning loop, the built-in tools and persistence.

use std::sync::Arc;

use reagent_agent::testing::{ScriptedProvider, text_response, tool_call, tool_call_response};
use reagent_agent::{CancellationToken, FailureKind, ReactAgent, Session, SessionState, render_system_prompt};
use reagent_config::{AppConfig, Environment, TableName};
use reagent_core::error::ProviderError;
use reagent_core::message::Role;
use reagent_core::store::{RunStatus, RunStore, TranscriptStore};
use reagent_prompts::PromptRegistry;
use reagent_store::{InMemoryStore, SqliteStore};
use reagent_tools::default_registry;

fn agent_with(provider: Arc<ScriptedProvider>) -> ReactAgent {
    let tools = Arc::new(default_registry().unwrap());
    let prompts = PromptRegistry::with_defaults().unwrap();
    let system = render_system_prompt(&prompts, "react_system", &tools).unwrap();
    ReactAgent::new(provider, "scripted-model", tools).with_system_prompt(system)
}

// ── Full loop ────────────────────────────────────────────────────────────

#[tokio::test]
async fn calculator_round_trip_produces_answer() {
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_call_response(
            vec![tool_call("1", "calculator", serde_json::json!({"expression": "2 + 3 * 4"}))],
            "I should compute this.",
        ),
        text_response("The answer is 14."),
    ]));
    let agent = agent_with(provider.clone());
    let mut session = Session::new();

    let outcome = agent
        .run(&mut session, "What is 2 + 3 * 4?", &CancellationToken::new())
        .await;

    assert!(outcome.is_done());
    assert_eq!(outcome.answer.as_deref(), Some("The answer is 14."));
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tool_calls_made, 1);
    assert_eq!(outcome.usage.total_tokens, 30);

    let roles: Vec<Role> = session.transcript().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

    // The second request carries the tool output back to the model
    let requests = provider.requests();
    let tool_message = requests[1].messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_message.content, "14");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn system_prompt_lists_registered_tools() {
    let provider = Arc::new(ScriptedProvider::responses(vec![text_response("Hi!")]));
    let agent = agent_with(provider.clone());
    let mut session = Session::new();
    agent.run(&mut session, "hello", &CancellationToken::new()).await;

    let system = &provider.requests()[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("- calculator:"));
    assert!(system.content.contains("- search:"));
    assert_eq!(provider.requests()[0].tools.len(), 2);
}

#[tokio::test]
async fn invalid_arguments_are_reported_to_the_model() {
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_call_response(vec![tool_call("1", "search", serde_json::json!({"limit": 2}))], ""),
        text_response("I could not search."),
    ]));
    let agent = agent_with(provider.clone());
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "search nothing", &CancellationToken::new()).await;

    assert!(outcome.is_done());
    let tool_message = &session.transcript().messages()[3];
    assert!(tool_message.content.starts_with("Error: "));
    assert_eq!(tool_message.metadata["is_error"], true);
}

#[tokio::test]
async fn unknown_tool_does_not_end_the_session() {
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_call_response(vec![tool_call("1", "teleport", serde_json::json!({}))], ""),
        text_response("That tool does not exist."),
    ]));
    let agent = agent_with(provider);
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "go", &CancellationToken::new()).await;

    assert_eq!(outcome.state, SessionState::Done);
    assert!(session.transcript().messages()[3].content.contains("Tool not found: teleport"));
}

#[tokio::test]
async fn budget_stops_a_looping_model() {
    let call = tool_call("loop", "calculator", serde_json::json!({"expression": "1 + 1"}));
    let provider = Arc::new(ScriptedProvider::looping(call, 10));
    let agent = agent_with(provider.clone()).with_max_iterations(3);
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "loop", &CancellationToken::new()).await;

    assert_eq!(outcome.state, SessionState::Failed(FailureKind::BudgetExceeded));
    assert_eq!(provider.call_count(), 3);
    assert!(session.transcript().pending_tool_calls().is_empty());
}

#[tokio::test]
async fn provider_failure_is_terminal() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed(
        "bad key".into(),
    ))]));
    let agent = agent_with(provider);
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "hi", &CancellationToken::new()).await;

    assert_eq!(outcome.state, SessionState::Failed(FailureKind::Provider));
    assert!(outcome.failure.unwrap().to_string().contains("bad key"));
}

// ── Persistence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_store_records_transcript_and_run() {
    let config = AppConfig::default();
    let store = Arc::new(SqliteStore::new("sqlite::memory:", 1, config.tables()).await.unwrap());
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_call_response(
            vec![tool_call("1", "search", serde_json::json!({"q": "tokio runtime"}))],
            "",
        ),
        text_response("Tokio is an async runtime."),
    ]));
    let agent = agent_with(provider)
        .with_store(store.clone())
        .with_run_store(store.clone());
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "What is tokio?", &CancellationToken::new()).await;
    assert!(outcome.is_done());

    let saved = store.load(session.id()).await.unwrap().unwrap();
    assert_eq!(saved.len(), session.transcript().len());

    let run = store.get(outcome.run_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.output_text.as_deref(), Some("Tokio is an async runtime."));
    assert_eq!(run.session_id.as_deref(), Some(session.id().as_str()));
    assert_eq!(run.total_tokens, Some(30));
}

#[tokio::test]
async fn resumed_session_continues_the_conversation() {
    let store = Arc::new(InMemoryStore::new());
    let first = Arc::new(ScriptedProvider::responses(vec![text_response("Nice to meet you, Sam.")]));
    let agent = agent_with(first).with_store(store.clone());
    let mut session = Session::new();
    agent.run(&mut session, "My name is Sam.", &CancellationToken::new()).await;

    let second = Arc::new(ScriptedProvider::responses(vec![text_response("Your name is Sam.")]));
    let agent = agent_with(second.clone()).with_store(store.clone());
    let mut resumed = agent.resume(session.id()).await.unwrap();
    let outcome = agent.run(&mut resumed, "What is my name?", &CancellationToken::new()).await;

    assert!(outcome.is_done());
    let request = &second.requests()[0];
    assert!(request.messages.iter().any(|m| m.content == "My name is Sam."));
    // One system prompt, even across turns
    assert_eq!(request.messages.iter().filter(|m| m.role == Role::System).count(), 1);
    assert_eq!(store.transcript_count().await, 1);
}

#[tokio::test]
async fn cancelled_turn_is_recorded() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(ScriptedProvider::responses(vec![text_response("never")]));
    let agent = agent_with(provider.clone())
        .with_store(store.clone())
        .with_run_store(store.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "hi", &cancel).await;

    assert_eq!(outcome.state, SessionState::Failed(FailureKind::Cancelled));
    assert_eq!(provider.call_count(), 0);
    let runs = store.recent(5).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Error);
}

// ── Configuration ────────────────────────────────────────────────────────

#[test]
fn table_names_follow_environment_and_layer() {
    let mut config = AppConfig::default();
    config.environment = Environment::Prod;
    let tables = config.tables();
    assert_eq!(tables.get(TableName::AgentRuns), "prod_silver_agent_runs");
    assert_eq!(tables.get(TableName::Transcripts), "prod_silver_transcripts");
    assert!(reagent_store::verify_record_schemas(&tables).is_empty());
}

#[test]
fn default_config_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, AppConfig::default_toml()).unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.agent.max_iterations, AppConfig::default().agent.max_iterations);
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn agent_from_config_uses_configured_model() {
    let mut config = AppConfig::default();
    config.llm.model = "gpt-4o-mini".into();
    config.agent.max_iterations = 1;
    let provider = Arc::new(ScriptedProvider::responses(vec![tool_call_response(
        vec![tool_call("1", "calculator", serde_json::json!({"expression": "1"}))],
        "",
    )]));
    let tools = Arc::new(default_registry().unwrap());
    let agent = ReactAgent::from_config(&config, provider.clone(), tools);
    let mut session = Session::new();

    let outcome = agent.run(&mut session, "hi", &CancellationToken::new()).await;

    assert_eq!(agent.model(), "gpt-4o-mini");
    assert_eq!(provider.requests()[0].model, "gpt-4o-mini");
    assert_eq!(outcome.state, SessionState::Failed(FailureKind::BudgetExceeded));
}
