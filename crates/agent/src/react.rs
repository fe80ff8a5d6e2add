//! ReAct controller — model call, tool calls, repeat.

use chrono::Utc;
use futures::future::join_all;
use reagent_config::AppConfig;
use reagent_core::error::ToolError;
use reagent_core::event::{DomainEvent, EventBus};
use reagent_core::message::{Message, SessionId};
use reagent_core::provider::{Completion, Provider, ProviderRequest, Usage};
use reagent_core::store::{AgentRunCreate, AgentRunFinish, RunStore, TranscriptStore};
use reagent_core::tool::{ToolCall, ToolRegistry, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::{FailureReason, Session, SessionOutcome, SessionState};
use crate::AgentError;

const CANCELLED_OUTPUT: &str = "Error: cancelled";
const PREVIEW_CHARS: usize = 80;

/// A configured reasoning loop.
///
/// The agent holds only shared, immutable collaborators; all per-session
/// state lives in the [`Session`] passed to [`run`](Self::run), so one agent
/// can drive many sessions at once.
pub struct ReactAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    system_prompt: Option<String>,
    tool_timeout: Duration,
    store: Option<Arc<dyn TranscriptStore>>,
    run_store: Option<Arc<dyn RunStore>>,
    event_bus: Option<Arc<EventBus>>,
    agent_type: String,
}

/// Counters for one turn.
#[derive(Default)]
struct TurnStats {
    iterations: u32,
    tool_calls_made: usize,
    usage: Usage,
}

impl ReactAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools,
            max_iterations: 10,
            system_prompt: None,
            tool_timeout: Duration::from_secs(120),
            store: None,
            run_store: None,
            event_bus: None,
            agent_type: "react".into(),
        }
    }

    /// Model, sampling and limits taken from the `llm` and `agent` sections.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, config.llm.model.clone(), tools)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Cap on model calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Inserted as the first message of a new transcript.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TranscriptStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.run_store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = agent_type.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Load a stored session so it can take another turn.
    pub async fn resume(&self, id: &SessionId) -> Result<Session, AgentError> {
        let store = self.store.as_ref().ok_or(AgentError::NoStore)?;
        let transcript = store
            .load(id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        info!(session_id = %id, messages = transcript.len(), "Resuming session");
        Ok(Session::resume(transcript))
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run one turn: append `user_input` and loop until a final answer or a
    /// terminal failure.
    ///
    /// The transcript is saved and the run recorded whatever the outcome.
    pub async fn run(
        &self,
        session: &mut Session,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        let started = Instant::now();
        let session_id = session.id().clone();
        session.begin_turn();

        if session.transcript().is_empty()
            && let Some(prompt) = &self.system_prompt
        {
            session.transcript_mut().push(Message::system(prompt));
        }
        session.transcript_mut().push(Message::user(user_input));

        info!(
            session_id = %session_id,
            model = %self.model,
            max_iterations = self.max_iterations,
            "Session turn starting"
        );
        self.publish(DomainEvent::SessionStarted {
            session_id: session_id.to_string(),
            input_preview: user_input.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });

        let run_id = self.start_run(&session_id, user_input).await;

        let mut stats = TurnStats::default();
        let result = self.drive(session, cancel, &mut stats).await;

        let (state, answer, failure) = match result {
            Ok(answer) => (SessionState::Done, Some(answer), None),
            Err(reason) => (SessionState::Failed(reason.kind()), None, Some(reason)),
        };
        if let Err(e) = session.advance(state) {
            warn!(session_id = %session_id, "{e}");
        }

        let outcome = SessionOutcome {
            session_id,
            run_id,
            state: session.state(),
            answer,
            failure,
            iterations: stats.iterations,
            tool_calls_made: stats.tool_calls_made,
            usage: stats.usage,
            latency_ms: started.elapsed().as_millis() as u64,
        };

        self.persist(session).await;
        self.finish_run(&outcome).await;
        self.report(&outcome);
        outcome
    }

    /// The loop proper. Returns the final answer or why the turn failed.
    async fn drive(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
        stats: &mut TurnStats,
    ) -> Result<String, FailureReason> {
        let definitions = self.tools.definitions();

        loop {
            if stats.iterations >= self.max_iterations {
                warn!(
                    session_id = %session.id(),
                    max_iterations = self.max_iterations,
                    "Iteration budget exhausted"
                );
                return Err(FailureReason::BudgetExceeded {
                    max_iterations: self.max_iterations,
                });
            }

            let pending = session.transcript().pending_tool_calls();
            if !pending.is_empty() {
                return Err(FailureReason::Internal(format!(
                    "tool calls without results before model request: {}",
                    pending.join(", ")
                )));
            }

            let mut request = ProviderRequest::new(&self.model, session.transcript().messages().to_vec());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.tools = definitions.clone();

            if cancel.is_cancelled() {
                return Err(FailureReason::Cancelled);
            }
            stats.iterations += 1;
            debug!(
                session_id = %session.id(),
                iteration = stats.iterations,
                messages = request.messages.len(),
                "Calling model"
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
                response = self.provider.complete(request) => response?,
            };

            if let Some(usage) = &response.usage {
                stats.usage.add(usage);
            }
            let completion = response.completion();
            self.publish(DomainEvent::ResponseGenerated {
                session_id: session.id().to_string(),
                model: response.model.clone(),
                tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or_default(),
                tool_calls: response.message.tool_calls.len(),
                timestamp: Utc::now(),
            });
            session.transcript_mut().push(response.message);

            match completion {
                Completion::FinalAnswer(answer) => return Ok(answer),
                Completion::ToolCalls(calls) => {
                    session.advance(SessionState::ExecutingTools)?;
                    stats.tool_calls_made += calls.len();
                    self.execute_tools(session, &calls, cancel).await?;
                    session.advance(SessionState::AwaitingModel)?;
                }
            }
        }
    }

    /// Run every call of a turn concurrently and append one tool message
    /// per call, in call order.
    async fn execute_tools(
        &self,
        session: &mut Session,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<(), FailureReason> {
        let session_id = session.id().to_string();
        let all = join_all(calls.iter().map(|call| self.execute_one(&session_id, call)));

        let (results, cancelled) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(session_id = %session_id, calls = calls.len(), "Tool execution cancelled");
                let results = calls
                    .iter()
                    .map(|call| (call.name.clone(), ToolResult::error(&call.id, CANCELLED_OUTPUT)))
                    .collect::<Vec<_>>();
                (results, true)
            }
            results = all => (results, false),
        };

        for (tool_name, result) in results {
            let mut message = Message::tool_result(result.call_id, result.output)
                .with_metadata("tool_name", Value::String(tool_name));
            if !result.success {
                message = message.with_metadata("is_error", Value::Bool(true));
            }
            session.transcript_mut().push(message);
        }

        if cancelled {
            return Err(FailureReason::Cancelled);
        }
        Ok(())
    }

    /// Execute one call under the tool timeout. Errors become error results.
    async fn execute_one(&self, session_id: &str, call: &ToolCall) -> (String, ToolResult) {
        let start = Instant::now();
        debug!(tool = %call.name, call_id = %call.id, arguments = %call.arguments, "Executing tool");

        let outcome = match tokio::time::timeout(self.tool_timeout, self.tools.execute(call)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.tool_timeout.as_secs(),
            }),
        };
        let result = outcome.unwrap_or_else(|e| {
            warn!(tool = %call.name, call_id = %call.id, "Tool failed: {e}");
            ToolResult::error(&call.id, format!("Error: {e}"))
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        self.publish(DomainEvent::ToolExecuted {
            session_id: session_id.to_string(),
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });
        (call.name.clone(), result)
    }

    async fn start_run(&self, session_id: &SessionId, user_input: &str) -> Option<String> {
        let store = self.run_store.as_ref()?;
        let mut create = AgentRunCreate::new(Uuid::new_v4().to_string(), user_input);
        create.agent_type = self.agent_type.clone();
        create.session_id = Some(session_id.to_string());
        create
            .metadata
            .insert("model".into(), Value::String(self.model.clone()));

        match store.create(create).await {
            Ok(run) => Some(run.run_id),
            Err(e) => {
                warn!(session_id = %session_id, "Failed to record run: {e}");
                self.publish(DomainEvent::ErrorOccurred {
                    context: "run_store.create".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                None
            }
        }
    }

    async fn finish_run(&self, outcome: &SessionOutcome) {
        let (Some(store), Some(run_id)) = (&self.run_store, &outcome.run_id) else {
            return;
        };
        let finish = match (&outcome.answer, &outcome.failure) {
            (Some(answer), _) => AgentRunFinish::success(answer.clone()),
            (None, Some(reason)) => AgentRunFinish::error(reason.to_string()),
            (None, None) => AgentRunFinish::error(format!("session ended in {}", outcome.state)),
        }
        .with_latency(outcome.latency_ms)
        .with_usage(outcome.usage);

        if let Err(e) = store.finish(run_id, finish).await {
            warn!(%run_id, "Failed to finish run record: {e}");
            self.publish(DomainEvent::ErrorOccurred {
                context: "run_store.finish".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    async fn persist(&self, session: &Session) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save(session.transcript()).await {
            warn!(session_id = %session.id(), "Failed to save transcript: {e}");
            self.publish(DomainEvent::ErrorOccurred {
                context: "transcript_store.save".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn report(&self, outcome: &SessionOutcome) {
        match &outcome.failure {
            None => info!(
                session_id = %outcome.session_id,
                iterations = outcome.iterations,
                tool_calls = outcome.tool_calls_made,
                tokens = outcome.usage.total_tokens,
                latency_ms = outcome.latency_ms,
                "Session turn completed"
            ),
            Some(reason) => {
                warn!(
                    session_id = %outcome.session_id,
                    state = %outcome.state,
                    iterations = outcome.iterations,
                    "Session turn failed: {reason}"
                );
                self.publish(DomainEvent::ErrorOccurred {
                    context: format!("session {}", outcome.session_id),
                    error_message: reason.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        self.publish(DomainEvent::SessionFinished {
            session_id: outcome.session_id.to_string(),
            state: outcome.state.to_string(),
            iterations: outcome.iterations,
            latency_ms: outcome.latency_ms,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FailureKind;
    use crate::testing::{ScriptedProvider, text_response, tool_call, tool_call_response};
    use reagent_core::error::ProviderError;
    use reagent_core::message::Role;
    use reagent_core::store::RunStatus;
    use reagent_store::InMemoryStore;
    use reagent_tools::default_registry;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    fn agent(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> ReactAgent {
        ReactAgent::new(provider, "scripted-model", Arc::new(tools)).with_system_prompt("You are helpful.")
    }

    fn builtin_tools() -> ToolRegistry {
        default_registry().unwrap()
    }

    fn object_schema() -> Value {
        json!({ "type": "object" })
    }

    #[tokio::test]
    async fn final_answer_on_first_call() {
        let provider = Arc::new(ScriptedProvider::responses(vec![text_response("Paris")]));
        let agent = agent(provider.clone(), builtin_tools());
        let mut session = Session::new();

        let outcome = agent
            .run(&mut session, "Capital of France?", &CancellationToken::new())
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.answer.as_deref(), Some("Paris"));
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.usage.total_tokens, 15);
        assert_eq!(provider.call_count(), 1);

        let roles: Vec<Role> = session.transcript().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(session.state(), SessionState::Done);
    }

    #[tokio::test]
    async fn tool_result_reaches_next_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut tools = ToolRegistry::new();
        tools
            .register_fn(
                "search",
                "Search",
                json!({ "type": "object", "properties": { "q": { "type": "string" } }, "required": ["q"] }),
                move |args| {
                    recorder.lock().unwrap().push(args);
                    async { Ok("result for x".to_string()) }
                },
            )
            .unwrap();

        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("1", "search", json!({ "q": "x" }))], "Let me look."),
            text_response("x is a letter"),
        ]));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::new();

        let outcome = agent.run(&mut session, "what is x", &CancellationToken::new()).await;

        assert!(outcome.is_done());
        assert_eq!(outcome.tool_calls_made, 1);
        assert_eq!(*seen.lock().unwrap(), vec![json!({ "q": "x" })]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        let tool_msg = requests[1].messages.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.content, "result for x");
    }

    #[tokio::test]
    async fn budget_exhaustion_after_exact_cap() {
        let provider = Arc::new(ScriptedProvider::looping(
            tool_call("loop", "calculator", json!({ "expression": "1 + 1" })),
            10,
        ));
        let agent = agent(provider.clone(), builtin_tools()).with_max_iterations(3);
        let mut session = Session::new();

        let outcome = agent.run(&mut session, "loop forever", &CancellationToken::new()).await;

        assert_eq!(outcome.state, SessionState::Failed(FailureKind::BudgetExceeded));
        assert!(matches!(
            outcome.failure,
            Some(FailureReason::BudgetExceeded { max_iterations: 3 })
        ));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.iterations, 3);
        assert!(session.transcript().pending_tool_calls().is_empty());
        assert_eq!(session.transcript().tool_result_count(), 3);
    }

    #[tokio::test]
    async fn every_request_sees_matched_tool_calls() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(
                vec![
                    tool_call("a", "calculator", json!({ "expression": "2 * 3" })),
                    tool_call("b", "search", json!({ "q": "tokio" })),
                ],
                "",
            ),
            tool_call_response(vec![tool_call("c", "calculator", json!({ "expression": "6 + 1" }))], ""),
            text_response("7"),
        ]));
        let agent = agent(provider.clone(), builtin_tools());
        let mut session = Session::new();
        agent.run(&mut session, "compute", &CancellationToken::new()).await;

        for request in provider.requests() {
            let calls: usize = request.messages.iter().map(|m| m.tool_calls.len()).sum();
            let results = request.messages.iter().filter(|m| m.role == Role::Tool).count();
            assert_eq!(calls, results);
        }
    }

    #[tokio::test]
    async fn provider_error_is_terminal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let agent = agent(provider.clone(), builtin_tools());
        let mut session = Session::new();

        let outcome = agent.run(&mut session, "hi", &CancellationToken::new()).await;

        assert_eq!(outcome.state, SessionState::Failed(FailureKind::Provider));
        assert!(matches!(
            outcome.failure,
            Some(FailureReason::Provider(ProviderError::AuthenticationFailed(_)))
        ));
        assert!(outcome.answer.is_none());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(
                vec![
                    tool_call("bad_args", "calculator", json!({})),
                    tool_call("unknown", "weather", json!({ "city": "Oslo" })),
                    tool_call("div", "calculator", json!({ "expression": "1 / 0" })),
                ],
                "",
            ),
            text_response("Sorry, I could not compute that."),
        ]));
        let agent = agent(provider.clone(), builtin_tools());
        let mut session = Session::new();

        let outcome = agent.run(&mut session, "try things", &CancellationToken::new()).await;
        assert!(outcome.is_done());

        let tool_msgs: Vec<&Message> = session
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 3);
        assert!(tool_msgs[0].content.contains("Invalid arguments for calculator"));
        assert!(tool_msgs[1].content.contains("Tool not found: weather"));
        assert!(tool_msgs[2].content.contains("division by zero"));
        assert!(tool_msgs.iter().all(|m| m.metadata["is_error"] == json!(true)));
    }

    #[tokio::test]
    async fn tool_calls_run_concurrently_and_record_in_call_order() {
        let barrier = Arc::new(Barrier::new(2));
        let mut tools = ToolRegistry::new();
        for name in ["slow", "fast"] {
            let barrier = barrier.clone();
            tools
                .register_fn(name, name, object_schema(), move |_| {
                    let barrier = barrier.clone();
                    async move {
                        // both calls must be in flight for either to pass
                        barrier.wait().await;
                        Ok(name.to_string())
                    }
                })
                .unwrap();
        }

        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(
                vec![tool_call("1", "slow", json!({})), tool_call("2", "fast", json!({}))],
                "",
            ),
            text_response("done"),
        ]));
        let agent = agent(provider, tools).with_tool_timeout(Duration::from_secs(5));
        let mut session = Session::new();
        let outcome = agent.run(&mut session, "go", &CancellationToken::new()).await;

        assert!(outcome.is_done());
        let results: Vec<(&str, &str)> = session
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.content.as_str()))
            .collect();
        assert_eq!(results, vec![("call_1", "slow"), ("call_2", "fast")]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_as_error_result() {
        let mut tools = ToolRegistry::new();
        tools
            .register_fn("sleepy", "Sleeps", object_schema(), |_| async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok("never".to_string())
            })
            .unwrap();

        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("1", "sleepy", json!({}))], ""),
            text_response("gave up"),
        ]));
        let agent = agent(provider, tools).with_tool_timeout(Duration::from_secs(2));
        let mut session = Session::new();
        let outcome = agent.run(&mut session, "wait", &CancellationToken::new()).await;

        assert!(outcome.is_done());
        let tool_msg = &session.transcript().messages()[3];
        assert_eq!(tool_msg.role, Role::Tool);
        assert!(tool_msg.content.contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_before_model_call() {
        let provider = Arc::new(ScriptedProvider::responses(vec![text_response("unused")]));
        let agent = agent(provider.clone(), builtin_tools());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut session = Session::new();
        let outcome = agent.run(&mut session, "hi", &cancel).await;

        assert_eq!(outcome.state, SessionState::Failed(FailureKind::Cancelled));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(outcome.iterations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_model_call() {
        let provider = Arc::new(
            ScriptedProvider::responses(vec![text_response("too late")]).with_delay(Duration::from_secs(30)),
        );
        let agent = agent(provider.clone(), builtin_tools());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let mut session = Session::new();
        let outcome = agent.run(&mut session, "hi", &cancel).await;

        assert!(matches!(outcome.failure, Some(FailureReason::Cancelled)));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(session.transcript().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn cancelled_during_tools_records_error_results() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut tools = ToolRegistry::new();
        tools
            .register_fn("hang", "Cancels then hangs", object_schema(), move |_| {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    std::future::pending::<()>().await;
                    Ok(String::new())
                }
            })
            .unwrap();

        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("1", "hang", json!({})), tool_call("2", "hang", json!({}))], ""),
            text_response("unused"),
        ]));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::new();
        let outcome = agent.run(&mut session, "hang", &cancel).await;

        assert_eq!(outcome.state, SessionState::Failed(FailureKind::Cancelled));
        assert_eq!(provider.call_count(), 1);
        assert!(session.transcript().pending_tool_calls().is_empty());
        let last = session.transcript().last().unwrap();
        assert_eq!(last.content, CANCELLED_OUTPUT);
    }

    #[tokio::test]
    async fn persists_transcript_and_run_record() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("1", "calculator", json!({ "expression": "2 + 2" }))], ""),
            text_response("4"),
        ]));
        let agent = agent(provider, builtin_tools())
            .with_store(store.clone())
            .with_run_store(store.clone())
            .with_agent_type("react-test");
        let mut session = Session::new();

        let outcome = agent.run(&mut session, "2 + 2?", &CancellationToken::new()).await;

        let saved = store.load(session.id()).await.unwrap().unwrap();
        assert_eq!(saved.len(), session.transcript().len());

        let run_id = outcome.run_id.unwrap();
        let run = store.get(&run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.output_text.as_deref(), Some("4"));
        assert_eq!(run.agent_type, "react-test");
        assert_eq!(run.total_tokens, Some(30));
        assert_eq!(run.session_id.as_deref(), Some(session.id().as_str()));
        assert_eq!(run.metadata["model"], "scripted-model");
    }

    #[tokio::test]
    async fn failed_turn_recorded_as_error_run() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })]));
        let agent = agent(provider, builtin_tools()).with_run_store(store.clone());
        let mut session = Session::new();

        agent.run(&mut session, "hi", &CancellationToken::new()).await;

        let runs = store.recent(1).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Error);
        assert!(runs[0].error_message.as_deref().unwrap().contains("Rate limited"));
    }

    #[tokio::test]
    async fn resume_continues_stored_session() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::responses(vec![
            text_response("Hello!"),
            text_response("You said hi."),
        ]));
        let agent = agent(provider.clone(), builtin_tools()).with_store(store.clone());

        let mut first = Session::new();
        agent.run(&mut first, "hi", &CancellationToken::new()).await;

        let mut resumed = agent.resume(first.id()).await.unwrap();
        let outcome = agent
            .run(&mut resumed, "what did I say?", &CancellationToken::new())
            .await;

        assert!(outcome.is_done());
        let messages = resumed.transcript().messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(provider.requests()[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn resume_errors() {
        let provider = Arc::new(ScriptedProvider::default());
        let without_store = agent(provider.clone(), builtin_tools());
        assert!(matches!(
            without_store.resume(&SessionId::from("x")).await,
            Err(AgentError::NoStore)
        ));

        let with_store = agent(provider, builtin_tools()).with_store(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            with_store.resume(&SessionId::from("x")).await,
            Err(AgentError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn publishes_lifecycle_events() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("1", "search", json!({ "q": "rust" }))], ""),
            text_response("Rust is a language."),
        ]));
        let agent = agent(provider, builtin_tools()).with_event_bus(bus.clone());
        let mut session = Session::new();
        agent.run(&mut session, "rust?", &CancellationToken::new()).await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::SessionStarted { .. } => "started",
                DomainEvent::ResponseGenerated { .. } => "response",
                DomainEvent::ToolExecuted { success, .. } => {
                    assert!(*success);
                    "tool"
                }
                DomainEvent::SessionFinished { state, .. } => {
                    assert_eq!(state, "done");
                    "finished"
                }
                DomainEvent::ErrorOccurred { .. } => "error",
            });
        }
        assert_eq!(names, vec!["started", "response", "tool", "response", "finished"]);
    }

    #[tokio::test]
    async fn from_config_applies_limits() {
        let mut config = AppConfig::default();
        config.llm.model = "gpt-4o-mini".into();
        config.agent.max_iterations = 1;

        let provider = Arc::new(ScriptedProvider::looping(
            tool_call("x", "calculator", json!({ "expression": "1" })),
            5,
        ));
        let agent = ReactAgent::from_config(&config, provider.clone(), Arc::new(builtin_tools()));
        assert_eq!(agent.model(), "gpt-4o-mini");

        let mut session = Session::new();
        let outcome = agent.run(&mut session, "loop", &CancellationToken::new()).await;
        assert_eq!(outcome.state, SessionState::Failed(FailureKind::BudgetExceeded));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.requests()[0].max_tokens, Some(4096));
    }
}
