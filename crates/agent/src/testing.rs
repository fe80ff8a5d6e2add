//! Scripted providers for exercising the loop without a network.

use async_trait::async_trait;
use reagent_core::error::ProviderError;
use reagent_core::message::{Message, MessageToolCall};
use reagent_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A provider that replays a queue of responses and records every request.
///
/// Once the script runs out it answers with `InvalidResponse`.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answers only, in order.
    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    /// The same tool call forever; never reaches a final answer.
    pub fn looping(call: MessageToolCall, turns: usize) -> Self {
        Self::responses(
            (0..turns)
                .map(|i| {
                    let mut call = call.clone();
                    call.id = format!("{}_{i}", call.id);
                    tool_call_response(vec![call], "")
                })
                .collect(),
        )
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A final-answer response.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(usage()),
        model: "scripted-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// A response requesting `calls`, with optional reasoning text.
pub fn tool_call_response(calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, calls),
        usage: Some(usage()),
        model: "scripted-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// A tool call with id `call_{id}`.
pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{id}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
