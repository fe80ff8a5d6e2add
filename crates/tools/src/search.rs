//! Search tool — keyword search over a document index.
//!
//! The index is in-process and deterministic, so sessions that use it can be
//! replayed and tested without network access. Callers load their own
//! documents with [`SearchTool::new`]; [`SearchTool::builtin`] ships a small
//! reference corpus.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_LIMIT: usize = 3;
const MAX_LIMIT: u64 = 10;

/// One searchable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl Document {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Hit<'a> {
    #[serde(flatten)]
    document: &'a Document,
    score: u32,
}

pub struct SearchTool {
    documents: Vec<Document>,
}

impl SearchTool {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// A small reference corpus about agents and the Rust ecosystem.
    pub fn builtin() -> Self {
        Self::new(vec![
            Document::new(
                "The Rust Programming Language",
                "https://doc.rust-lang.org/book/",
                "Rust is a systems programming language focused on safety, speed, and concurrency.",
            ),
            Document::new(
                "Tokio: asynchronous Rust runtime",
                "https://tokio.rs/",
                "Tokio is an event-driven, non-blocking I/O platform for writing asynchronous applications with Rust.",
            ),
            Document::new(
                "ReAct: Synergizing Reasoning and Acting in Language Models",
                "https://arxiv.org/abs/2210.03629",
                "ReAct interleaves reasoning traces and task-specific actions so language models can use tools.",
            ),
            Document::new(
                "OpenAI function calling guide",
                "https://platform.openai.com/docs/guides/function-calling",
                "Describe tools with JSON Schema and let the model return structured tool calls.",
            ),
            Document::new(
                "JSON Schema reference",
                "https://json-schema.org/understanding-json-schema/",
                "JSON Schema is a vocabulary for annotating and validating JSON documents.",
            ),
            Document::new(
                "SQLite write-ahead logging",
                "https://www.sqlite.org/wal.html",
                "WAL mode lets readers and a writer proceed concurrently in SQLite databases.",
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Rank documents by how many query terms they contain. Title matches
    /// count double. Ties keep index order.
    fn rank(&self, query: &str, limit: usize) -> Vec<Hit<'_>> {
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut hits: Vec<Hit<'_>> = self
            .documents
            .iter()
            .map(|doc| {
                let title = doc.title.to_lowercase();
                let snippet = doc.snippet.to_lowercase();
                let score = terms
                    .iter()
                    .map(|t| 2 * u32::from(title.contains(t.as_str())) + u32::from(snippet.contains(t.as_str())))
                    .sum();
                Hit { document: doc, score }
            })
            .filter(|hit| hit.score > 0)
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search for information. Returns the most relevant documents with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "q": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The search query"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "description": "Maximum number of results (default 3)"
                }
            },
            "required": ["q"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["q"]
            .as_str()
            .ok_or_else(|| ToolError::invalid("search", "/q: required property missing"))?;

        let limit = arguments["limit"]
            .as_f64()
            .map(|n| n.clamp(1.0, MAX_LIMIT as f64) as usize)
            .unwrap_or(DEFAULT_LIMIT);

        let hits = self.rank(query, limit);
        debug!(query, limit, hits = hits.len(), "Search executed");
        if hits.is_empty() {
            return Ok(ToolResult::ok(format!("No results for '{query}'.")).with_data(serde_json::json!([])));
        }

        let data = serde_json::to_value(&hits)
            .map_err(|e| ToolError::execution("search", e.to_string()))?;
        let output = hits
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}. {} ({})\n   {}", i + 1, h.document.title, h.document.url, h.document.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolResult::ok(output).with_data(data))
    }
}
