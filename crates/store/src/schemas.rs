//! JSON Schemas of the persisted records.
//!
//! Checked at startup against what the loop writes, so a column rename
//! surfaces as a status error instead of a failed insert.

use reagent_config::{TableName, TableNameManager};
use reagent_core::schema::{check_alignment, check_tables_have_schemas};
use serde_json::{Value, json};
use std::collections::HashMap;

fn agent_runs_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "run_id": { "type": "string", "minLength": 1, "maxLength": 36 },
            "agent_type": { "type": "string", "maxLength": 50 },
            "input_text": { "type": "string", "minLength": 1 },
            "output_text": { "type": ["string", "null"] },
            "status": { "type": "string", "enum": ["running", "success", "error"] },
            "error_message": { "type": ["string", "null"] },
            "latency_ms": { "type": ["integer", "null"], "minimum": 0 },
            "prompt_tokens": { "type": ["integer", "null"], "minimum": 0 },
            "completion_tokens": { "type": ["integer", "null"], "minimum": 0 },
            "total_tokens": { "type": ["integer", "null"], "minimum": 0 },
            "session_id": { "type": ["string", "null"] },
            "metadata": { "type": "object" },
            "created_at": { "type": "string" },
            "updated_at": { "type": "string" }
        },
        "required": ["run_id", "input_text", "status"]
    })
}

fn transcripts_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "messages": { "type": "array" },
            "message_count": { "type": "integer", "minimum": 0 },
            "metadata": { "type": "object" },
            "created_at": { "type": "string" },
            "updated_at": { "type": "string" }
        },
        "required": ["id", "messages"]
    })
}

/// Record schemas keyed by physical table name.
pub fn record_schemas(tables: &TableNameManager) -> HashMap<String, Value> {
    HashMap::from([
        (tables.get(TableName::AgentRuns), agent_runs_schema()),
        (tables.get(TableName::Transcripts), transcripts_schema()),
    ])
}

/// Fields a finished session produces for its run record.
pub fn run_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "run_id": { "type": "string" },
            "agent_type": { "type": "string" },
            "input_text": { "type": "string" },
            "output_text": { "type": ["string", "null"] },
            "status": { "type": "string" },
            "error_message": { "type": ["string", "null"] },
            "latency_ms": { "type": "integer" },
            "prompt_tokens": { "type": "integer" },
            "completion_tokens": { "type": "integer" },
            "total_tokens": { "type": "integer" },
            "session_id": { "type": "string" },
            "metadata": { "type": "object" }
        }
    })
}

/// Every table has a schema and the run output lines up with its record.
///
/// Returns human-readable problems; empty means consistent.
pub fn verify_record_schemas(tables: &TableNameManager) -> Vec<String> {
    let schemas = record_schemas(tables);
    let mut problems = check_tables_have_schemas(&tables.all(), &schemas);

    if let Some(record) = schemas.get(&tables.get(TableName::AgentRuns)) {
        problems.extend(check_alignment(&run_output_schema(), record, true));
    }
    problems
}
