//! JSON Schema checks for tool arguments and stored records.
//!
//! [`validate`] covers the subset of JSON Schema that tool declarations use
//! in practice. Unknown keywords are ignored rather than rejected.
//!
//! [`check_alignment`] compares a model-output schema against a record
//! schema so a mismatch is caught at startup instead of at insert time.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Columns every record carries that output schemas never declare.
const SYSTEM_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Validate `value` against `schema`, returning every violation found.
///
/// Each violation is prefixed with a JSON-pointer-like path (`/` for the root).
pub fn validate(schema: &Value, value: &Value) -> Vec<String> {
    let mut violations = Vec::new();
    check(schema, value, "", &mut violations);
    violations
}

fn check(schema: &Value, value: &Value, path: &str, out: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        // `true`, `{}` and non-object schemas accept anything
        if schema == &Value::Bool(false) {
            out.push(format!("{}: no value allowed", display_path(path)));
        }
        return;
    };

    if let Some(expected) = schema.get("type")
        && !type_matches(expected, value)
    {
        out.push(format!(
            "{}: expected {}, got {}",
            display_path(path),
            type_label(expected),
            json_type(value)
        ));
        return;
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(value)
    {
        let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
        out.push(format!(
            "{}: must be one of [{}]",
            display_path(path),
            options.join(", ")
        ));
    }

    match value {
        Value::Object(obj) => check_object(schema, obj, path, out),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}/{i}"), out);
                }
            }
        }
        Value::Number(n) => {
            if let Some(n) = n.as_f64() {
                if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
                    && n < min
                {
                    out.push(format!("{}: {n} is less than minimum {min}", display_path(path)));
                }
                if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
                    && n > max
                {
                    out.push(format!("{}: {n} is greater than maximum {max}", display_path(path)));
                }
            }
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
                && len < min
            {
                out.push(format!("{}: shorter than {min} characters", display_path(path)));
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
                && len > max
            {
                out.push(format!("{}: longer than {max} characters", display_path(path)));
            }
        }
        _ => {}
    }
}

fn check_object(schema: &Map<String, Value>, obj: &Map<String, Value>, path: &str, out: &mut Vec<String>) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(key) {
                out.push(format!("{path}/{key}: required property missing"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (key, val) in obj {
        match properties.and_then(|p| p.get(key)) {
            Some(prop_schema) => check(prop_schema, val, &format!("{path}/{key}"), out),
            None => {
                if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                    out.push(format!("{path}/{key}: unexpected property"));
                }
            }
        }
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => single_type_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| single_type_matches(t, value)),
        _ => true,
    }
}

fn single_type_matches(t: &str, value: &Value) -> bool {
    match t {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => true,
    }
}

fn type_label(expected: &Value) -> String {
    match expected {
        Value::String(t) => t.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

// --- Schema alignment ---

/// Check that every property of `output_schema` exists in `record_schema`
/// with a compatible type.
///
/// In strict mode, record properties the output does not produce are also
/// reported, except the system columns `id`, `created_at`, `updated_at`.
pub fn check_alignment(output_schema: &Value, record_schema: &Value, strict: bool) -> Vec<String> {
    let empty = Map::new();
    let output_props = properties_of(output_schema).unwrap_or(&empty);
    let record_props = properties_of(record_schema).unwrap_or(&empty);
    let mut errors = Vec::new();

    for (name, out_prop) in output_props {
        let Some(rec_prop) = record_props.get(name) else {
            errors.push(format!("Output field '{name}' not found in record schema"));
            continue;
        };

        let out_type = base_type(out_prop);
        let rec_type = base_type(rec_prop);
        if let (Some(o), Some(r)) = (&out_type, &rec_type)
            && !types_compatible(o, r)
        {
            errors.push(format!(
                "Type mismatch for '{name}': output has '{o}', record has '{r}'"
            ));
        }
    }

    if strict {
        for name in record_props.keys() {
            if !output_props.contains_key(name) && !SYSTEM_FIELDS.contains(&name.as_str()) {
                errors.push(format!("Record field '{name}' not produced by output schema"));
            }
        }
    }

    errors
}

/// Report every table that has no registered schema.
pub fn check_tables_have_schemas(tables: &[String], registry: &HashMap<String, Value>) -> Vec<String> {
    tables
        .iter()
        .filter(|t| !registry.contains_key(t.as_str()))
        .map(|t| format!("Table '{t}' has no registered schema"))
        .collect()
}

fn properties_of(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

/// The declared type with any `"null"` alternative stripped.
fn base_type(prop: &Value) -> Option<String> {
    match prop.get("type")? {
        Value::String(t) => Some(t.clone()),
        Value::Array(types) => {
            let non_null: Vec<&str> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect();
            match non_null.as_slice() {
                [single] => Some(single.to_string()),
                [] => Some("null".to_string()),
                _ => Some(non_null.join("|")),
            }
        }
        _ => None,
    }
}

fn types_compatible(a: &str, b: &str) -> bool {
    let numeric = |t: &str| t == "integer" || t == "number";
    a == b || (numeric(a) && numeric(b))
}
