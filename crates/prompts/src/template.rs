//! A single versioned prompt template.

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::PromptError;

/// `{{` and `}}` are escapes; `{name}` is a placeholder.
const PLACEHOLDER_PATTERN: &str = r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}";

static PLACEHOLDER: LazyLock<Result<Regex, String>> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).map_err(|e| e.to_string()));

/// A prompt with `{variable}` placeholders and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    pub template: String,

    /// Required variables. YAML may give a list, a single string, or nothing.
    #[serde(default, deserialize_with = "one_or_many")]
    pub variables: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".into()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            template: template.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Reject templates that cannot be used at all.
    pub fn check(&self) -> Result<(), PromptError> {
        if self.name.trim().is_empty() {
            return Err(PromptError::Invalid("prompt name must not be empty".into()));
        }
        if self.template.trim().is_empty() {
            return Err(PromptError::Invalid(format!(
                "prompt '{}' has an empty template",
                self.name
            )));
        }
        Ok(())
    }

    /// Split the template into literal text and placeholders.
    fn pieces(&self) -> Result<Vec<Piece<'_>>, PromptError> {
        let re = PLACEHOLDER.as_ref().map_err(|e| PromptError::Invalid(e.clone()))?;
        let mut pieces = Vec::new();
        let mut last = 0;

        for caps in re.captures_iter(&self.template) {
            let Some(whole) = caps.get(0) else { continue };
            pieces.push(Piece::Text(&self.template[last..whole.start()]));
            match caps.get(1) {
                Some(name) => pieces.push(Piece::Var(name.as_str())),
                // escaped brace: keep one of the pair
                None => pieces.push(Piece::Text(&whole.as_str()[..1])),
            }
            last = whole.end();
        }
        pieces.push(Piece::Text(&self.template[last..]));
        Ok(pieces)
    }

    /// Placeholder names used in the template.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, PromptError> {
        Ok(self
            .pieces()?
            .into_iter()
            .filter_map(|p| match p {
                Piece::Var(name) => Some(name.to_string()),
                Piece::Text(_) => None,
            })
            .collect())
    }

    /// Substitute variables. Extra variables are ignored.
    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String, PromptError> {
        let pieces = self.pieces()?;

        let mut missing: BTreeSet<String> = self
            .variables
            .iter()
            .filter(|v| !vars.contains_key(v.as_str()))
            .cloned()
            .collect();
        for piece in &pieces {
            if let Piece::Var(name) = piece
                && !vars.contains_key(*name)
            {
                missing.insert(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(PromptError::MissingVariables {
                prompt: self.name.clone(),
                missing: missing.into_iter().collect(),
            });
        }

        let mut out = String::with_capacity(self.template.len());
        for piece in pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => out.push_str(vars.get(name).map(String::as_str).unwrap_or_default()),
            }
        }
        Ok(out)
    }

    /// Convenience form of [`format`](Self::format) for literal pairs.
    pub fn format_with(&self, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.format(&map)
    }

    /// Compare placeholders with declared variables.
    pub fn validate_variables(&self) -> Vec<String> {
        let placeholders = match self.placeholders() {
            Ok(p) => p,
            Err(e) => return vec![e.to_string()],
        };
        let declared: BTreeSet<String> = self.variables.iter().cloned().collect();
        let mut errors = Vec::new();

        let undeclared: Vec<&str> = placeholders.difference(&declared).map(String::as_str).collect();
        if !undeclared.is_empty() {
            errors.push(format!("Undeclared variables in template: {}", undeclared.join(", ")));
        }

        let unused: Vec<&str> = declared.difference(&placeholders).map(String::as_str).collect();
        if !unused.is_empty() {
            errors.push(format!("Declared but unused variables: {}", unused.join(", ")));
        }

        errors
    }
}
