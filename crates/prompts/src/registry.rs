//! Name-keyed collection of prompt templates.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::template::PromptTemplate;
use crate::PromptError;

/// Prompts compiled into the binary, as `(file name, YAML)` pairs.
pub const BUILTIN_PROMPTS: &[(&str, &str)] = &[(
    "react_system.yaml",
    include_str!("../prompts/react_system.yaml"),
)];

/// Registry for loading and managing prompt templates.
///
/// Registering a name twice replaces the earlier template, so a prompts
/// directory can override the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    prompts: HashMap<String, PromptTemplate>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in prompts (`react_system`).
    pub fn with_defaults() -> Result<Self, PromptError> {
        let mut registry = Self::new();
        for (file, yaml) in BUILTIN_PROMPTS {
            registry.load_from_str(yaml, file)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, prompt: PromptTemplate) {
        if self.prompts.contains_key(&prompt.name) {
            debug!(prompt = %prompt.name, version = %prompt.version, "Replacing prompt");
        }
        self.prompts.insert(prompt.name.clone(), prompt);
    }

    pub fn get(&self, name: &str) -> Result<&PromptTemplate, PromptError> {
        self.prompts.get(name).ok_or_else(|| PromptError::NotFound {
            name: name.to_string(),
            available: self.list(),
        })
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prompts.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Parse one YAML document and register it. `source` labels errors.
    pub fn load_from_str(&mut self, yaml: &str, source: &str) -> Result<PromptTemplate, PromptError> {
        let prompt: PromptTemplate = serde_yaml::from_str(yaml).map_err(|e| PromptError::Parse {
            source_name: source.to_string(),
            reason: e.to_string(),
        })?;
        prompt.check()?;
        self.register(prompt.clone());
        Ok(prompt)
    }

    /// Load and register a prompt from a YAML file.
    pub fn load_from_yaml(&mut self, path: &Path) -> Result<PromptTemplate, PromptError> {
        let content = std::fs::read_to_string(path).map_err(|e| PromptError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.load_from_str(&content, &path.display().to_string())
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`, in file-name order.
    ///
    /// A missing directory loads nothing.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<Vec<PromptTemplate>, PromptError> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Prompt directory not found, skipping");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir).map_err(|e| PromptError::Io {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        files.sort();

        let mut loaded = Vec::with_capacity(files.len());
        for path in &files {
            loaded.push(self.load_from_yaml(path)?);
        }
        info!(dir = %dir.display(), count = loaded.len(), "Loaded prompts");
        Ok(loaded)
    }

    /// Validation errors per prompt; prompts without errors are omitted.
    pub fn validate_all(&self) -> BTreeMap<String, Vec<String>> {
        self.prompts
            .iter()
            .filter_map(|(name, prompt)| {
                let errors = prompt.validate_variables();
                (!errors.is_empty()).then(|| (name.clone(), errors))
            })
            .collect()
    }

    /// Look up and format a prompt in one step.
    pub fn render(&self, name: &str, vars: &HashMap<String, String>) -> Result<String, PromptError> {
        self.get(name)?.format(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let mut registry = PromptRegistry::new();
        registry.register(PromptTemplate::new("test_prompt", "Test {var}").with_variables(["var"]));
        assert_eq!(registry.get("test_prompt").unwrap().name, "test_prompt");
    }

    #[test]
    fn unknown_prompt_lists_available() {
        let mut registry = PromptRegistry::new();
        registry.register(PromptTemplate::new("alpha", "A"));
        let err = registry.get("nonexistent").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("nonexistent"));
        assert!(text.contains("alpha"));
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = PromptRegistry::new();
        registry.register(PromptTemplate::new("prompt2", "Test"));
        registry.register(PromptTemplate::new("prompt1", "Test"));
        assert_eq!(registry.list(), vec!["prompt1", "prompt2"]);
    }

    #[test]
    fn load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test_prompt.yaml");
        std::fs::write(
            &file,
            r#"
name: yaml_prompt
version: "2.0.0"
description: A test prompt
template: "Hello {name}!"
variables:
  - name
"#,
        )
        .unwrap();

        let mut registry = PromptRegistry::new();
        let prompt = registry.load_from_yaml(&file).unwrap();
        assert_eq!(prompt.name, "yaml_prompt");
        assert_eq!(prompt.version, "2.0.0");
        assert_eq!(registry.get("yaml_prompt").unwrap(), &prompt);
    }

    #[test]
    fn load_from_directory_reads_yaml_and_yml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompt1.yaml"), "name: prompt1\ntemplate: Test 1\n").unwrap();
        std::fs::write(dir.path().join("prompt2.yml"), "name: prompt2\ntemplate: Test 2\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a prompt").unwrap();

        let mut registry = PromptRegistry::new();
        let loaded = registry.load_from_directory(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(registry.list(), vec!["prompt1", "prompt2"]);
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let mut registry = PromptRegistry::new();
        let loaded = registry
            .load_from_directory(Path::new("/nonexistent/prompts"))
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let mut registry = PromptRegistry::new();
        let err = registry.load_from_str("name: [unclosed", "inline").unwrap_err();
        assert!(matches!(err, PromptError::Parse { .. }));
    }

    #[test]
    fn validate_all_reports_only_invalid() {
        let mut registry = PromptRegistry::new();
        registry.register(PromptTemplate::new("valid", "Hello {name}!").with_variables(["name"]));
        registry.register(
            PromptTemplate::new("invalid", "Hello {name} {missing}!").with_variables(["name"]),
        );

        let errors = registry.validate_all();
        assert!(!errors.contains_key("valid"));
        assert!(errors["invalid"][0].contains("missing"));
    }

    #[test]
    fn defaults_include_valid_react_system() {
        let registry = PromptRegistry::with_defaults().unwrap();
        let prompt = registry.get("react_system").unwrap();
        assert_eq!(prompt.variables, vec!["tools"]);
        assert!(registry.validate_all().is_empty());

        let mut vars = HashMap::new();
        vars.insert("tools".to_string(), "- search: look things up".to_string());
        let rendered = registry.render("react_system", &vars).unwrap();
        assert!(rendered.contains("- search: look things up"));
        assert!(!rendered.contains("{tools}"));
    }

    #[test]
    fn directory_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("react_system.yaml"),
            "name: react_system\nversion: '2.0.0'\ntemplate: 'Tools: {tools}'\nvariables: tools\n",
        )
        .unwrap();

        let mut registry = PromptRegistry::with_defaults().unwrap();
        registry.load_from_directory(dir.path()).unwrap();
        assert_eq!(registry.get("react_system").unwrap().version, "2.0.0");
        assert_eq!(registry.len(), 1);
    }
}
