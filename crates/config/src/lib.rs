//! Configuration loading, validation, and management for Reagent.
//!
//! Loads configuration from `~/.reagent/config.toml` with environment
//! variable overrides. Precedence is env > file > defaults, and the merged
//! result is validated once before anyone uses it.

pub mod tables;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use tables::{DataLayer, TableName, TableNameManager};

/// Deployment environment. Also the prefix of every table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Stg,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Stg => "stg",
            Self::Prod => "prod",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" | "development" => Ok(Self::Dev),
            "stg" | "staging" => Ok(Self::Stg),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(ConfigError::ValidationError(format!(
                "unknown environment '{other}' (expected local, dev, stg or prod)"
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The root configuration structure.
///
/// Maps directly to `~/.reagent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Reasoning loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Provider retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Persistence settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider kind: "openai", "openrouter", "ollama" or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (required for "custom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    120
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model calls per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Name of the prompt template used as the system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Directory of extra prompt YAML files (defaults to `~/.reagent/prompts`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    120
}
fn default_system_prompt() -> String {
    "react_system".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            system_prompt: default_system_prompt(),
            prompts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 0 disables retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: f64,

    /// Backoff growth factor per attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Cap on any single backoff delay
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_secs() -> f64 {
    1.0
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_delay_secs() -> f64 {
    60.0
}

/// Upper bounds accepted by [`AppConfig::validate`] for the retry section.
pub const MAX_RETRIES: u32 = 10;
pub const MAX_RETRY_MULTIPLIER: f64 = 10.0;
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_secs: default_initial_delay_secs(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite://path`, `sqlite::memory:`, or "none" to disable persistence
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default)]
    pub layer: DataLayer,
}

fn default_database_url() -> String {
    "sqlite://~/.reagent/reagent.db".into()
}
fn default_pool_size() -> u32 {
    5
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // URLs may embed credentials
        let url = match self.url.split_once('@') {
            Some((_, host)) => format!("[REDACTED]@{host}"),
            None => self.url.clone(),
        };
        f.debug_struct("DatabaseConfig")
            .field("url", &url)
            .field("pool_size", &self.pool_size)
            .field("layer", &self.layer)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            layer: DataLayer::default(),
        }
    }
}

impl DatabaseConfig {
    /// Whether persistence is switched off.
    pub fn is_disabled(&self) -> bool {
        self.url.eq_ignore_ascii_case("none") || self.url.is_empty()
    }

    /// The URL with a leading `~/` in the path expanded to the home directory.
    pub fn resolved_url(&self) -> String {
        match self.url.strip_prefix("sqlite://~/") {
            Some(rest) => format!("sqlite://{}", dirs_home().join(rest).display()),
            None => self.url.clone(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log format '{other}' (expected console or json)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const PROVIDERS: [&str; 4] = ["openai", "openrouter", "ollama", "custom"];

impl AppConfig {
    /// Load configuration from the default path (~/.reagent/config.toml)
    /// and apply environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load from `path`, then apply environment variable overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    ///
    /// An exported API key replaces the file's. The provider's own variable
    /// (`OPENAI_API_KEY` for openai, `OPENROUTER_API_KEY` for openrouter)
    /// wins over the generic `REAGENT_API_KEY`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("APP_ENVIRONMENT") {
            self.environment = env.parse()?;
        }
        if let Some(provider) = lookup("REAGENT_PROVIDER") {
            self.llm.provider = provider;
        }
        let provider_key = match self.llm.provider.as_str() {
            "openai" => lookup("OPENAI_API_KEY"),
            "openrouter" => lookup("OPENROUTER_API_KEY"),
            _ => None,
        };
        if let Some(key) = provider_key.or_else(|| lookup("REAGENT_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("REAGENT_API_URL") {
            self.llm.api_url = Some(url);
        }
        if let Some(model) = lookup("REAGENT_MODEL").or_else(|| lookup("OPENAI_MODEL")) {
            self.llm.model = model;
        }
        if let Some(temp) = lookup("OPENAI_TEMPERATURE") {
            self.llm.temperature = temp.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("OPENAI_TEMPERATURE is not a number: '{temp}'"))
            })?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_ascii_lowercase();
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reagent")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory scanned for prompt YAML files.
    pub fn prompts_dir(&self) -> PathBuf {
        self.agent
            .prompts_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("prompts"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "llm.provider '{}' is not one of {}",
                self.llm.provider,
                PROVIDERS.join(", ")
            )));
        }

        if self.llm.provider == "custom" && self.llm.api_url.is_none() {
            return Err(ConfigError::ValidationError(
                "llm.api_url is required when llm.provider = \"custom\"".into(),
            ));
        }

        if self.llm.provider == "openai"
            && let Some(key) = &self.llm.api_key
            && !key.starts_with("sk-")
        {
            return Err(ConfigError::ValidationError(
                "OpenAI API key must start with 'sk-'".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if !(1..=100).contains(&self.database.pool_size) {
            return Err(ConfigError::ValidationError(
                "database.pool_size must be between 1 and 100".into(),
            ));
        }

        if self.retry.max_retries > MAX_RETRIES {
            return Err(ConfigError::ValidationError(format!(
                "retry.max_retries must be at most {MAX_RETRIES}"
            )));
        }

        // Range checks also reject NaN
        if !(1.0..=MAX_RETRY_MULTIPLIER).contains(&self.retry.multiplier) {
            return Err(ConfigError::ValidationError(format!(
                "retry.multiplier must be between 1.0 and {MAX_RETRY_MULTIPLIER}"
            )));
        }

        if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&self.retry.initial_delay_secs) {
            return Err(ConfigError::ValidationError(format!(
                "retry.initial_delay_secs must be between 0 and {MAX_RETRY_DELAY_SECS}"
            )));
        }

        if !(self.retry.initial_delay_secs..=MAX_RETRY_DELAY_SECS).contains(&self.retry.max_delay_secs) {
            return Err(ConfigError::ValidationError(format!(
                "retry.max_delay_secs must be between retry.initial_delay_secs and {MAX_RETRY_DELAY_SECS}"
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment, Environment::Local | Environment::Dev)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Table names for this environment and data layer.
    pub fn tables(&self) -> TableNameManager {
        TableNameManager::new(self.environment, self.database.layer)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for reagent_core::Error {
    fn from(e: ConfigError) -> Self {
        reagent_core::Error::Config {
            message: e.to_string(),
        }
    }
}
