//! Provider construction from configuration.
//!
//! Picks the backend named by `llm.provider`, applies the configured
//! timeout, and wraps it in a [`RetryProvider`] when retries are enabled.

use reagent_config::AppConfig;
use reagent_core::error::ProviderError;
use reagent_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryPolicy, RetryProvider};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_URL: &str = "http://localhost:11434/v1";

/// Build the provider described by `config`.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let llm = &config.llm;
    let timeout = Duration::from_secs(llm.timeout_secs);

    let require_key = || {
        llm.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "No API key for provider '{}'. Set REAGENT_API_KEY or llm.api_key",
                llm.provider
            ))
        })
    };

    let base: Arc<dyn Provider> = match llm.provider.as_str() {
        "openai" => Arc::new(OpenAiCompatProvider::with_timeout(
            "openai",
            llm.api_url.as_deref().unwrap_or(OPENAI_URL),
            require_key()?,
            timeout,
        )?),
        "openrouter" => Arc::new(OpenAiCompatProvider::with_timeout(
            "openrouter",
            llm.api_url.as_deref().unwrap_or(OPENROUTER_URL),
            require_key()?,
            timeout,
        )?),
        "ollama" => Arc::new(OpenAiCompatProvider::with_timeout(
            "ollama",
            llm.api_url.as_deref().unwrap_or(OLLAMA_URL),
            llm.api_key.clone().unwrap_or_else(|| "ollama".into()),
            timeout,
        )?),
        "custom" => {
            let url = llm.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("Provider 'custom' requires llm.api_url".into())
            })?;
            Arc::new(OpenAiCompatProvider::with_timeout(
                "custom",
                url,
                llm.api_key.clone().unwrap_or_default(),
                timeout,
            )?)
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "Unknown provider '{other}'"
            )));
        }
    };

    if config.retry.max_retries == 0 {
        debug!(provider = %base.name(), "Retries disabled");
        return Ok(base);
    }

    let delay = |field: &str, secs: f64| {
        Duration::try_from_secs_f64(secs).map_err(|e| {
            ProviderError::NotConfigured(format!("retry.{field} is not a valid duration: {e}"))
        })
    };
    let policy = RetryPolicy {
        max_retries: config.retry.max_retries,
        initial_delay: delay("initial_delay_secs", config.retry.initial_delay_secs)?,
        multiplier: config.retry.multiplier,
        max_delay: delay("max_delay_secs", config.retry.max_delay_secs)?,
    };
    debug!(provider = %base.name(), ?policy, "Wrapping provider with retry policy");
    Ok(Arc::new(RetryProvider::new(base, policy)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = provider.into();
        config.llm.api_key = key.map(String::from);
        config
    }

    #[test]
    fn openai_requires_key() {
        let err = build_from_config(&config("openai", None)).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(build_from_config(&config("openai", Some("sk-test"))).is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let provider = build_from_config(&config("ollama", None)).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn custom_requires_url() {
        assert!(build_from_config(&config("custom", None)).is_err());

        let mut cfg = config("custom", None);
        cfg.llm.api_url = Some("http://localhost:8000/v1".into());
        assert_eq!(build_from_config(&cfg).unwrap().name(), "custom");
    }

    #[test]
    fn unknown_provider_rejected() {
        assert!(build_from_config(&config("carrier-pigeon", Some("k"))).is_err());
    }

    #[test]
    fn retry_disabled_still_builds() {
        let mut cfg = config("openrouter", Some("or-key"));
        cfg.retry.max_retries = 0;
        assert_eq!(build_from_config(&cfg).unwrap().name(), "openrouter");
    }

    #[test]
    fn invalid_retry_delay_is_an_error() {
        let mut cfg = config("ollama", None);
        cfg.retry.initial_delay_secs = f64::NAN;
        let err = build_from_config(&cfg).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(ref msg) if msg.contains("initial_delay_secs")));

        let mut cfg = config("ollama", None);
        cfg.retry.max_delay_secs = -1.0;
        assert!(build_from_config(&cfg).is_err());
    }
}
