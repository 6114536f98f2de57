//! Text-generation configuration
//!
//! Reads provider selection, model and timeouts from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::provider::LlmProvider;
use crate::timeout::TimeoutProvider;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: `ollama` or `mock` (env: AGORA_LLM_PROVIDER)
    pub provider: String,
    /// Model name (env: AGORA_LLM_MODEL)
    pub model: String,
    /// Ollama base URL (env: OLLAMA_URL)
    pub ollama_url: String,
    /// Per-call timeout in seconds (env: AGORA_LLM_TIMEOUT_SECS)
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_secs = match env::var("AGORA_LLM_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("AGORA_LLM_TIMEOUT_SECS={}", raw)))?,
            Err(_) => defaults.timeout_secs,
        };
        let config = Self {
            provider: env::var("AGORA_LLM_PROVIDER").unwrap_or(defaults.provider),
            model: env::var("AGORA_LLM_MODEL").unwrap_or(defaults.model),
            ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        match self.provider.to_lowercase().as_str() {
            "ollama" | "mock" => Ok(()),
            other => Err(ConfigError::Invalid(format!("unknown provider '{}'", other))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the configured provider, wrapped with the call timeout
    pub fn build_provider(&self) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        self.validate()?;
        let provider: Arc<dyn LlmProvider> = match self.provider.to_lowercase().as_str() {
            "mock" => Arc::new(TimeoutProvider::new(
                MockProvider::constant("{}"),
                self.timeout(),
            )),
            _ => Arc::new(TimeoutProvider::new(
                OllamaProvider::with_url(&self.ollama_url, &self.model),
                self.timeout(),
            )),
        };
        Ok(provider)
    }
}
