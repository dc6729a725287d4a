use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::{google::GoogleGenAiProvider, ollama::OllamaProvider};

/// Environment variable consulted when no API key is configured
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Supported LLM backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Google,
    Ollama,
}

impl AiProvider {
    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::Google => "gemini-2.5-flash",
            Self::Ollama => "llama3.2",
        }
    }

    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

/// LLM configuration for the second-tier quiz generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: AiProvider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl AiConfig {
    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Configured key, falling back to the environment
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// Trait for AI providers
#[async_trait]
pub trait AiProviderTrait: Send + Sync {
    /// Generate text response for a given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

/// Create a provider instance based on configuration; every request is bounded by `timeout`
///
/// # Errors
///
/// Returns an error if the API key is missing for providers that require one (Google),
/// or if the HTTP client cannot be built.
pub fn create_provider(config: &AiConfig, timeout: Duration) -> Result<Box<dyn AiProviderTrait>> {
    let model = config.effective_model();
    let base_url = config.effective_base_url();

    match config.provider {
        AiProvider::Google => {
            let api_key = config
                .effective_api_key()
                .context("API Key required for Google GenAI")?;
            Ok(Box::new(GoogleGenAiProvider::new(&api_key, model, base_url, timeout)?))
        }
        AiProvider::Ollama => Ok(Box::new(OllamaProvider::new(base_url, model, timeout)?)),
    }
}
