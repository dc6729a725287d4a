use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::ai_provider::AiProviderTrait;
use crate::http::{client_with_timeout, ResponseExt};

/// Local Ollama Provider
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client_with_timeout(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl AiProviderTrait for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": prompt
            }],
            "stream": false,
            "format": "json"
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?
            .ensure_success("Ollama")
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;
        extract_text(&json)
    }
}

fn extract_text(json: &serde_json::Value) -> Result<String> {
    json["message"]["content"]
        .as_str()
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
        .context("Ollama returned an empty message")
}
