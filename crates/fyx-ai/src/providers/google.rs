use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::ai_provider::AiProviderTrait;
use crate::http::{client_with_timeout, ResponseExt};

/// Google GenAI (Gemini) Provider
pub struct GoogleGenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GoogleGenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client_with_timeout(timeout)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AiProviderTrait for GoogleGenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{
                    "text": prompt
                }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.4
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Google AI")?
            .ensure_success("Google AI")
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Google AI response")?;
        extract_text(&json)
    }
}

/// First candidate's text: `candidates[0].content.parts[0].text`
fn extract_text(json: &serde_json::Value) -> Result<String> {
    json["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(ToString::to_string)
        .context("Failed to extract text from Google AI response")
}
