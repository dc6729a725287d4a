//! Remote decision service: given a distracted tab's signal, score and
//! history, chooses which intervention tool to use.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::{client_with_timeout, ResponseExt};

/// Tool name that routes to quiz generation
pub const TOOL_GENERATE_QUIZ: &str = "generate_quiz";
/// Tool name that routes to a break suggestion
pub const TOOL_SUGGEST_BREAK: &str = "suggest_break";
/// Action name that routes to a break suggestion
pub const ACTION_SUGGEST_BREAK: &str = "SUGGEST_BREAK";
/// Action carried by the fallback decision
pub const ACTION_START_QUIZ: &str = "START_QUIZ";

/// Page context reported by the tab on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageContext {
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub content_type: Option<String>,
}

/// Payload POSTed to the decision endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub signal: serde_json::Value,
    pub score: u8,
    pub state: String,
    pub context: PageContext,
    pub recent_interventions: serde_json::Value,
}

/// Decision returned by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionResponse {
    pub action: Option<String>,
    pub tool: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub topic: Option<String>,
    pub quiz: Option<serde_json::Value>,
    pub challenge: Option<serde_json::Value>,
}

/// Intervention branch selected by a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRoute {
    Quiz,
    Break,
    Nudge,
}

impl DecisionResponse {
    /// Decision used whenever the service cannot be reached
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            action: Some(ACTION_START_QUIZ.to_string()),
            tool: Some(TOOL_GENERATE_QUIZ.to_string()),
            reason: Some("fallback".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn route(&self) -> DecisionRoute {
        let tool = self.tool.as_deref();
        if tool == Some(TOOL_GENERATE_QUIZ) {
            DecisionRoute::Quiz
        } else if tool == Some(TOOL_SUGGEST_BREAK)
            || self.action.as_deref() == Some(ACTION_SUGGEST_BREAK)
        {
            DecisionRoute::Break
        } else {
            DecisionRoute::Nudge
        }
    }

    /// Decode a decide worker response body
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object.
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("Failed to parse decide worker response")
    }

    /// The decision's own message, ignoring blank strings
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// Black-box decision provider
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Ask the service which intervention to run
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or an undecodable body.
    async fn decide(&self, request: &DecisionRequest) -> Result<DecisionResponse>;
}

/// Decision service reached over HTTP
pub struct HttpDecisionService {
    client: Client,
    url: String,
}

impl HttpDecisionService {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client_with_timeout(timeout)?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    async fn decide(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to decide worker")?
            .ensure_success("Decide worker")
            .await?;

        let body = response
            .text()
            .await
            .context("Failed to read decide worker response")?;
        let decision = DecisionResponse::from_body(&body)?;
        log::debug!(
            "Decide worker chose tool={:?} action={:?} reason={:?}",
            decision.tool,
            decision.action,
            decision.reason
        );
        Ok(decision)
    }
}
