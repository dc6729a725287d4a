//! Quiz generation: remote quiz worker, optional LLM second tier, and the
//! hardcoded question used when both fail.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::ai_provider::AiProviderTrait;
use crate::fallback::Sourced;
use crate::http::{client_with_timeout, ResponseExt};

/// Question shown when no service produced a usable quiz
pub const FALLBACK_QUESTION: &str = "Which option best reflects the main point you were reading?";

/// Characters of page content included in an LLM quiz prompt
const PROMPT_EXCERPT_CHARS: usize = 700;

/// Multiple-choice comprehension quiz
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Quiz {
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            question: FALLBACK_QUESTION.to_string(),
            options: vec![
                "Main concept".to_string(),
                "Minor detail".to_string(),
                "Unrelated idea".to_string(),
            ],
            correct_index: 0,
            explanation: Some(
                "Checking the main idea is the fastest way to recover focus.".to_string(),
            ),
        }
    }

    /// A quiz without options cannot be shown
    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Decode a quiz worker response body
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a quiz object or carries no options.
    pub fn from_worker_body(body: &str) -> Result<Self> {
        let quiz: Self =
            serde_json::from_str(body).context("Failed to parse quiz worker response")?;
        if !quiz.has_options() {
            anyhow::bail!("Quiz worker returned a quiz without options");
        }
        Ok(quiz)
    }
}

/// Payload POSTed to the quiz worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub content: String,
    pub title: String,
}

/// Source of quiz content
#[async_trait]
pub trait QuizService: Send + Sync {
    /// Generate a quiz for the given page content
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the result is malformed.
    async fn generate(&self, request: &QuizRequest) -> Result<Quiz>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Remote quiz worker reached over HTTP
pub struct HttpQuizService {
    client: Client,
    url: String,
}

impl HttpQuizService {
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
impl QuizService for HttpQuizService {
    async fn generate(&self, request: &QuizRequest) -> Result<Quiz> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to quiz worker")?
            .ensure_success("Quiz worker")
            .await?;

        let body = response
            .text()
            .await
            .context("Failed to read quiz worker response")?;
        Quiz::from_worker_body(&body)
    }

    fn name(&self) -> &str {
        "quiz worker"
    }
}

/// Quiz generated by prompting an LLM provider
pub struct LlmQuizService {
    provider: Box<dyn AiProviderTrait>,
}

impl LlmQuizService {
    #[must_use]
    pub fn new(provider: Box<dyn AiProviderTrait>) -> Self {
        Self { provider }
    }

    fn build_prompt(request: &QuizRequest) -> String {
        let excerpt: String = request.content.chars().take(PROMPT_EXCERPT_CHARS).collect();
        format!(
            "Create one quick comprehension MCQ from this content.\n\
             \n\
             Title: {}\n\
             Content excerpt: \"{}\"\n\
             \n\
             Return JSON:\n\
             {{\n  \"question\": \"brief question\",\n  \"options\": [\"A\", \"B\", \"C\"],\n  \"correctIndex\": 0,\n  \"explanation\": \"why this concept matters\"\n}}",
            request.title, excerpt
        )
    }

    /// Pull the first JSON object out of a chatty reply and validate it
    fn parse_reply(reply: &str) -> Result<Quiz> {
        let re = Regex::new(r"(?s)\{.*\}").context("Invalid quiz JSON pattern")?;
        let json = re
            .find(reply)
            .context("LLM reply contained no JSON object")?
            .as_str();
        let quiz: Quiz = serde_json::from_str(json)
            .with_context(|| format!("Failed to parse quiz JSON from LLM reply: {reply}"))?;

        if quiz.question.trim().is_empty() || !quiz.has_options() {
            anyhow::bail!("LLM quiz is missing a question or options");
        }
        Ok(quiz)
    }
}

#[async_trait]
impl QuizService for LlmQuizService {
    async fn generate(&self, request: &QuizRequest) -> Result<Quiz> {
        let prompt = Self::build_prompt(request);
        let reply = self.provider.generate(&prompt).await?;
        Self::parse_reply(&reply)
    }

    fn name(&self) -> &str {
        self.provider.model_name()
    }
}

/// Ordered list of quiz sources ending in the hardcoded quiz
#[derive(Clone)]
pub struct QuizChain {
    services: Vec<Arc<dyn QuizService>>,
}

impl QuizChain {
    #[must_use]
    pub fn new(services: Vec<Arc<dyn QuizService>>) -> Self {
        Self { services }
    }

    /// Chain with no remote sources; always yields the fallback quiz
    #[must_use]
    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    /// Try each source in order; never fails
    pub async fn generate(&self, request: &QuizRequest) -> Sourced<Quiz> {
        for service in &self.services {
            match service.generate(request).await {
                Ok(quiz) => return Sourced::Remote(quiz),
                Err(e) => log::warn!("Quiz source '{}' failed: {e:#}", service.name()),
            }
        }
        log::info!("All quiz sources failed, using fallback quiz");
        Sourced::Fallback(Quiz::fallback())
    }
}
