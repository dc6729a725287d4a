//! Inbound messages from content scripts, routed to the agent.

use chrono::{DateTime, Utc};
use fyx_ai::{Quiz, QuizRequest};
use fyx_storage::InterventionKind;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::agent::{FocusAgent, OutcomeReport, PassiveOutcome};
use crate::classifier::AgentState;
use crate::error::AgentError;
use crate::signal::{CameraUserState, SignalSample, TabId};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    Signal {
        #[serde(default)]
        payload: SignalSample,
    },
    Result {
        #[serde(default, deserialize_with = "lenient_kind")]
        kind: Option<InterventionKind>,
        #[serde(default)]
        correct: Option<u32>,
        #[serde(default)]
        dismissed: Option<bool>,
        #[serde(default, rename = "durationMs")]
        duration_ms: Option<u64>,
    },
    InterventionDismissed {
        #[serde(default)]
        reason: Option<String>,
    },
    CameraState {
        #[serde(default, rename = "userState")]
        user_state: CameraUserState,
    },
    GenQuiz {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    /// Periodic check from a tab that has no agent yet
    PassiveCheck {
        #[serde(default)]
        payload: SignalSample,
    },
}

/// A result of unrecognised kind still closes the open intervention, as a quiz
fn lenient_kind<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<InterventionKind>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.map(|value| {
        value
            .as_str()
            .and_then(|kind| kind.parse().ok())
            .unwrap_or_else(|| {
                log::debug!("Unrecognised result kind {value}, treating as quiz");
                InterventionKind::Quiz
            })
    }))
}

/// Response sent back to the message's sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<AgentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive: Option<PassiveOutcome>,
}

impl Reply {
    fn ok() -> Self {
        Self {
            success: true,
            state: None,
            score: None,
            quiz: None,
            backoff_active: None,
            passive: None,
        }
    }
}

pub struct MessageRouter {
    agent: Arc<FocusAgent>,
}

impl MessageRouter {
    #[must_use]
    pub fn new(agent: Arc<FocusAgent>) -> Self {
        Self { agent }
    }

    #[must_use]
    pub fn agent(&self) -> &Arc<FocusAgent> {
        &self.agent
    }

    /// Parse and route a raw JSON message
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` for unparseable JSON and `MissingTabId` for
    /// tab-scoped messages without a sender tab.
    pub async fn handle_json(
        &self,
        sender: Option<TabId>,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, AgentError> {
        let message: InboundMessage = serde_json::from_str(raw)?;
        self.handle_at(sender, message, now).await
    }

    /// Route a message received now
    ///
    /// # Errors
    ///
    /// Returns `MissingTabId` for tab-scoped messages without a sender tab.
    pub async fn handle(
        &self,
        sender: Option<TabId>,
        message: InboundMessage,
    ) -> Result<Reply, AgentError> {
        self.handle_at(sender, message, Utc::now()).await
    }

    /// # Errors
    ///
    /// Returns `MissingTabId` for tab-scoped messages without a sender tab.
    pub async fn handle_at(
        &self,
        sender: Option<TabId>,
        message: InboundMessage,
        now: DateTime<Utc>,
    ) -> Result<Reply, AgentError> {
        match message {
            InboundMessage::Signal { payload } => {
                let tab_id = sender.ok_or(AgentError::MissingTabId)?;
                let outcome = self.agent.handle_signal_at(tab_id, payload, now).await;
                Ok(Reply {
                    state: Some(outcome.state),
                    score: Some(outcome.score),
                    ..Reply::ok()
                })
            }
            InboundMessage::Result {
                kind,
                correct,
                dismissed,
                duration_ms,
            } => {
                let tab_id = sender.ok_or(AgentError::MissingTabId)?;
                let report = OutcomeReport {
                    kind: kind.unwrap_or(InterventionKind::Quiz),
                    correct: correct.unwrap_or(0),
                    dismissed: dismissed.unwrap_or(false),
                    duration_ms: duration_ms.unwrap_or(0),
                };
                let state = self.agent.report_outcome_at(tab_id, report, now).await;
                Ok(Reply {
                    state: Some(state),
                    ..Reply::ok()
                })
            }
            InboundMessage::InterventionDismissed { reason } => {
                log::debug!("Intervention dismissed ({})", reason.as_deref().unwrap_or("unknown"));
                self.agent.record_dismissal_at(now).await;
                Ok(Reply {
                    backoff_active: Some(self.agent.is_backing_off_at(now).await),
                    ..Reply::ok()
                })
            }
            InboundMessage::CameraState { user_state } => {
                self.agent.set_camera_state(user_state).await;
                Ok(Reply::ok())
            }
            InboundMessage::GenQuiz { content, title } => {
                let request = QuizRequest {
                    content: content.unwrap_or_default(),
                    title: title.unwrap_or_else(|| "Untitled".to_string()),
                };
                let quiz = self.agent.generate_quiz(&request).await.into_inner();
                Ok(Reply {
                    quiz: Some(quiz),
                    ..Reply::ok()
                })
            }
            InboundMessage::PassiveCheck { payload } => {
                let tab_id = sender.ok_or(AgentError::MissingTabId)?;
                let outcome = self.agent.passive_check_at(tab_id, payload, now).await;
                Ok(Reply {
                    score: Some(outcome.score),
                    passive: Some(outcome),
                    ..Reply::ok()
                })
            }
        }
    }
}
