use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fyx_ai::{PageContext, Quiz, Sourced};
use fyx_storage::{Database, InterventionKind, InterventionLogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::signal::TabId;

pub const DRIFT_NUDGE_MESSAGE: &str =
    "You are drifting. Quick reset: summarize the main idea in one sentence.";
pub const QUIZ_INTRO_MESSAGE: &str = "Focus check time.";
pub const BREAK_MESSAGE: &str = "Take a 60-second break. Look away, breathe, then come back.";
pub const GENERIC_NUDGE_MESSAGE: &str = "Stay with the task for 90 more seconds.";
pub const PASSIVE_NUDGE_MESSAGE: &str =
    "You seem slightly off-track. Close one distractor tab and spend 60 seconds on the main idea.";

/// What the tab should render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionAction {
    ShowNudge,
    StartQuiz,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

/// Message sent to a tab's UI surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionMessage {
    pub action: InterventionAction,
    pub payload: InterventionPayload,
}

impl InterventionMessage {
    #[must_use]
    pub fn nudge(message: &str, score: Option<u8>) -> Self {
        Self {
            action: InterventionAction::ShowNudge,
            payload: InterventionPayload {
                message: message.to_string(),
                score,
                quiz: None,
            },
        }
    }

    #[must_use]
    pub fn quiz(message: &str, quiz: Quiz) -> Self {
        Self {
            action: InterventionAction::StartQuiz,
            payload: InterventionPayload {
                message: message.to_string(),
                score: None,
                quiz: Some(quiz),
            },
        }
    }
}

/// Channel to the content script running in a tab
#[async_trait]
pub trait TabMessenger: Send + Sync {
    /// Deliver an intervention to the tab
    ///
    /// # Errors
    ///
    /// Returns an error if the tab is gone or does not answer.
    async fn send_intervention(&self, tab_id: TabId, message: &InterventionMessage)
        -> Result<()>;

    /// Ask the tab for its page context
    ///
    /// # Errors
    ///
    /// Returns an error if the tab is gone or does not answer.
    async fn request_context(&self, tab_id: TabId) -> Result<PageContext>;
}

/// Sends interventions to tabs and keeps the persisted log
pub struct InterventionDispatcher {
    messenger: Arc<dyn TabMessenger>,
    database: Option<Arc<Database>>,
    log_limit: usize,
}

impl InterventionDispatcher {
    #[must_use]
    pub fn new(messenger: Arc<dyn TabMessenger>) -> Self {
        Self {
            messenger,
            database: None,
            log_limit: 30,
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: Arc<Database>, log_limit: usize) -> Self {
        self.database = Some(database);
        self.log_limit = log_limit;
        self
    }

    /// Send an intervention; delivery failures are logged and swallowed.
    /// Returns whether the tab accepted the message.
    pub async fn dispatch(
        &self,
        tab_id: TabId,
        message: &InterventionMessage,
        kind: InterventionKind,
        score: u8,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        log::info!(
            "Dispatching {kind} to tab {tab_id} (score {score}, action {:?})",
            message.action
        );
        let delivered = match self.messenger.send_intervention(tab_id, message).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to deliver {kind} to tab {tab_id}: {e:#}");
                false
            }
        };

        self.persist(&InterventionLogEntry::dispatched(
            tab_id,
            now,
            kind,
            score,
            reason,
            Some(message.payload.message.clone()),
        ));
        delivered
    }

    /// Page context from the tab, or an empty context if it cannot answer
    pub async fn page_context(&self, tab_id: TabId) -> Sourced<PageContext> {
        Sourced::or_fallback(
            self.messenger.request_context(tab_id).await,
            "Page context request",
            PageContext::default,
        )
    }

    /// Persist a reported outcome
    pub fn record_outcome(
        &self,
        tab_id: TabId,
        kind: InterventionKind,
        correct: u32,
        dismissed: bool,
        duration_ms: u64,
        now: DateTime<Utc>,
    ) {
        self.persist(&InterventionLogEntry::outcome(
            tab_id,
            now,
            kind,
            correct,
            dismissed,
            duration_ms,
        ));
    }

    fn persist(&self, entry: &InterventionLogEntry) {
        if let Some(db) = &self.database {
            if let Err(e) = db.append_intervention(entry, self.log_limit) {
                log::warn!("Failed to persist intervention log entry: {e:#}");
            }
        }
    }
}
