//! Replays recorded tab messages through a live agent.
//!
//! Each non-empty line of the input is a JSON object:
//! `{"tab": 1, "at": "2024-01-01T10:00:00Z", "message": {...}, "context": {...}}`.
//! `tab`, `at` and `context` are optional; `context` becomes the tab's answer to
//! page context requests from then on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fyx_ai::{DecisionRequest, DecisionResponse, DecisionService, PageContext, QuizChain};
use fyx_core::{
    FocusAgent, FyxConfig, InboundMessage, InterventionMessage, MessageRouter, TabId, TabMessenger,
};
use fyx_storage::Database;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Deserialize)]
struct ReplayLine {
    #[serde(default)]
    tab: Option<TabId>,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
    message: serde_json::Value,
    #[serde(default)]
    context: Option<PageContext>,
}

/// Tab stand-in that prints interventions and serves recorded page contexts
#[derive(Default)]
struct ReplayMessenger {
    contexts: RwLock<HashMap<TabId, PageContext>>,
    dispatched: AtomicUsize,
}

impl ReplayMessenger {
    async fn set_context(&self, tab_id: TabId, context: PageContext) {
        self.contexts.write().await.insert(tab_id, context);
    }

    fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TabMessenger for ReplayMessenger {
    async fn send_intervention(&self, tab_id: TabId, message: &InterventionMessage) -> Result<()> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        println!(
            "  -> tab {tab_id}: {}",
            serde_json::to_string(message).context("Failed to encode intervention")?
        );
        Ok(())
    }

    async fn request_context(&self, tab_id: TabId) -> Result<PageContext> {
        self.contexts
            .read()
            .await
            .get(&tab_id)
            .cloned()
            .with_context(|| format!("No page context recorded for tab {tab_id}"))
    }
}

/// Decision service for `--offline`: every call takes the fallback path
struct OfflineDecision;

#[async_trait]
impl DecisionService for OfflineDecision {
    async fn decide(&self, _request: &DecisionRequest) -> Result<DecisionResponse> {
        anyhow::bail!("offline mode")
    }
}

fn build_agent(
    config: &FyxConfig,
    messenger: Arc<ReplayMessenger>,
    offline: bool,
) -> Result<FocusAgent> {
    if !offline {
        return FocusAgent::from_config(config, messenger);
    }
    let agent = FocusAgent::new(config, messenger, Arc::new(OfflineDecision), QuizChain::offline());
    if !config.storage.enabled {
        return Ok(agent);
    }
    let db = Database::new(config.storage.db_path.clone())?;
    Ok(agent.with_database(Arc::new(db), config.storage.log_limit))
}

/// Counts reported at the end of a replay
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    messages: usize,
    rejected: usize,
}

async fn replay_lines(
    router: &MessageRouter,
    messenger: &ReplayMessenger,
    input: &str,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = index + 1;
        let entry: ReplayLine = serde_json::from_str(line)
            .with_context(|| format!("Invalid replay entry on line {line_no}"))?;

        if let (Some(tab_id), Some(context)) = (entry.tab, entry.context) {
            messenger.set_context(tab_id, context).await;
        }

        summary.messages += 1;
        let at = entry.at.unwrap_or_else(Utc::now);
        let reply = match serde_json::from_value::<InboundMessage>(entry.message) {
            Ok(message) => router.handle_at(entry.tab, message, at).await,
            Err(e) => Err(e.into()),
        };

        match reply {
            Ok(reply) => println!(
                "[{line_no}] {}",
                serde_json::to_string(&reply).context("Failed to encode reply")?
            ),
            Err(e) => {
                summary.rejected += 1;
                log::warn!("Line {line_no} rejected: {e}");
            }
        }
    }
    Ok(summary)
}

pub async fn handle_replay_command(config: &FyxConfig, file: &Path, offline: bool) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let messenger = Arc::new(ReplayMessenger::default());
    let agent = Arc::new(build_agent(config, messenger.clone(), offline)?);
    let router = MessageRouter::new(agent.clone());

    let summary = replay_lines(&router, &messenger, &input).await?;

    println!(
        "\nReplayed {} messages ({} rejected), {} interventions dispatched",
        summary.messages,
        summary.rejected,
        messenger.dispatched()
    );
    for tab_id in agent.tabs().await {
        if let Some(record) = agent.snapshot(tab_id).await {
            println!(
                "  tab {tab_id}: {} (score {}, {} recent interventions)",
                record.state,
                record.distraction_score,
                record.recent_interventions.len()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fyx_core::AgentState;

    fn offline_router(messenger: Arc<ReplayMessenger>) -> MessageRouter {
        let agent = FocusAgent::new(
            &FyxConfig::default(),
            messenger,
            Arc::new(OfflineDecision),
            QuizChain::offline(),
        );
        MessageRouter::new(Arc::new(agent))
    }

    #[tokio::test]
    async fn test_replay_escalates_and_completes_quiz() {
        let messenger = Arc::new(ReplayMessenger::default());
        let router = offline_router(messenger.clone());
        let input = r#"
# distracted tab, then the quiz result
{"tab": 1, "at": "2024-01-01T10:00:00Z", "context": {"title": "Docs", "snippet": "text"}, "message": {"type": "SIGNAL", "payload": {"visible": false, "faceDetected": false, "tabSwitchesLastMinute": 5, "interactionBursts": 10}}}
{"tab": 1, "at": "2024-01-01T10:01:00Z", "message": {"type": "RESULT", "correct": 1, "durationMs": 5000}}
{"at": "2024-01-01T10:01:00Z", "message": {"type": "SIGNAL", "payload": {}}}
"#;

        let summary = replay_lines(&router, &messenger, input).await.unwrap();
        assert_eq!(summary, ReplaySummary { messages: 3, rejected: 1 });
        assert_eq!(messenger.dispatched(), 1);

        let record = router.agent().snapshot(1).await.unwrap();
        assert_eq!(record.state, AgentState::Cooldown);
        assert!(!record.intervention_in_progress);
    }

    #[tokio::test]
    async fn test_recorded_context_is_served() {
        let messenger = ReplayMessenger::default();
        assert!(messenger.request_context(3).await.is_err());

        let context = PageContext {
            title: Some("Notes".to_string()),
            ..PageContext::default()
        };
        messenger.set_context(3, context.clone()).await;
        assert_eq!(messenger.request_context(3).await.unwrap(), context);
    }

    #[tokio::test]
    async fn test_malformed_line_is_an_error() {
        let messenger = Arc::new(ReplayMessenger::default());
        let router = offline_router(messenger.clone());
        assert!(replay_lines(&router, &messenger, "{not json").await.is_err());
    }
}
