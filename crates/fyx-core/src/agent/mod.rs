//! Per-tab attention agent.
//!
//! Each signal is scored, classified and, unless the tab is cooling down or
//! already intervening, turned into a nudge (drifting) or an escalation
//! (distracted) that consults the remote decision service. Record updates
//! happen in short synchronous sections; remote calls and tab messaging run
//! with no lock held.

#[cfg(test)]
mod tests;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fyx_ai::decision::TOOL_SUGGEST_BREAK;
use fyx_ai::{
    create_provider, DecisionRequest, DecisionResponse, DecisionRoute, DecisionService,
    HttpDecisionService, HttpQuizService, LlmQuizService, PageContext, QuizChain, QuizRequest,
    QuizService, Sourced,
};
use fyx_storage::{Database, InterventionKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::classifier::{classify, AgentState, DRIFTING_THRESHOLD};
use crate::config::FyxConfig;
use crate::cooldown::{saturating_add, BackoffTracker, CooldownPolicy};
use crate::dispatcher::{
    InterventionDispatcher, InterventionMessage, TabMessenger, BREAK_MESSAGE, DRIFT_NUDGE_MESSAGE,
    GENERIC_NUDGE_MESSAGE, PASSIVE_NUDGE_MESSAGE, QUIZ_INTRO_MESSAGE,
};
use crate::scoring;
use crate::signal::{CameraUserState, SignalSample, TabId};
use crate::store::{AgentRecord, AgentStore, OutcomeRecord};

/// Title sent to the quiz service when the page has none
const UNTITLED_PAGE: &str = "Current Page";

/// Score and state reported back for a processed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalOutcome {
    pub state: AgentState,
    pub score: u8,
}

/// Outcome report from the tab UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeReport {
    pub kind: InterventionKind,
    pub correct: u32,
    pub dismissed: bool,
    pub duration_ms: u64,
}

/// What the passive check did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassiveAction {
    /// A tab agent exists and owns interventions
    AgentActive,
    CoolingDown,
    Quiet,
    Nudge,
    Intervention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassiveOutcome {
    pub action: PassiveAction,
    pub score: u8,
    pub threshold: u8,
}

/// What the synchronous section decided to do after releasing the lock
enum NextStep {
    Done(AgentState),
    DriftNudge,
    Escalate(Vec<OutcomeRecord>),
}

pub struct FocusAgent {
    store: AgentStore,
    dispatcher: InterventionDispatcher,
    decision_service: Arc<dyn DecisionService>,
    quiz_chain: QuizChain,
    policy: CooldownPolicy,
    backoff: Mutex<BackoffTracker>,
    camera_state: RwLock<CameraUserState>,
    /// Last intervention sent by the passive check, across all tabs
    last_passive_at: Mutex<Option<DateTime<Utc>>>,
    active_idle_secs: u64,
}

impl FocusAgent {
    #[must_use]
    pub fn new(
        config: &FyxConfig,
        messenger: Arc<dyn TabMessenger>,
        decision_service: Arc<dyn DecisionService>,
        quiz_chain: QuizChain,
    ) -> Self {
        Self {
            store: AgentStore::new(config.agent.history_limit),
            dispatcher: InterventionDispatcher::new(messenger),
            decision_service,
            quiz_chain,
            policy: CooldownPolicy::from_settings(&config.agent),
            backoff: Mutex::new(BackoffTracker::from_settings(&config.backoff)),
            camera_state: RwLock::new(CameraUserState::Unknown),
            last_passive_at: Mutex::new(None),
            active_idle_secs: config.agent.active_idle_secs,
        }
    }

    /// Wire the HTTP services, optional LLM quiz tier and intervention log from config
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client or the database cannot be created.
    pub fn from_config(config: &FyxConfig, messenger: Arc<dyn TabMessenger>) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.timeout_secs);
        let decision = Arc::new(HttpDecisionService::new(&config.services.decide_url, timeout)?);

        let mut quiz_sources: Vec<Arc<dyn QuizService>> = vec![Arc::new(HttpQuizService::new(
            &config.services.quiz_url,
            timeout,
        )?)];
        if config.ai.enabled {
            match create_provider(&config.ai, timeout) {
                Ok(provider) => {
                    log::info!("LLM quiz fallback enabled ({})", provider.model_name());
                    quiz_sources.push(Arc::new(LlmQuizService::new(provider)));
                }
                Err(e) => log::warn!("LLM quiz fallback disabled: {e:#}"),
            }
        }

        let agent = Self::new(config, messenger, decision, QuizChain::new(quiz_sources));
        if !config.storage.enabled {
            return Ok(agent);
        }
        let db = Database::new(config.storage.db_path.clone())?;
        Ok(agent.with_database(Arc::new(db), config.storage.log_limit))
    }

    /// Persist dispatches and outcomes to `database`
    #[must_use]
    pub fn with_database(mut self, database: Arc<Database>, log_limit: usize) -> Self {
        self.dispatcher = self.dispatcher.with_database(database, log_limit);
        self
    }

    /// Process a signal from `tab_id` now
    pub async fn handle_signal(&self, tab_id: TabId, signal: SignalSample) -> SignalOutcome {
        self.handle_signal_at(tab_id, signal, Utc::now()).await
    }

    /// Process a signal from `tab_id` at `now`
    pub async fn handle_signal_at(
        &self,
        tab_id: TabId,
        signal: SignalSample,
        now: DateTime<Utc>,
    ) -> SignalOutcome {
        let ambient = *self.camera_state.read().await;
        let score = scoring::score(&signal, ambient);

        let mut reclaimed = false;
        let step = self
            .store
            .update(tab_id, now, |record| {
                if signal.idle_seconds < self.active_idle_secs {
                    record.last_activity_at = now;
                }
                record.distraction_score = score;

                if record.intervention_in_progress
                    && self.policy.is_stale(record.intervention_started_at, now)
                {
                    self.reclaim_stale(record, now);
                    reclaimed = true;
                }

                self.transition(record, score, now)
            })
            .await;

        if reclaimed {
            self.dispatcher
                .record_outcome(tab_id, InterventionKind::Quiz, 0, true, 0, now);
        }

        let state = match step {
            NextStep::Done(state) => state,
            NextStep::DriftNudge => {
                self.dispatcher
                    .dispatch(
                        tab_id,
                        &InterventionMessage::nudge(DRIFT_NUDGE_MESSAGE, Some(score)),
                        InterventionKind::Nudge,
                        score,
                        Some("drifting".to_string()),
                        now,
                    )
                    .await;
                AgentState::Cooldown
            }
            NextStep::Escalate(history) => {
                self.escalate(tab_id, &signal, score, history, now).await
            }
        };

        log::debug!("Tab {tab_id}: score {score} -> {state}");
        SignalOutcome { state, score }
    }

    /// Decide the next step for a freshly scored record
    fn transition(&self, record: &mut AgentRecord, score: u8, now: DateTime<Utc>) -> NextStep {
        if record.in_cooldown(now) {
            record.state = AgentState::Cooldown;
            return NextStep::Done(AgentState::Cooldown);
        }

        let next = classify(score);
        if next == AgentState::Focused {
            record.state = AgentState::Focused;
            return NextStep::Done(AgentState::Focused);
        }

        if record.intervention_in_progress {
            return NextStep::Done(AgentState::Intervening);
        }

        if next == AgentState::Drifting {
            record.push_outcome(OutcomeRecord::dispatched(now, InterventionKind::Nudge, score));
            record.last_intervention_at = Some(now);
            record.extend_cooldown(self.policy.after_drift_nudge(now));
            record.state = AgentState::Cooldown;
            return NextStep::DriftNudge;
        }

        record.begin_intervention(now);
        log::info!("Tab {} distracted (score {score}), escalating", record.tab_id);
        NextStep::Escalate(record.history())
    }

    /// Force-close an intervention that never reported an outcome
    fn reclaim_stale(&self, record: &mut AgentRecord, now: DateTime<Utc>) {
        log::info!(
            "Tab {}: no outcome since {:?}, reclaiming intervention",
            record.tab_id,
            record.intervention_started_at
        );
        record.push_outcome(OutcomeRecord::reported(
            now,
            InterventionKind::Quiz,
            0,
            true,
            0,
            record.distraction_score,
        ));
        record.close_intervention(self.policy.after_outcome(now, true));
    }

    /// Distracted path: context, remote decision, then the chosen intervention
    async fn escalate(
        &self,
        tab_id: TabId,
        signal: &SignalSample,
        score: u8,
        history: Vec<OutcomeRecord>,
        now: DateTime<Utc>,
    ) -> AgentState {
        let context = self.dispatcher.page_context(tab_id).await.into_inner();

        let request = DecisionRequest {
            signal: serde_json::to_value(signal).unwrap_or(serde_json::Value::Null),
            score,
            state: AgentState::Intervening.to_string(),
            context: context.clone(),
            recent_interventions: serde_json::to_value(&history)
                .unwrap_or(serde_json::Value::Null),
        };
        let decision = Sourced::or_fallback(
            self.decision_service.decide(&request).await,
            "Decide worker",
            DecisionResponse::fallback,
        )
        .into_inner();

        match decision.route() {
            DecisionRoute::Quiz => {
                self.start_quiz(tab_id, signal, &context, &decision, score, now)
                    .await
            }
            DecisionRoute::Break => {
                let message = decision.message().unwrap_or(BREAK_MESSAGE);
                self.finish_escalation(
                    tab_id,
                    InterventionKind::Break,
                    message,
                    &decision,
                    score,
                    now,
                )
                .await
            }
            DecisionRoute::Nudge => {
                let message = decision.message().unwrap_or(GENERIC_NUDGE_MESSAGE);
                self.finish_escalation(
                    tab_id,
                    InterventionKind::Nudge,
                    message,
                    &decision,
                    score,
                    now,
                )
                .await
            }
        }
    }

    /// Quiz stays open until the tab reports a result
    async fn start_quiz(
        &self,
        tab_id: TabId,
        signal: &SignalSample,
        context: &PageContext,
        decision: &DecisionResponse,
        score: u8,
        now: DateTime<Utc>,
    ) -> AgentState {
        let request = quiz_request(context, signal);
        let quiz = self.quiz_chain.generate(&request).await.into_inner();

        let state = self
            .store
            .update(tab_id, now, |record| {
                record.push_outcome(OutcomeRecord::dispatched(now, InterventionKind::Quiz, score));
                record.last_intervention_at = Some(now);
                record.state
            })
            .await;

        let message =
            InterventionMessage::quiz(decision.message().unwrap_or(QUIZ_INTRO_MESSAGE), quiz);
        self.dispatcher
            .dispatch(
                tab_id,
                &message,
                InterventionKind::Quiz,
                score,
                decision.reason.clone(),
                now,
            )
            .await;
        state
    }

    /// Break and nudge are fire-and-forget: cooldown starts immediately
    async fn finish_escalation(
        &self,
        tab_id: TabId,
        kind: InterventionKind,
        message: &str,
        decision: &DecisionResponse,
        score: u8,
        now: DateTime<Utc>,
    ) -> AgentState {
        let until = self.policy.after_escalation(now);
        let state = self
            .store
            .update(tab_id, now, |record| {
                record.push_outcome(OutcomeRecord::dispatched(now, kind, score));
                record.last_intervention_at = Some(now);
                record.close_intervention(until);
                record.state
            })
            .await;

        self.dispatcher
            .dispatch(
                tab_id,
                &InterventionMessage::nudge(message, None),
                kind,
                score,
                decision.reason.clone(),
                now,
            )
            .await;
        state
    }

    /// Record how an intervention ended and start the matching cooldown
    pub async fn report_outcome(&self, tab_id: TabId, report: OutcomeReport) -> AgentState {
        self.report_outcome_at(tab_id, report, Utc::now()).await
    }

    pub async fn report_outcome_at(
        &self,
        tab_id: TabId,
        report: OutcomeReport,
        now: DateTime<Utc>,
    ) -> AgentState {
        let until = self.policy.after_outcome(now, report.dismissed);
        let state = self
            .store
            .update(tab_id, now, |record| {
                record.push_outcome(OutcomeRecord::reported(
                    now,
                    report.kind,
                    report.correct,
                    report.dismissed,
                    report.duration_ms,
                    record.distraction_score,
                ));
                record.close_intervention(until);
                record.state
            })
            .await;

        log::info!(
            "Tab {tab_id}: {} {} (correct {}), cooling down until {}",
            report.kind,
            if report.dismissed { "dismissed" } else { "completed" },
            report.correct,
            until.to_rfc3339()
        );
        self.dispatcher.record_outcome(
            tab_id,
            report.kind,
            report.correct,
            report.dismissed,
            report.duration_ms,
            now,
        );
        state
    }

    /// Passive maintenance check, used only while no tab agent exists
    pub async fn passive_check(&self, tab_id: TabId, signal: SignalSample) -> PassiveOutcome {
        self.passive_check_at(tab_id, signal, Utc::now()).await
    }

    /// Score `signal` against the backoff-aware threshold: heavy intervention
    /// at or above it, a local nudge in the drifting band, nothing below.
    /// One global cooldown covers every passive intervention.
    pub async fn passive_check_at(
        &self,
        tab_id: TabId,
        signal: SignalSample,
        now: DateTime<Utc>,
    ) -> PassiveOutcome {
        let score = scoring::score(&signal, self.camera_state().await);
        let threshold = self.passive_threshold_at(now).await;
        let outcome = |action| PassiveOutcome {
            action,
            score,
            threshold,
        };

        if !self.store.is_empty().await {
            return outcome(PassiveAction::AgentActive);
        }
        if score < DRIFTING_THRESHOLD {
            return outcome(PassiveAction::Quiet);
        }
        {
            let mut last = self.last_passive_at.lock().await;
            if last.is_some_and(|at| now < saturating_add(at, self.policy.escalation)) {
                return outcome(PassiveAction::CoolingDown);
            }
            *last = Some(now);
        }

        if score < threshold {
            self.dispatcher
                .dispatch(
                    tab_id,
                    &InterventionMessage::nudge(PASSIVE_NUDGE_MESSAGE, Some(score)),
                    InterventionKind::Nudge,
                    score,
                    Some("passive drift".to_string()),
                    now,
                )
                .await;
            return outcome(PassiveAction::Nudge);
        }

        log::info!("Passive check: score {score} reached threshold {threshold} on tab {tab_id}");
        self.passive_intervention(tab_id, &signal, score, now).await;
        outcome(PassiveAction::Intervention)
    }

    /// Heavy passive intervention; a failed decision falls back to a break
    async fn passive_intervention(
        &self,
        tab_id: TabId,
        signal: &SignalSample,
        score: u8,
        now: DateTime<Utc>,
    ) {
        let context = self.dispatcher.page_context(tab_id).await.into_inner();
        let request = DecisionRequest {
            signal: serde_json::to_value(signal).unwrap_or(serde_json::Value::Null),
            score,
            state: AgentState::Distracted.to_string(),
            context: context.clone(),
            recent_interventions: serde_json::Value::Array(Vec::new()),
        };
        let decision = Sourced::or_fallback(
            self.decision_service.decide(&request).await,
            "Decide worker",
            passive_fallback,
        )
        .into_inner();

        let (message, kind) = match decision.route() {
            DecisionRoute::Quiz => {
                let request = quiz_request(&context, signal);
                let quiz = self.quiz_chain.generate(&request).await.into_inner();
                let intro = decision.message().unwrap_or(QUIZ_INTRO_MESSAGE);
                (InterventionMessage::quiz(intro, quiz), InterventionKind::Quiz)
            }
            DecisionRoute::Break => {
                let text = decision.message().unwrap_or(BREAK_MESSAGE);
                (InterventionMessage::nudge(text, None), InterventionKind::Break)
            }
            DecisionRoute::Nudge => {
                let text = decision.message().unwrap_or(GENERIC_NUDGE_MESSAGE);
                (InterventionMessage::nudge(text, None), InterventionKind::Nudge)
            }
        };
        self.dispatcher
            .dispatch(tab_id, &message, kind, score, decision.reason.clone(), now)
            .await;
    }

    /// Feed the cross-tab backoff; returns true if backoff was just activated
    pub async fn record_dismissal(&self) -> bool {
        self.record_dismissal_at(Utc::now()).await
    }

    pub async fn record_dismissal_at(&self, now: DateTime<Utc>) -> bool {
        self.backoff.lock().await.record_dismissal(now)
    }

    /// Score threshold for passive maintenance, raised during backoff
    pub async fn passive_threshold_at(&self, now: DateTime<Utc>) -> u8 {
        self.backoff.lock().await.passive_threshold(now)
    }

    pub async fn is_backing_off_at(&self, now: DateTime<Utc>) -> bool {
        self.backoff.lock().await.is_backing_off(now)
    }

    /// Update the camera state used when a signal carries none
    pub async fn set_camera_state(&self, state: CameraUserState) {
        let mut current = self.camera_state.write().await;
        if *current != state {
            log::debug!("Camera state {} -> {state}", *current);
            *current = state;
        }
    }

    pub async fn camera_state(&self) -> CameraUserState {
        *self.camera_state.read().await
    }

    /// Quiz from the generation chain, independent of any agent state
    pub async fn generate_quiz(&self, request: &QuizRequest) -> Sourced<fyx_ai::Quiz> {
        self.quiz_chain.generate(request).await
    }

    pub async fn snapshot(&self, tab_id: TabId) -> Option<AgentRecord> {
        self.store.snapshot(tab_id).await
    }

    pub async fn tabs(&self) -> Vec<TabId> {
        self.store.tabs().await
    }
}

/// Quiz content from the page snippet, else the signal's hint
fn quiz_request(context: &PageContext, signal: &SignalSample) -> QuizRequest {
    QuizRequest {
        content: non_empty(context.snippet.as_deref())
            .or_else(|| non_empty(signal.content_hint.as_deref()))
            .unwrap_or_default()
            .to_string(),
        title: non_empty(context.title.as_deref())
            .unwrap_or(UNTITLED_PAGE)
            .to_string(),
    }
}

/// Passive escalations default to a break when the decision service is down
fn passive_fallback() -> DecisionResponse {
    DecisionResponse {
        tool: Some(TOOL_SUGGEST_BREAK.to_string()),
        reason: Some("fallback".to_string()),
        ..DecisionResponse::default()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
