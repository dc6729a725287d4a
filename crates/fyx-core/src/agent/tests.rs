use super::*;
use chrono::{Duration, TimeZone};
use fyx_ai::{Quiz, FALLBACK_QUESTION};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::dispatcher::InterventionAction;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

/// Scores 2: long idle only
fn idle_signal() -> SignalSample {
    SignalSample {
        idle_seconds: 50,
        face_detected: Some(true),
        interaction_bursts: 5,
        ..SignalSample::default()
    }
}

/// Scores 4: long idle, no face
fn drifting_signal() -> SignalSample {
    SignalSample {
        face_detected: Some(false),
        ..idle_signal()
    }
}

/// Scores 7: hidden, no face, tab switching
fn distracted_signal() -> SignalSample {
    SignalSample {
        visible: false,
        face_detected: Some(false),
        tab_switches_last_minute: 5,
        interaction_bursts: 10,
        ..SignalSample::default()
    }
}

#[derive(Default)]
struct RecordingTab {
    sent: std::sync::Mutex<Vec<(TabId, InterventionMessage)>>,
    context: Option<PageContext>,
    closed: bool,
}

impl RecordingTab {
    fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    fn with_context(title: &str, snippet: &str) -> Self {
        Self {
            context: Some(PageContext {
                title: Some(title.to_string()),
                snippet: Some(snippet.to_string()),
                ..PageContext::default()
            }),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(TabId, InterventionMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TabMessenger for RecordingTab {
    async fn send_intervention(&self, tab_id: TabId, message: &InterventionMessage) -> Result<()> {
        if self.closed {
            anyhow::bail!("Receiving end does not exist");
        }
        self.sent.lock().unwrap().push((tab_id, message.clone()));
        Ok(())
    }

    async fn request_context(&self, _tab_id: TabId) -> Result<PageContext> {
        match &self.context {
            Some(context) => Ok(context.clone()),
            None => anyhow::bail!("No content script"),
        }
    }
}

#[derive(Default)]
struct ScriptedDecision {
    response: Option<DecisionResponse>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    last_request: std::sync::Mutex<Option<DecisionRequest>>,
}

impl ScriptedDecision {
    fn failing() -> Self {
        Self::default()
    }

    fn tool(tool: &str, message: Option<&str>) -> Self {
        Self {
            response: Some(DecisionResponse {
                tool: Some(tool.to_string()),
                message: message.map(str::to_string),
                reason: Some("scripted".to_string()),
                ..DecisionResponse::default()
            }),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DecisionService for ScriptedDecision {
    async fn decide(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.response
            .clone()
            .ok_or_else(|| anyhow::anyhow!("decide worker unreachable"))
    }
}

struct CountingQuiz {
    calls: AtomicUsize,
    requests: std::sync::Mutex<Vec<QuizRequest>>,
    quiz: Option<Quiz>,
}

impl CountingQuiz {
    fn new(quiz: Option<Quiz>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
            quiz,
        }
    }
}

#[async_trait::async_trait]
impl QuizService for CountingQuiz {
    async fn generate(&self, request: &QuizRequest) -> Result<Quiz> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.quiz
            .clone()
            .ok_or_else(|| anyhow::anyhow!("quiz worker unreachable"))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct Harness {
    agent: Arc<FocusAgent>,
    tab: Arc<RecordingTab>,
    decision: Arc<ScriptedDecision>,
    quiz: Arc<CountingQuiz>,
}

fn harness_with(tab: RecordingTab, decision: ScriptedDecision, quiz: Option<Quiz>) -> Harness {
    let tab = Arc::new(tab);
    let decision = Arc::new(decision);
    let quiz = Arc::new(CountingQuiz::new(quiz));
    let sources: Vec<Arc<dyn QuizService>> = vec![quiz.clone()];
    let agent = FocusAgent::new(
        &FyxConfig::default(),
        tab.clone(),
        decision.clone(),
        QuizChain::new(sources),
    );
    Harness {
        agent: Arc::new(agent),
        tab,
        decision,
        quiz,
    }
}

fn harness(decision: ScriptedDecision) -> Harness {
    harness_with(RecordingTab::default(), decision, None)
}

fn sample_quiz() -> Quiz {
    Quiz {
        question: "What does the borrow checker enforce?".to_string(),
        options: vec!["Aliasing xor mutation".to_string(), "Garbage collection".to_string()],
        correct_index: 0,
        explanation: None,
    }
}

#[tokio::test]
async fn test_low_score_stays_focused() {
    let h = harness(ScriptedDecision::failing());
    let outcome = h.agent.handle_signal_at(1, idle_signal(), t0()).await;

    assert_eq!(outcome, SignalOutcome { state: AgentState::Focused, score: 2 });
    assert!(h.tab.sent().is_empty());
    assert_eq!(h.decision.calls(), 0);

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.distraction_score, 2);
    assert!(record.recent_interventions.is_empty());
}

#[tokio::test]
async fn test_drifting_sends_nudge_without_decision() {
    let h = harness(ScriptedDecision::failing());
    let outcome = h.agent.handle_signal_at(1, drifting_signal(), t0()).await;

    assert_eq!(outcome.score, 4);
    assert_eq!(outcome.state, AgentState::Cooldown);
    assert_eq!(h.decision.calls(), 0);

    let sent = h.tab.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, InterventionMessage::nudge(DRIFT_NUDGE_MESSAGE, Some(4)));

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.intervention_cooldown_until, Some(t0() + Duration::minutes(2)));
    assert_eq!(record.last_intervention_at, Some(t0()));
    assert_eq!(record.recent_interventions.len(), 1);
    assert_eq!(record.recent_interventions[0].kind, InterventionKind::Nudge);
}

#[tokio::test]
async fn test_cooldown_suppresses_interventions() {
    let h = harness(ScriptedDecision::tool("generate_quiz", None));
    h.agent.handle_signal_at(1, drifting_signal(), t0()).await;

    for minute in 0..2 {
        let at = t0() + Duration::seconds(30 + minute * 30);
        let outcome = h.agent.handle_signal_at(1, distracted_signal(), at).await;
        assert_eq!(outcome.state, AgentState::Cooldown);
        assert_eq!(outcome.score, 7);
    }
    assert_eq!(h.decision.calls(), 0);
    assert_eq!(h.tab.sent().len(), 1);
}

#[tokio::test]
async fn test_cooldown_expiry_allows_escalation() {
    let h = harness_with(
        RecordingTab::default(),
        ScriptedDecision::tool("generate_quiz", None),
        Some(sample_quiz()),
    );
    h.agent.handle_signal_at(1, drifting_signal(), t0()).await;

    let after = t0() + Duration::minutes(2);
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), after).await;
    assert_eq!(outcome.state, AgentState::Intervening);
    assert_eq!(h.decision.calls(), 1);
}

#[tokio::test]
async fn test_distracted_escalates_to_quiz() {
    let h = harness_with(
        RecordingTab::with_context("Ownership", "Each value has a single owner."),
        ScriptedDecision::tool("generate_quiz", Some("Quick check on ownership.")),
        Some(sample_quiz()),
    );
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    assert_eq!(outcome, SignalOutcome { state: AgentState::Intervening, score: 7 });
    assert_eq!(h.decision.calls(), 1);
    assert_eq!(
        h.quiz.requests.lock().unwrap().clone(),
        vec![QuizRequest {
            content: "Each value has a single owner.".to_string(),
            title: "Ownership".to_string(),
        }]
    );

    let sent = h.tab.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.action, InterventionAction::StartQuiz);
    assert_eq!(sent[0].1.payload.message, "Quick check on ownership.");
    assert_eq!(sent[0].1.payload.quiz, Some(sample_quiz()));

    let record = h.agent.snapshot(1).await.unwrap();
    assert!(record.intervention_in_progress);
    assert_eq!(record.state, AgentState::Intervening);
    assert_eq!(record.intervention_cooldown_until, None);
    assert_eq!(record.last_intervention_at, Some(t0()));
}

#[tokio::test]
async fn test_decision_request_carries_history_and_context() {
    let h = harness_with(
        RecordingTab::with_context("Docs", "snippet"),
        ScriptedDecision::tool("suggest_break", None),
        None,
    );
    h.agent.handle_signal_at(1, drifting_signal(), t0()).await;
    h.agent
        .handle_signal_at(1, distracted_signal(), t0() + Duration::minutes(3))
        .await;

    let request = h.decision.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.score, 7);
    assert_eq!(request.state, "INTERVENING");
    assert_eq!(request.context.title.as_deref(), Some("Docs"));
    assert_eq!(request.recent_interventions.as_array().map(Vec::len), Some(1));
    assert_eq!(request.signal["tabSwitchesLastMinute"], 5);
}

#[tokio::test]
async fn test_total_failure_falls_back_to_hardcoded_quiz() {
    let h = harness_with(RecordingTab::default(), ScriptedDecision::failing(), None);
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    assert_eq!(outcome.state, AgentState::Intervening);
    assert_eq!(h.quiz.calls.load(Ordering::SeqCst), 1);

    let sent = h.tab.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.payload.message, QUIZ_INTRO_MESSAGE);
    let quiz = sent[0].1.payload.quiz.clone().unwrap();
    assert_eq!(quiz.question, FALLBACK_QUESTION);
    assert_eq!(quiz, Quiz::fallback());
}

#[tokio::test]
async fn test_quiz_request_defaults_without_context() {
    let h = harness_with(RecordingTab::default(), ScriptedDecision::failing(), None);
    let signal = SignalSample {
        content_hint: Some("lecture notes".to_string()),
        ..distracted_signal()
    };
    h.agent.handle_signal_at(1, signal, t0()).await;

    assert_eq!(
        h.quiz.requests.lock().unwrap().clone(),
        vec![QuizRequest {
            content: "lecture notes".to_string(),
            title: "Current Page".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_break_route_closes_intervention() {
    let h = harness(ScriptedDecision::tool("suggest_break", None));
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    assert_eq!(outcome.state, AgentState::Cooldown);
    let sent = h.tab.sent();
    assert_eq!(sent[0].1, InterventionMessage::nudge(BREAK_MESSAGE, None));

    let record = h.agent.snapshot(1).await.unwrap();
    assert!(!record.intervention_in_progress);
    assert_eq!(record.intervention_started_at, None);
    assert_eq!(record.intervention_cooldown_until, Some(t0() + Duration::minutes(8)));
    assert_eq!(
        record.recent_interventions.back().map(|r| r.kind),
        Some(InterventionKind::Break)
    );
    assert_eq!(h.quiz.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_tool_sends_decision_message_as_nudge() {
    let h = harness(ScriptedDecision::tool("stretch", Some("Stand up for a minute.")));
    h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    let sent = h.tab.sent();
    assert_eq!(sent[0].1, InterventionMessage::nudge("Stand up for a minute.", None));

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.intervention_cooldown_until, Some(t0() + Duration::minutes(8)));
    assert_eq!(
        record.recent_interventions.back().map(|r| r.kind),
        Some(InterventionKind::Nudge)
    );
}

#[tokio::test]
async fn test_open_intervention_blocks_second_escalation() {
    let h = harness_with(
        RecordingTab::default(),
        ScriptedDecision::tool("generate_quiz", None),
        Some(sample_quiz()),
    );
    h.agent.handle_signal_at(1, distracted_signal(), t0()).await;
    let again = h
        .agent
        .handle_signal_at(1, distracted_signal(), t0() + Duration::seconds(10))
        .await;

    assert_eq!(again.state, AgentState::Intervening);
    assert_eq!(h.decision.calls(), 1);
    assert_eq!(h.tab.sent().len(), 1);

    // a low score still reports focus without closing the quiz
    let calm = h
        .agent
        .handle_signal_at(1, idle_signal(), t0() + Duration::seconds(20))
        .await;
    assert_eq!(calm.state, AgentState::Focused);
    assert!(h.agent.snapshot(1).await.unwrap().intervention_in_progress);
}

#[tokio::test]
async fn test_concurrent_signals_escalate_once() {
    let gate = Arc::new(Notify::new());
    let decision = ScriptedDecision {
        gate: Some(gate.clone()),
        ..ScriptedDecision::tool("suggest_break", None)
    };
    let h = harness(decision);

    let agent = h.agent.clone();
    let first =
        tokio::spawn(async move { agent.handle_signal_at(1, distracted_signal(), t0()).await });
    while h.decision.calls() == 0 {
        tokio::task::yield_now().await;
    }

    let second = h
        .agent
        .handle_signal_at(1, distracted_signal(), t0() + Duration::seconds(1))
        .await;
    assert_eq!(second.state, AgentState::Intervening);

    // other tabs are not blocked by the pending escalation
    let other = h.agent.handle_signal_at(2, idle_signal(), t0()).await;
    assert_eq!(other.state, AgentState::Focused);

    gate.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.state, AgentState::Cooldown);
    assert_eq!(h.decision.calls(), 1);
    assert_eq!(h.tab.sent().len(), 1);
}

#[tokio::test]
async fn test_quiz_outcomes_set_cooldown() {
    let h = harness_with(
        RecordingTab::default(),
        ScriptedDecision::tool("generate_quiz", None),
        Some(sample_quiz()),
    );
    h.agent.handle_signal_at(1, distracted_signal(), t0()).await;
    h.agent.handle_signal_at(2, distracted_signal(), t0()).await;

    let report = OutcomeReport {
        kind: InterventionKind::Quiz,
        correct: 0,
        dismissed: true,
        duration_ms: 4_000,
    };
    let dismissed_at = t0() + Duration::minutes(1);
    let state = h.agent.report_outcome_at(1, report, dismissed_at).await;
    assert_eq!(state, AgentState::Cooldown);

    let completed = OutcomeReport {
        correct: 1,
        dismissed: false,
        duration_ms: 12_000,
        ..report
    };
    h.agent.report_outcome_at(2, completed, dismissed_at).await;

    let tab1 = h.agent.snapshot(1).await.unwrap();
    assert!(!tab1.intervention_in_progress);
    assert_eq!(tab1.intervention_cooldown_until, Some(dismissed_at + Duration::minutes(6)));
    let last = tab1.recent_interventions.back().unwrap();
    assert_eq!(last.dismissed, Some(true));
    assert_eq!(last.duration_ms, Some(4_000));

    let tab2 = h.agent.snapshot(2).await.unwrap();
    assert_eq!(tab2.intervention_cooldown_until, Some(dismissed_at + Duration::minutes(9)));
    assert_eq!(tab2.recent_interventions.back().unwrap().correct, Some(1));
}

#[tokio::test]
async fn test_outcome_never_shortens_cooldown() {
    let h = harness(ScriptedDecision::tool("suggest_break", None));
    h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    let report = OutcomeReport {
        kind: InterventionKind::Break,
        correct: 0,
        dismissed: true,
        duration_ms: 0,
    };
    h.agent.report_outcome_at(1, report, t0()).await;

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.intervention_cooldown_until, Some(t0() + Duration::minutes(8)));
}

#[tokio::test]
async fn test_outcome_for_unseen_tab_creates_record() {
    let h = harness(ScriptedDecision::failing());
    let report = OutcomeReport {
        kind: InterventionKind::Quiz,
        correct: 1,
        dismissed: false,
        duration_ms: 0,
    };
    h.agent.report_outcome_at(9, report, t0()).await;
    assert_eq!(h.agent.tabs().await, vec![9]);
}

#[tokio::test]
async fn test_history_is_bounded() {
    let h = harness(ScriptedDecision::failing());
    let report = OutcomeReport {
        kind: InterventionKind::Nudge,
        correct: 0,
        dismissed: false,
        duration_ms: 0,
    };
    for i in 0..20 {
        h.agent
            .report_outcome_at(1, report, t0() + Duration::seconds(i))
            .await;
    }

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.recent_interventions.len(), 12);
    assert_eq!(
        record.recent_interventions.front().map(|r| r.at),
        Some(t0() + Duration::seconds(8))
    );
}

#[tokio::test]
async fn test_stale_intervention_is_reclaimed() {
    let h = harness_with(
        RecordingTab::default(),
        ScriptedDecision::tool("generate_quiz", None),
        Some(sample_quiz()),
    );
    h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    let early = h
        .agent
        .handle_signal_at(1, distracted_signal(), t0() + Duration::minutes(4))
        .await;
    assert_eq!(early.state, AgentState::Intervening);

    let late = t0() + Duration::minutes(5);
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), late).await;
    assert_eq!(outcome.state, AgentState::Cooldown);

    let record = h.agent.snapshot(1).await.unwrap();
    assert!(!record.intervention_in_progress);
    assert_eq!(record.intervention_cooldown_until, Some(late + Duration::minutes(6)));
    assert_eq!(record.recent_interventions.back().unwrap().dismissed, Some(true));
    assert_eq!(h.decision.calls(), 1);
}

#[tokio::test]
async fn test_closed_tab_does_not_break_state_machine() {
    let h = harness_with(
        RecordingTab::closed(),
        ScriptedDecision::tool("suggest_break", None),
        None,
    );
    let outcome = h.agent.handle_signal_at(1, distracted_signal(), t0()).await;

    assert_eq!(outcome.state, AgentState::Cooldown);
    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.intervention_cooldown_until, Some(t0() + Duration::minutes(8)));
    assert!(!record.intervention_in_progress);
}

#[tokio::test]
async fn test_activity_timestamp_tracks_short_idle() {
    let h = harness(ScriptedDecision::failing());
    h.agent.handle_signal_at(1, idle_signal(), t0()).await;

    let active = SignalSample {
        idle_seconds: 2,
        ..idle_signal()
    };
    let active_at = t0() + Duration::minutes(1);
    h.agent.handle_signal_at(1, active, active_at).await;
    h.agent
        .handle_signal_at(1, idle_signal(), t0() + Duration::minutes(2))
        .await;

    let record = h.agent.snapshot(1).await.unwrap();
    assert_eq!(record.last_activity_at, active_at);
}

#[tokio::test]
async fn test_ambient_camera_state_raises_score() {
    let h = harness(ScriptedDecision::failing());
    h.agent.set_camera_state(CameraUserState::LookingAway).await;
    assert_eq!(h.agent.camera_state().await, CameraUserState::LookingAway);

    let outcome = h.agent.handle_signal_at(1, idle_signal(), t0()).await;
    assert_eq!(outcome.score, 5);

    // the signal's own camera state wins
    let focused = SignalSample {
        camera_user_state: CameraUserState::Focused,
        ..idle_signal()
    };
    let outcome = h.agent.handle_signal_at(2, focused, t0()).await;
    assert_eq!(outcome.score, 2);
}

#[tokio::test]
async fn test_dismissals_activate_backoff() {
    let h = harness(ScriptedDecision::failing());
    assert_eq!(h.agent.passive_threshold_at(t0()).await, 7);

    assert!(!h.agent.record_dismissal_at(t0()).await);
    assert!(h.agent.record_dismissal_at(t0() + Duration::minutes(10)).await);
    assert!(h.agent.is_backing_off_at(t0() + Duration::minutes(11)).await);
    assert_eq!(h.agent.passive_threshold_at(t0() + Duration::minutes(11)).await, 9);

    let expired = t0() + Duration::minutes(40);
    assert!(!h.agent.is_backing_off_at(expired).await);
    assert_eq!(h.agent.passive_threshold_at(expired).await, 7);
}

#[tokio::test]
async fn test_spread_out_dismissals_do_not_back_off() {
    let h = harness(ScriptedDecision::failing());
    h.agent.record_dismissal_at(t0()).await;
    assert!(!h.agent.record_dismissal_at(t0() + Duration::minutes(31)).await);
    assert!(!h.agent.is_backing_off_at(t0() + Duration::minutes(31)).await);
}

#[tokio::test]
async fn test_dispatches_and_outcomes_are_persisted() {
    let db = Arc::new(Database::in_memory().unwrap());
    let tab = Arc::new(RecordingTab::default());
    let agent = FocusAgent::new(
        &FyxConfig::default(),
        tab,
        Arc::new(ScriptedDecision::tool("suggest_break", Some("Breathe."))),
        QuizChain::offline(),
    )
    .with_database(db.clone(), 30);

    agent.handle_signal_at(1, distracted_signal(), t0()).await;
    let report = OutcomeReport {
        kind: InterventionKind::Break,
        correct: 0,
        dismissed: true,
        duration_ms: 1_500,
    };
    agent
        .report_outcome_at(1, report, t0() + Duration::minutes(1))
        .await;

    let log = db.recent_interventions(30).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].kind, InterventionKind::Break);
    assert_eq!(log[0].score, Some(7));
    assert_eq!(log[0].reason.as_deref(), Some("scripted"));
    assert_eq!(log[0].message.as_deref(), Some("Breathe."));
    assert!(log[1].is_outcome());
    assert_eq!(log[1].dismissed, Some(true));
    assert_eq!(log[1].duration_ms, Some(1_500));
}

#[tokio::test]
async fn test_generate_quiz_uses_chain() {
    let h = harness_with(
        RecordingTab::default(),
        ScriptedDecision::failing(),
        Some(sample_quiz()),
    );
    let request = QuizRequest {
        content: "text".to_string(),
        title: "Title".to_string(),
    };
    let quiz = h.agent.generate_quiz(&request).await;
    assert!(!quiz.is_fallback());
    assert_eq!(quiz.into_inner(), sample_quiz());
    assert!(h.agent.tabs().await.is_empty());
}

#[tokio::test]
async fn test_oversized_cooldown_config_saturates() {
    let config =
        FyxConfig::from_toml("[agent]\nnudge_cooldown_secs = 9223372036854775807\n").unwrap();
    let agent = FocusAgent::new(
        &config,
        Arc::new(RecordingTab::default()),
        Arc::new(ScriptedDecision::failing()),
        QuizChain::offline(),
    );

    let outcome = agent.handle_signal_at(1, drifting_signal(), t0()).await;
    assert_eq!(outcome.state, AgentState::Cooldown);

    let record = agent.snapshot(1).await.unwrap();
    assert_eq!(record.intervention_cooldown_until, Some(DateTime::<Utc>::MAX_UTC));

    let later = agent
        .handle_signal_at(1, distracted_signal(), t0() + Duration::days(365))
        .await;
    assert_eq!(later.state, AgentState::Cooldown);
}

/// Scores 8: hidden, no face, tab switching, quiet idle
fn heavy_passive_signal() -> SignalSample {
    SignalSample {
        idle_seconds: 30,
        interaction_bursts: 0,
        ..distracted_signal()
    }
}

#[tokio::test]
async fn test_passive_check_escalates_without_agent() {
    let h = harness(ScriptedDecision::tool("suggest_break", Some("Breathe.")));
    let outcome = h.agent.passive_check_at(4, heavy_passive_signal(), t0()).await;

    assert_eq!(
        outcome,
        PassiveOutcome { action: PassiveAction::Intervention, score: 8, threshold: 7 }
    );
    assert_eq!(h.decision.calls(), 1);
    let request = h.decision.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.state, "DISTRACTED");
    assert_eq!(h.tab.sent(), vec![(4, InterventionMessage::nudge("Breathe.", None))]);
    assert!(h.agent.tabs().await.is_empty());
}

#[tokio::test]
async fn test_two_dismissals_stop_passive_escalation() {
    let h = harness(ScriptedDecision::tool("suggest_break", Some("Breathe.")));
    h.agent.record_dismissal_at(t0()).await;
    assert!(h.agent.record_dismissal_at(t0() + Duration::minutes(1)).await);

    let outcome = h
        .agent
        .passive_check_at(4, heavy_passive_signal(), t0() + Duration::minutes(2))
        .await;

    assert_eq!(
        outcome,
        PassiveOutcome { action: PassiveAction::Nudge, score: 8, threshold: 9 }
    );
    assert_eq!(h.decision.calls(), 0);
    assert_eq!(
        h.tab.sent(),
        vec![(4, InterventionMessage::nudge(PASSIVE_NUDGE_MESSAGE, Some(8)))]
    );
}

#[tokio::test]
async fn test_passive_check_defers_to_tab_agent() {
    let h = harness(ScriptedDecision::tool("suggest_break", None));
    h.agent.handle_signal_at(1, idle_signal(), t0()).await;

    let outcome = h.agent.passive_check_at(2, heavy_passive_signal(), t0()).await;
    assert_eq!(outcome.action, PassiveAction::AgentActive);
    assert_eq!(outcome.score, 8);
    assert_eq!(h.decision.calls(), 0);
    assert!(h.tab.sent().is_empty());
}

#[tokio::test]
async fn test_passive_checks_share_one_cooldown() {
    let h = harness(ScriptedDecision::failing());

    let quiet = h.agent.passive_check_at(1, idle_signal(), t0()).await;
    assert_eq!(quiet.action, PassiveAction::Quiet);

    let nudge = h.agent.passive_check_at(1, drifting_signal(), t0()).await;
    assert_eq!(nudge.action, PassiveAction::Nudge);

    let other_tab = h
        .agent
        .passive_check_at(2, heavy_passive_signal(), t0() + Duration::minutes(5))
        .await;
    assert_eq!(other_tab.action, PassiveAction::CoolingDown);
    assert_eq!(h.decision.calls(), 0);

    let expired = h
        .agent
        .passive_check_at(2, heavy_passive_signal(), t0() + Duration::minutes(8))
        .await;
    assert_eq!(expired.action, PassiveAction::Intervention);
    assert_eq!(h.decision.calls(), 1);

    let sent = h.tab.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], (2, InterventionMessage::nudge(BREAK_MESSAGE, None)));
}
