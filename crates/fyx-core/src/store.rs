//! Keyed registry of per-tab agent records.
//!
//! All mutation goes through [`AgentStore::update`], which holds the registry
//! lock only for the synchronous closure. Nothing is held across an await, so
//! a slow escalation for one tab never blocks signals for another, and the
//! `intervention_in_progress` flag is what keeps a second escalation out.

use chrono::{DateTime, Utc};
use fyx_storage::InterventionKind;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::classifier::AgentState;
use crate::signal::TabId;

/// Result of one dispatched or reported intervention. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub at: DateTime<Utc>,
    pub kind: InterventionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub score: u8,
}

impl OutcomeRecord {
    /// Record written when an intervention is sent
    #[must_use]
    pub fn dispatched(at: DateTime<Utc>, kind: InterventionKind, score: u8) -> Self {
        Self {
            at,
            kind,
            correct: None,
            dismissed: None,
            duration_ms: None,
            score,
        }
    }

    /// Record written when the tab reports how an intervention ended
    #[must_use]
    pub fn reported(
        at: DateTime<Utc>,
        kind: InterventionKind,
        correct: u32,
        dismissed: bool,
        duration_ms: u64,
        score: u8,
    ) -> Self {
        Self {
            at,
            kind,
            correct: Some(correct),
            dismissed: Some(dismissed),
            duration_ms: Some(duration_ms),
            score,
        }
    }
}

/// Mutable state of one tab's agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub tab_id: TabId,
    pub state: AgentState,
    pub last_activity_at: DateTime<Utc>,
    pub distraction_score: u8,
    pub last_intervention_at: Option<DateTime<Utc>>,
    pub intervention_cooldown_until: Option<DateTime<Utc>>,
    pub recent_interventions: VecDeque<OutcomeRecord>,
    pub intervention_in_progress: bool,
    /// When the open intervention started; cleared with the in-progress flag
    pub intervention_started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    history_limit: usize,
}

impl AgentRecord {
    #[must_use]
    pub fn new(tab_id: TabId, now: DateTime<Utc>, history_limit: usize) -> Self {
        Self {
            tab_id,
            state: AgentState::Focused,
            last_activity_at: now,
            distraction_score: 0,
            last_intervention_at: None,
            intervention_cooldown_until: None,
            recent_interventions: VecDeque::with_capacity(history_limit),
            intervention_in_progress: false,
            intervention_started_at: None,
            history_limit,
        }
    }

    /// Append an outcome, evicting the oldest beyond the history limit
    pub fn push_outcome(&mut self, record: OutcomeRecord) {
        self.recent_interventions.push_back(record);
        while self.recent_interventions.len() > self.history_limit {
            self.recent_interventions.pop_front();
        }
    }

    #[must_use]
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.intervention_cooldown_until.is_some_and(|until| until > now)
    }

    /// Move the cooldown end to `until` unless it already ends later
    pub fn extend_cooldown(&mut self, until: DateTime<Utc>) {
        self.intervention_cooldown_until = Some(
            self.intervention_cooldown_until.map_or(until, |current| current.max(until)),
        );
    }

    /// Open an intervention; blocks further escalation for this tab
    pub fn begin_intervention(&mut self, now: DateTime<Utc>) {
        self.intervention_in_progress = true;
        self.intervention_started_at = Some(now);
        self.state = AgentState::Intervening;
    }

    /// Close the open intervention and enter cooldown until `until`
    pub fn close_intervention(&mut self, until: DateTime<Utc>) {
        self.intervention_in_progress = false;
        self.intervention_started_at = None;
        self.extend_cooldown(until);
        self.state = AgentState::Cooldown;
    }

    /// Outcome history as a plain slice-friendly vector
    #[must_use]
    pub fn history(&self) -> Vec<OutcomeRecord> {
        self.recent_interventions.iter().cloned().collect()
    }
}

/// Registry of agent records, one per tab
pub struct AgentStore {
    records: Mutex<HashMap<TabId, AgentRecord>>,
    history_limit: usize,
}

impl AgentStore {
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            history_limit,
        }
    }

    /// Run `f` against the tab's record, creating it on first contact
    pub async fn update<R>(
        &self,
        tab_id: TabId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut AgentRecord) -> R,
    ) -> R {
        let mut records = self.records.lock().await;
        let record = records.entry(tab_id).or_insert_with(|| {
            log::debug!("Creating agent for tab {tab_id}");
            AgentRecord::new(tab_id, now, self.history_limit)
        });
        f(record)
    }

    /// Copy of the tab's record, if the tab has been seen
    pub async fn snapshot(&self, tab_id: TabId) -> Option<AgentRecord> {
        self.records.lock().await.get(&tab_id).cloned()
    }

    /// Tabs with a record, in ascending order
    pub async fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.records.lock().await.keys().copied().collect();
        tabs.sort_unstable();
        tabs
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
