use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of attention-recovery intervention shown in a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionKind {
    /// Lightweight text nudge, fire-and-forget
    Nudge,
    /// Break suggestion, fire-and-forget
    Break,
    /// Comprehension quiz, resolved when the tab reports a result
    Quiz,
}

impl InterventionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nudge => "nudge",
            Self::Break => "break",
            Self::Quiz => "quiz",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterventionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nudge" => Ok(Self::Nudge),
            "break" => Ok(Self::Break),
            "quiz" => Ok(Self::Quiz),
            other => anyhow::bail!("Unknown intervention kind: {other}"),
        }
    }
}

/// One row of the persisted intervention log.
///
/// Dispatches carry `reason`/`message`; outcome reports carry
/// `correct`/`dismissed`/`duration_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionLogEntry {
    pub id: Uuid,
    pub tab_id: i64,
    pub at: DateTime<Utc>,
    pub kind: InterventionKind,
    pub score: Option<u8>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub correct: Option<u32>,
    pub dismissed: Option<bool>,
    pub duration_ms: Option<u64>,
}

impl InterventionLogEntry {
    /// Entry for an intervention that was just sent to a tab
    #[must_use]
    pub fn dispatched(
        tab_id: i64,
        at: DateTime<Utc>,
        kind: InterventionKind,
        score: u8,
        reason: Option<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tab_id,
            at,
            kind,
            score: Some(score),
            reason,
            message,
            correct: None,
            dismissed: None,
            duration_ms: None,
        }
    }

    /// Entry for a result reported back by a tab
    #[must_use]
    pub fn outcome(
        tab_id: i64,
        at: DateTime<Utc>,
        kind: InterventionKind,
        correct: u32,
        dismissed: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tab_id,
            at,
            kind,
            score: None,
            reason: None,
            message: None,
            correct: Some(correct),
            dismissed: Some(dismissed),
            duration_ms: Some(duration_ms),
        }
    }

    /// Whether this entry records a reported outcome rather than a dispatch
    #[must_use]
    pub fn is_outcome(&self) -> bool {
        self.dismissed.is_some()
    }
}
