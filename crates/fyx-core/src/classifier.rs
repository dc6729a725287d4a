use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative attention state of a tab's agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Focused,
    Drifting,
    Distracted,
    /// An intervention is open and awaiting its outcome
    Intervening,
    /// No new intervention may start
    Cooldown,
}

impl AgentState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Focused => "FOCUSED",
            Self::Drifting => "DRIFTING",
            Self::Distracted => "DISTRACTED",
            Self::Intervening => "INTERVENING",
            Self::Cooldown => "COOLDOWN",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score at or above which a tab is distracted
pub const DISTRACTED_THRESHOLD: u8 = 7;
/// Score at or above which a tab is drifting
pub const DRIFTING_THRESHOLD: u8 = 4;

/// Map a distraction score to an attention state
#[must_use]
pub const fn classify(score: u8) -> AgentState {
    if score >= DISTRACTED_THRESHOLD {
        AgentState::Distracted
    } else if score >= DRIFTING_THRESHOLD {
        AgentState::Drifting
    } else {
        AgentState::Focused
    }
}
