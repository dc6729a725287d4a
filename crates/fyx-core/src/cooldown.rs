//! Cooldown windows per tab, and the coarser cross-tab sensitivity backoff
//! driven by repeated dismissals.

use chrono::{DateTime, Duration, Utc};

use crate::config::{secs, AgentSettings, BackoffSettings};

/// `now + window`, pinned to the latest representable instant on overflow
#[must_use]
pub fn saturating_add(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Per-tab cooldown lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub nudge: Duration,
    pub escalation: Duration,
    pub dismissed: Duration,
    pub completed: Duration,
    pub intervention_timeout: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

impl CooldownPolicy {
    #[must_use]
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            nudge: secs(settings.nudge_cooldown_secs),
            escalation: secs(settings.escalation_cooldown_secs),
            dismissed: secs(settings.dismissed_cooldown_secs),
            completed: secs(settings.completed_cooldown_secs),
            intervention_timeout: secs(settings.intervention_timeout_secs),
        }
    }

    /// End of cooldown after the cheap drifting nudge
    #[must_use]
    pub fn after_drift_nudge(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(now, self.nudge)
    }

    /// End of cooldown after an escalation that chose a break or nudge
    #[must_use]
    pub fn after_escalation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(now, self.escalation)
    }

    /// End of cooldown once the tab reports an outcome.
    /// Dismissal earns the shorter window.
    #[must_use]
    pub fn after_outcome(&self, now: DateTime<Utc>, dismissed: bool) -> DateTime<Utc> {
        let window = if dismissed {
            self.dismissed
        } else {
            self.completed
        };
        saturating_add(now, window)
    }

    /// Whether an intervention opened at `started` has gone unanswered too long
    #[must_use]
    pub fn is_stale(&self, started: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        started.is_some_and(|s| now - s >= self.intervention_timeout)
    }
}

/// Process-wide dismissal tracker
#[derive(Debug, Clone)]
pub struct BackoffTracker {
    dismissed_at: Vec<DateTime<Utc>>,
    backoff_until: Option<DateTime<Utc>>,
    window: Duration,
    dismissals_to_trigger: usize,
    duration: Duration,
    base_threshold: u8,
    backoff_threshold: u8,
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self::from_settings(&BackoffSettings::default())
    }
}

impl BackoffTracker {
    #[must_use]
    pub fn from_settings(settings: &BackoffSettings) -> Self {
        Self {
            dismissed_at: Vec::new(),
            backoff_until: None,
            window: secs(settings.window_secs),
            dismissals_to_trigger: settings.dismissals_to_trigger.max(1),
            duration: secs(settings.duration_secs),
            base_threshold: settings.base_threshold,
            backoff_threshold: settings.backoff_threshold,
        }
    }

    /// Record a dismissal. Returns true when this dismissal activated backoff.
    pub fn record_dismissal(&mut self, now: DateTime<Utc>) -> bool {
        self.dismissed_at.push(now);
        let window = self.window;
        self.dismissed_at.retain(|at| now - *at < window);

        if self.dismissed_at.len() >= self.dismissals_to_trigger {
            let until = saturating_add(now, self.duration);
            self.backoff_until = Some(until);
            self.dismissed_at.clear();
            log::info!("Sensitivity backoff active until {}", until.to_rfc3339());
            return true;
        }
        false
    }

    #[must_use]
    pub fn is_backing_off(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }

    #[must_use]
    pub fn backoff_until(&self) -> Option<DateTime<Utc>> {
        self.backoff_until
    }

    /// Dismissals still inside the window
    #[must_use]
    pub fn pending_dismissals(&self) -> usize {
        self.dismissed_at.len()
    }

    /// Score needed before passive maintenance triggers a heavy intervention
    #[must_use]
    pub fn passive_threshold(&self, now: DateTime<Utc>) -> u8 {
        if self.is_backing_off(now) {
            self.backoff_threshold
        } else {
            self.base_threshold
        }
    }
}
