use anyhow::{Context, Result};
use chrono::Duration;
use fyx_ai::AiConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the local data directory for fyx.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("fyx");
    Ok(path)
}

/// Top-level configuration, read from `config.toml` in the data directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FyxConfig {
    pub agent: AgentSettings,
    pub backoff: BackoffSettings,
    pub services: ServiceSettings,
    pub ai: AiConfig,
    pub storage: StorageSettings,
}

/// Per-tab agent timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Cooldown after a drifting nudge
    pub nudge_cooldown_secs: u64,
    /// Cooldown after a break or nudge chosen by escalation
    pub escalation_cooldown_secs: u64,
    /// Cooldown after the user dismisses an intervention
    pub dismissed_cooldown_secs: u64,
    /// Cooldown after the user completes an intervention
    pub completed_cooldown_secs: u64,
    /// An open intervention older than this is reclaimed on the next signal
    pub intervention_timeout_secs: u64,
    /// Outcome records kept per tab
    pub history_limit: usize,
    /// Idle below this counts as activity
    pub active_idle_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            nudge_cooldown_secs: 2 * 60,
            escalation_cooldown_secs: 8 * 60,
            dismissed_cooldown_secs: 6 * 60,
            completed_cooldown_secs: 9 * 60,
            intervention_timeout_secs: 5 * 60,
            history_limit: 12,
            active_idle_secs: 8,
        }
    }
}

/// Cross-tab sensitivity backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub window_secs: u64,
    pub dismissals_to_trigger: usize,
    pub duration_secs: u64,
    pub base_threshold: u8,
    pub backoff_threshold: u8,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            window_secs: 30 * 60,
            dismissals_to_trigger: 2,
            duration_secs: 30 * 60,
            base_threshold: 7,
            backoff_threshold: 9,
        }
    }
}

/// Remote decision and quiz endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub decide_url: String,
    pub quiz_url: String,
    pub timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            decide_url: "http://127.0.0.1:8787/decide".to_string(),
            quiz_url: "http://127.0.0.1:8787/quiz".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Intervention log persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub enabled: bool,
    pub log_limit: usize,
    pub db_path: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_limit: 30,
            db_path: None,
        }
    }
}

/// Convert configured seconds into a chrono duration, saturating on overflow
#[must_use]
pub fn secs(value: u64) -> Duration {
    const MAX_SECS: i64 = i64::MAX / 1000;
    Duration::seconds(i64::try_from(value).map_or(MAX_SECS, |v| v.min(MAX_SECS)))
}

impl FyxConfig {
    /// Default config file location
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_data_dir()?.join("config.toml"))
    }

    /// Load from `path`; a missing file yields defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config TOML")
    }

    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let text = self.to_toml()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        log::info!("Wrote config to {}", path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
