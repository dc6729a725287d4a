//! Errors surfaced to callers of the agent.
//!
//! Collaborator failures never appear here; they are replaced by fallbacks
//! where they occur.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Missing tab id")]
    MissingTabId,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidMessage(e.to_string())
    }
}
