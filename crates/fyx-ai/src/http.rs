//! HTTP utilities for the remote decision and quiz services.

use anyhow::{Context, Result};
use std::time::Duration;

/// Extension trait for `reqwest::Response` to handle common error patterns.
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Ensure the response status is successful, returning an error with details if not.
    ///
    /// # Errors
    ///
    /// Returns an error if the response status is not successful (2xx),
    /// including the status code and response body in the error message.
    async fn ensure_success(self, api_name: &str) -> Result<Self>
    where
        Self: Sized;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn ensure_success(self, api_name: &str) -> Result<Self> {
        if !self.status().is_success() {
            let status = self.status();
            let error_text = self.text().await.unwrap_or_default();
            anyhow::bail!("{api_name} API error ({status}): {error_text}");
        }
        Ok(self)
    }
}

/// Build a client with a request timeout so a hung service cannot stall an escalation.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}
