//! The notification target seam and its error type.

use std::time::Duration;

use vigil_core::Alert;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("template: {0}")]
    Template(String),

    /// Bad or missing channel options, reported when rules are loaded.
    #[error("invalid notifier config: {0}")]
    Config(String),

    #[error("delivery rejected: {0}")]
    Delivery(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A place alerts can be sent.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Short channel label used in logs and dispatch results.
    fn channel_name(&self) -> &str;
}

/// How one target handled one alert.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
