//! Slack incoming-webhook notifier.

use std::time::Duration;

use serde_json::json;
use vigil_core::Alert;

use crate::env::expand_env;
use crate::traits::{Notifier, NotifyError};

/// Posts a `text` message to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// `${VAR_NAME}` references in the URL are resolved at construction time.
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let webhook_url = expand_env(webhook_url)?;
        if webhook_url.is_empty() {
            return Err(NotifyError::Config(
                "Slack webhook_url must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { webhook_url, client })
    }
}

/// Slack message body for an alert.
pub fn slack_payload(alert: &Alert) -> serde_json::Value {
    json!({
        "text": format!(
            "*[{}]* {}\n{}\nEvent `{}` at {}",
            alert.severity.as_str().to_uppercase(),
            alert.rule_name,
            alert.message,
            alert.event.id,
            alert.triggered_at.to_rfc3339(),
        ),
    })
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&slack_payload(alert))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Slack webhook returned non-2xx status");
            return Err(NotifyError::Delivery(format!("slack returned {status}: {body}")));
        }

        tracing::debug!(alert_id = %alert.id, "Slack notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
