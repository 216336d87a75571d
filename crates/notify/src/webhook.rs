//! HTTP webhook channel.
//!
//! Posts each alert to a URL, either as the default JSON payload or as a
//! body rendered from a minijinja template.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use vigil_core::Alert;

use crate::env::expand_env;
use crate::templating::{TemplateContext, TemplateRenderer};
use crate::traits::{Notifier, NotifyError};

/// Raw webhook options as written in a rule's action block.
#[derive(Debug, Clone, Default)]
pub struct WebhookOptions {
    pub url: String,
    /// Case-insensitive HTTP verb, `POST` when unset.
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub body_template: Option<String>,
}

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    method: Method,
    headers: HeaderMap,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Validate the options and build the notifier.
    ///
    /// `${VAR}` references in the URL and header values are expanded here,
    /// so a missing variable fails the rule's action at load time.
    pub fn new(
        options: WebhookOptions,
        renderer: Arc<TemplateRenderer>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let url = expand_env(&options.url)?;

        let method = match options.method.as_deref() {
            None => Method::POST,
            Some(raw) => Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
                .map_err(|_| NotifyError::Config(format!("unsupported webhook method '{raw}'")))?,
        };

        let mut headers = HeaderMap::with_capacity(options.headers.len() + 1);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, raw) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NotifyError::Config(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(&expand_env(raw)?)
                .map_err(|_| NotifyError::Config(format!("invalid value for header '{name}'")))?;
            headers.insert(name, value);
        }

        if let Some(template) = &options.body_template {
            renderer
                .validate(template)
                .map_err(|e| NotifyError::Config(format!("webhook body_template does not parse: {e}")))?;
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            url,
            method,
            headers,
            body_template: options.body_template,
            renderer,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request `notify` sends for `alert`.
    pub fn request_for(&self, alert: &Alert) -> Result<reqwest::Request, NotifyError> {
        let request = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .body(self.body_for(alert)?)
            .build()?;
        Ok(request)
    }

    fn body_for(&self, alert: &Alert) -> Result<String, NotifyError> {
        let Some(template) = &self.body_template else {
            return Ok(alert_payload(alert).to_string());
        };
        let ctx = TemplateContext::from_alert(alert, chrono::Utc::now().to_rfc3339())?;
        self.renderer.render(template, &ctx)
    }
}

/// Default JSON payload: alert summary plus the identifying parts of the event.
pub fn alert_payload(alert: &Alert) -> serde_json::Value {
    json!({
        "alert_id": alert.id,
        "rule_id": alert.rule_id,
        "rule_name": alert.rule_name,
        "severity": alert.severity,
        "message": alert.message,
        "triggered_at": alert.triggered_at,
        "event": {
            "id": alert.event.id,
            "type": alert.event.event_type,
            "action": alert.event.event_action,
            "actor": alert.event.actor,
            "source": alert.event.source,
        },
    })
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let request = self.request_for(alert)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(rule_id = %alert.rule_id, url = %self.url, %status, "webhook accepted alert");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(rule_id = %alert.rule_id, url = %self.url, %status, "webhook rejected alert");
        Err(NotifyError::Delivery(format!("{} {} -> {status}: {detail}", self.method, self.url)))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
