//! Builds notifier instances from rule action descriptors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::{ChannelType, NotifierConfig};
use crate::console::ConsoleNotifier;
use crate::slack::SlackNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::{WebhookNotifier, WebhookOptions};

/// Shared settings applied to every notifier the factory builds.
#[derive(Debug, Clone)]
pub struct FactorySettings {
    /// HTTP request timeout for network-backed channels.
    pub timeout: Duration,
    /// Colour console output.
    pub console_color: bool,
    pub renderer: Arc<TemplateRenderer>,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            console_color: true,
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }
}

/// Build a notifier for one action descriptor.
///
/// # Errors
///
/// [`NotifyError::Config`] when required channel options are missing or malformed.
pub fn build_notifier(
    config: &NotifierConfig,
    settings: &FactorySettings,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.channel {
        ChannelType::Console => Ok(Box::new(ConsoleNotifier::new(settings.console_color))),

        ChannelType::Webhook => {
            let url = config
                .str_option("url")
                .ok_or_else(|| NotifyError::Config("webhook notifier requires 'url' in config".to_string()))?;

            let headers = match config.config.get("headers") {
                None | Some(Value::Null) => HashMap::new(),
                Some(Value::Object(map)) => map
                    .iter()
                    .map(|(key, value)| {
                        value
                            .as_str()
                            .map(|v| (key.clone(), v.to_string()))
                            .ok_or_else(|| NotifyError::Config(format!("webhook header '{key}' must be a string")))
                    })
                    .collect::<Result<_, _>>()?,
                Some(_) => {
                    return Err(NotifyError::Config(
                        "webhook 'headers' must be a map of strings".to_string(),
                    ))
                }
            };

            let options = WebhookOptions {
                url: url.to_string(),
                method: config.str_option("method").map(str::to_string),
                headers,
                body_template: config.str_option("body_template").map(str::to_string),
            };
            let notifier = WebhookNotifier::new(options, Arc::clone(&settings.renderer), settings.timeout)?;
            Ok(Box::new(notifier))
        }

        ChannelType::Slack => {
            let url = config.str_option("webhook_url").ok_or_else(|| {
                NotifyError::Config("slack notifier requires 'webhook_url' in config".to_string())
            })?;
            Ok(Box::new(SlackNotifier::new(url, settings.timeout)?))
        }

        ChannelType::Unknown(ref name) => Err(NotifyError::Config(format!("unknown notifier type '{name}'"))),
    }
}
