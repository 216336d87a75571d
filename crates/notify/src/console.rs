//! Terminal notifier that prints severity-coloured alert summaries to stdout.

use vigil_core::{Alert, Severity};

use crate::traits::{Notifier, NotifyError};

const RESET: &str = "\x1b[0m";

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "\x1b[36m",
        Severity::Medium => "\x1b[33m",
        Severity::High => "\x1b[31m",
        Severity::Critical => "\x1b[35m",
    }
}

/// Prints alerts to standard output.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    /// Emit ANSI colour codes around the severity label.
    color: bool,
}

impl ConsoleNotifier {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Render the lines printed for one alert.
    pub fn render(&self, alert: &Alert) -> Vec<String> {
        let label = format!("[{}]", alert.severity.as_str().to_uppercase());
        let (color, reset) = if self.color {
            (severity_color(alert.severity), RESET)
        } else {
            ("", "")
        };

        let mut lines = vec![
            format!("{color}ALERT {label}{reset} {} - {}", alert.rule_name, alert.message),
            format!("  Event ID: {}", alert.event.id),
            format!("  Triggered: {}", alert.triggered_at.to_rfc3339()),
        ];

        if let Some(actor) = &alert.event.actor {
            let parts: Vec<&str> = [&actor.user, &actor.email, &actor.ip]
                .into_iter()
                .filter_map(|v| v.as_deref())
                .filter(|v| !v.is_empty())
                .collect();
            lines.push(format!("  Actor: {}", parts.join(", ")));

            if let Some(geo) = &actor.geo {
                lines.push(format!(
                    "  Location: {}, {}",
                    geo.city.as_deref().unwrap_or("?"),
                    geo.country.as_deref().unwrap_or("?")
                ));
            }
        }

        lines
    }
}

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut out = self.render(alert).join("\n");
        out.push('\n');
        println!("{out}");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{EventActor, EventType, GeoLocation, SecurityEvent};

    fn alert_with_actor(actor: Option<EventActor>) -> Alert {
        let mut event = SecurityEvent::new("evt-1", EventType::Authentication, "login_success");
        event.actor = actor;
        Alert::new(
            "geo-login",
            "Login From New Country",
            Severity::Critical,
            chrono::Utc::now(),
            event,
            "Login From New Country: login_success by carol".to_string(),
        )
    }

    #[test]
    fn renders_plain_summary() {
        let notifier = ConsoleNotifier::new(false);
        let lines = notifier.render(&alert_with_actor(None));
        assert_eq!(
            lines[0],
            "ALERT [CRITICAL] Login From New Country - Login From New Country: login_success by carol"
        );
        assert_eq!(lines[1], "  Event ID: evt-1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn renders_actor_and_location() {
        let notifier = ConsoleNotifier::new(false);
        let actor = EventActor {
            user: Some("carol".into()),
            ip: Some("203.0.113.4".into()),
            geo: Some(GeoLocation {
                country: Some("NZ".into()),
                city: None,
            }),
            ..Default::default()
        };
        let lines = notifier.render(&alert_with_actor(Some(actor)));
        assert_eq!(lines[3], "  Actor: carol, 203.0.113.4");
        assert_eq!(lines[4], "  Location: ?, NZ");
    }

    #[test]
    fn colour_wraps_label() {
        let notifier = ConsoleNotifier::new(true);
        let lines = notifier.render(&alert_with_actor(None));
        assert!(lines[0].starts_with("\x1b[35mALERT [CRITICAL]\x1b[0m"));
    }

    #[tokio::test]
    async fn notify_always_succeeds() {
        let notifier = ConsoleNotifier::new(false);
        assert!(notifier.notify(&alert_with_actor(None)).await.is_ok());
    }
}
