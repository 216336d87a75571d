//! Minijinja rendering for webhook bodies.
//!
//! Templates see `alert` (the alert summary), `event` (the full event
//! document) and `now`.

use serde_json::Value;
use vigil_core::Alert;

use crate::traits::NotifyError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub alert: AlertContext,
    pub event: Value,
    /// RFC 3339 render time.
    pub now: String,
}

/// Alert fields exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertContext {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    /// Lowercase severity label (e.g., `"high"`).
    pub severity: String,
    pub message: String,
    pub triggered_at: String,
}

impl TemplateContext {
    pub fn from_alert(alert: &Alert, now: String) -> Result<Self, NotifyError> {
        let event = alert
            .event
            .to_document()
            .map_err(|e| NotifyError::Template(format!("failed to project event: {e}")))?;

        Ok(Self {
            alert: AlertContext {
                id: alert.id.to_string(),
                rule_id: alert.rule_id.clone(),
                rule_name: alert.rule_name.clone(),
                severity: alert.severity.to_string(),
                message: alert.message.clone(),
                triggered_at: alert.triggered_at.to_rfc3339(),
            },
            event,
            now,
        })
    }
}

/// Renders webhook body templates.
///
/// Filters: `lower`, `upper`, `json_escape`. Globals: `env(name)`.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: minijinja::Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = minijinja::Environment::new();
        env.add_filter("lower", |s: String| s.to_lowercase());
        env.add_filter("upper", |s: String| s.to_uppercase());
        env.add_filter("json_escape", json_escape_filter);
        env.add_function("env", env_function);
        Self { env }
    }

    pub fn render(&self, source: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        self.env
            .render_str(source, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Parse `source` without rendering it. Filter names resolve at render time.
    pub fn validate(&self, source: &str) -> Result<(), NotifyError> {
        minijinja::Environment::new()
            .template_from_str(source)
            .map(|_| ())
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of a JSON string literal, without the surrounding quotes.
fn json_escape_filter(value: String) -> String {
    let quoted = Value::String(value).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Unset variables render as the empty string.
fn env_function(name: String) -> String {
    std::env::var(&name).unwrap_or_else(|_| {
        tracing::warn!(var = %name, "template referenced unset environment variable");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vigil_core::{EventActor, EventType, SecurityEvent, Severity};

    fn sample_context() -> TemplateContext {
        let mut event = SecurityEvent::new("evt-42", EventType::Authentication, "login_failure");
        event.actor = Some(EventActor {
            user: Some("alice".to_string()),
            ip: Some("10.0.0.9".to_string()),
            ..Default::default()
        });
        let mut alert = Alert::new(
            "brute-force",
            "Brute Force Login",
            Severity::High,
            Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap(),
            event,
            "Brute Force Login: 5 occurrences from 10.0.0.9 in 60s".to_string(),
        );
        alert.id = vigil_core::AlertId::nil();
        TemplateContext::from_alert(&alert, "2026-02-16T12:00:01Z".to_string()).unwrap()
    }

    fn render(template: &str) -> Result<String, NotifyError> {
        TemplateRenderer::new().render(template, &sample_context())
    }

    #[test]
    fn alert_fields_and_case_filters() {
        let out = render("[{{ alert.severity | upper }}] {{ alert.rule_name | lower }}").unwrap();
        assert_eq!(out, "[HIGH] brute force login");
    }

    #[test]
    fn event_document_is_addressable() {
        let out = render("{{ event.actor.user }}@{{ event.actor.ip }} {{ event.event_action }}").unwrap();
        assert_eq!(out, "alice@10.0.0.9 login_failure");
    }

    #[test]
    fn json_body_stays_parseable() {
        let body = render(r#"{"text": "{{ alert.message | json_escape }}", "id": "{{ alert.id }}", "at": "{{ now }}"}"#)
            .unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(parsed["at"], "2026-02-16T12:00:01Z");
        assert!(parsed["text"].as_str().unwrap().contains("10.0.0.9"));
    }

    #[test]
    fn json_escape_handles_quotes_and_newlines() {
        assert_eq!(json_escape_filter("say \"hi\"\nbye".to_string()), r#"say \"hi\"\nbye"#);
    }

    #[test]
    fn env_global_reads_process_environment() {
        std::env::set_var("VIGIL_TEMPLATE_TEST_VAR", "from-env");
        let out = render("{{ env('VIGIL_TEMPLATE_TEST_VAR') }}");
        std::env::remove_var("VIGIL_TEMPLATE_TEST_VAR");
        assert_eq!(out.unwrap(), "from-env");

        assert_eq!(render("<{{ env('VIGIL_TEMPLATE_SURELY_UNSET') }}>").unwrap(), "<>");
    }

    #[test]
    fn syntax_errors_surface_as_template_errors() {
        assert!(matches!(render("{{ unclosed"), Err(NotifyError::Template(msg)) if !msg.is_empty()));

        let renderer = TemplateRenderer::new();
        assert!(renderer.validate("Hello {{ alert.rule_name | upper }}").is_ok());
        assert!(renderer.validate("{% if %}").is_err());
    }
}
