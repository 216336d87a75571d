use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::alert::Severity;
use crate::error::VigilError;

/// Normalized event category emitted by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Authentication,
    Network,
    File,
    Process,
    Audit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Authentication => "authentication",
            EventType::Network => "network",
            EventType::File => "file",
            EventType::Process => "process",
            EventType::Audit => "audit",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Failure,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// The system that reported the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// The principal that performed the action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventActor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoLocation>,
}

impl EventActor {
    /// Best available identifier: user, then email, then IP.
    pub fn identifier(&self) -> Option<&str> {
        self.user
            .as_deref()
            .or(self.email.as_deref())
            .or(self.ip.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Provenance stamped by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub version: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub enrichments_applied: Vec<String>,
}

/// A normalized security event as delivered on the processed-events stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,

    pub event_type: EventType,
    pub event_action: String,
    #[serde(default)]
    pub event_severity: Severity,
    #[serde(default)]
    pub event_category: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<EventActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EventTarget>,

    #[serde(default)]
    pub outcome: EventOutcome,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineMetadata>,
}

impl SecurityEvent {
    /// Minimal event with the given type and action; everything else defaulted.
    pub fn new(id: impl Into<String>, event_type: EventType, event_action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            ingested_at: None,
            event_type,
            event_action: event_action.into(),
            event_severity: Severity::default(),
            event_category: Vec::new(),
            source: None,
            actor: None,
            target: None,
            outcome: EventOutcome::default(),
            metadata: Map::new(),
            pipeline: None,
        }
    }

    /// Parse one event from a JSON document.
    pub fn from_json(input: &str) -> Result<Self, VigilError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Project the event into a JSON value for dotted-path field lookup.
    ///
    /// Unset optional fields are omitted, so they resolve as absent rather
    /// than as `null`.
    pub fn to_document(&self) -> Result<Value, VigilError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Best available actor identifier, `"unknown"` when there is none.
    pub fn actor_label(&self) -> &str {
        self.actor
            .as_ref()
            .and_then(EventActor::identifier)
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_normalized_event() {
        let event = SecurityEvent::from_json(
            r#"{
                "id": "evt-1",
                "timestamp": "2025-06-14T10:00:00Z",
                "event_type": "authentication",
                "event_action": "login_failure",
                "event_severity": "medium",
                "actor": {"user": "alice", "ip": "10.0.0.9"},
                "outcome": "failure",
                "metadata": {"attempts": 3}
            }"#,
        )
        .unwrap();

        assert_eq!(event.event_type, EventType::Authentication);
        assert_eq!(event.event_severity, Severity::Medium);
        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.actor_label(), "alice");
        assert_eq!(event.metadata["attempts"], json!(3));
    }

    #[test]
    fn document_omits_unset_fields() {
        let event = SecurityEvent::new("evt-2", EventType::Network, "connect");
        let doc = event.to_document().unwrap();

        assert_eq!(doc["event_type"], json!("network"));
        assert!(doc.get("actor").is_none());
        assert!(doc.get("target").is_none());
    }

    #[test]
    fn actor_label_preference() {
        let mut event = SecurityEvent::new("evt-3", EventType::Authentication, "login");
        assert_eq!(event.actor_label(), "unknown");

        event.actor = Some(EventActor {
            ip: Some("192.168.1.5".into()),
            ..Default::default()
        });
        assert_eq!(event.actor_label(), "192.168.1.5");

        event.actor.as_mut().unwrap().email = Some("bob@example.com".into());
        assert_eq!(event.actor_label(), "bob@example.com");

        event.actor.as_mut().unwrap().user = Some("bob".into());
        assert_eq!(event.actor_label(), "bob");
    }

    #[test]
    fn rejects_unknown_event_type() {
        let result = SecurityEvent::from_json(
            r#"{"id": "x", "timestamp": "2025-06-14T10:00:00Z", "event_type": "dns", "event_action": "query"}"#,
        );
        assert!(result.is_err());
    }
}
