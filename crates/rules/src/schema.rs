//! Detection rule schema as it appears in rule YAML files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use vigil_core::Severity;
use vigil_notify::NotifierConfig;

/// Top-level shape of a rules file: `rules: [...]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RulesDocument {
    #[serde(default)]
    pub rules: Vec<DetectionRule>,
}

/// A named, severity-tagged condition set plus its notification targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionRule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub severity: Severity,
    pub conditions: RuleConditions,
    #[serde(default)]
    pub actions: Vec<NotifierConfig>,
}

fn default_enabled() -> bool {
    true
}

impl DetectionRule {
    pub fn aggregation(&self) -> Option<&AggregationCondition> {
        self.conditions.aggregation.as_ref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_action: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_conditions: Vec<FieldCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationCondition>,
}

/// A single string or a set of strings; a value matches by equality or membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            OneOrMany::One(expected) => expected == value,
            OneOrMany::Many(set) => set.iter().any(|s| s == value),
        }
    }
}

/// Comparison between a dotted field path in the event and a literal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

/// Comparison operators. Unrecognized names deserialize to [`Operator::Unknown`],
/// which never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Contains,
    NotContains,
    In,
    NotIn,
    Gt,
    Lt,
    Gte,
    Lte,
    Unknown(String),
}

impl Operator {
    pub fn from_name(name: &str) -> Self {
        match name {
            "eq" => Operator::Eq,
            "neq" => Operator::Neq,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "gt" => Operator::Gt,
            "lt" => Operator::Lt,
            "gte" => Operator::Gte,
            "lte" => Operator::Lte,
            other => Operator::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Operator::from_name(&name))
    }
}

/// Threshold-over-tumbling-window counting keyed by a field value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationCondition {
    pub field: String,
    pub count_threshold: u64,
    pub time_window_seconds: f64,
}

impl AggregationCondition {
    /// Window length, to the microsecond.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::microseconds((self.time_window_seconds * 1_000_000.0).round() as i64)
    }

    /// Window length for messages: `60` rather than `60.0`.
    pub fn window_label(&self) -> String {
        let secs = self.time_window_seconds;
        if secs.fract() == 0.0 && secs.abs() < 1e15 {
            format!("{}", secs as i64)
        } else {
            format!("{secs}")
        }
    }
}
