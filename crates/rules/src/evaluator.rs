//! Rule evaluation: matcher, then aggregation, then alert construction.

use chrono::{DateTime, Utc};
use serde_json::Value;
use vigil_core::{Alert, SecurityEvent};

use crate::aggregator::AggregationTracker;
use crate::matcher::matches;
use crate::path::key_value;
use crate::schema::{AggregationCondition, DetectionRule};

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("rule '{rule_id}' has no aggregation condition")]
    MissingAggregation { rule_id: String },
}

/// Outcome of evaluating one rule against one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub alert: Option<Alert>,
    /// Bucket count for aggregated rules, reported even without an alert.
    pub aggregation_count: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    tracker: AggregationTracker,
}

impl RuleEvaluator {
    pub fn new(tracker: AggregationTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &AggregationTracker {
        &self.tracker
    }

    /// Evaluate `rule` against `event`, whose projection is `doc`.
    pub fn evaluate(
        &self,
        event: &SecurityEvent,
        doc: &Value,
        rule: &DetectionRule,
    ) -> Result<Evaluation, EvaluateError> {
        self.evaluate_at(event, doc, rule, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        event: &SecurityEvent,
        doc: &Value,
        rule: &DetectionRule,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvaluateError> {
        if !matches(doc, rule) {
            return Ok(Evaluation::default());
        }

        let Some(aggregation) = rule.aggregation() else {
            return Ok(Evaluation {
                alert: Some(immediate_alert(event, rule, now)),
                aggregation_count: None,
            });
        };

        let result = self.tracker.track_at(&rule.id, doc, aggregation, now);
        if !result.triggered {
            return Ok(Evaluation {
                alert: None,
                aggregation_count: Some(result.count),
            });
        }

        let alert = aggregated_alert(event, doc, rule, result.count, now)?;
        Ok(Evaluation {
            alert: Some(alert),
            aggregation_count: Some(result.count),
        })
    }
}

/// Alert for a rule without aggregation.
pub fn immediate_alert(event: &SecurityEvent, rule: &DetectionRule, now: DateTime<Utc>) -> Alert {
    Alert::new(
        rule.id.clone(),
        rule.name.clone(),
        rule.severity,
        now,
        event.clone(),
        immediate_message(&rule.name, event),
    )
}

/// Alert for an aggregated rule that reached its threshold with `count` events.
///
/// # Errors
///
/// [`EvaluateError::MissingAggregation`] when the rule has no aggregation condition.
pub fn aggregated_alert(
    event: &SecurityEvent,
    doc: &Value,
    rule: &DetectionRule,
    count: u64,
    now: DateTime<Utc>,
) -> Result<Alert, EvaluateError> {
    let aggregation = rule.aggregation().ok_or_else(|| EvaluateError::MissingAggregation {
        rule_id: rule.id.clone(),
    })?;

    let value = key_value(doc, &aggregation.field).unwrap_or_else(|| "unknown".to_string());
    Ok(Alert::new(
        rule.id.clone(),
        rule.name.clone(),
        rule.severity,
        now,
        event.clone(),
        aggregated_message(&rule.name, count, &value, aggregation),
    ))
}

/// `"{name}: {action} by {actor}"`.
pub fn immediate_message(rule_name: &str, event: &SecurityEvent) -> String {
    format!("{rule_name}: {} by {}", event.event_action, event.actor_label())
}

/// `"{name}: {count} occurrences from {value} in {window}s"`.
pub fn aggregated_message(
    rule_name: &str,
    count: u64,
    value: &str,
    aggregation: &AggregationCondition,
) -> String {
    format!(
        "{rule_name}: {count} occurrences from {value} in {}s",
        aggregation.window_label()
    )
}
