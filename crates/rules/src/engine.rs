//! Alert dispatch loop.
//!
//! [`AlertEngine::process`] evaluates every loaded rule against an event in
//! load order and hands each alert to that rule's notification targets.
//! The rule set is swapped wholesale on reload; aggregation buckets of
//! rules that disappear age out through the sweep.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};
use vigil_core::{Alert, SecurityEvent};
use vigil_notify::{build_notifier, Dispatcher, FactorySettings, Notifier};

use crate::aggregator::{AggregationTracker, DEFAULT_RETENTION};
use crate::evaluator::{Evaluation, RuleEvaluator};
use crate::schema::DetectionRule;

/// Rules in load order plus the notification targets built for them.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<DetectionRule>,
    dispatcher: Dispatcher,
}

impl RuleSet {
    pub fn new(rules: Vec<DetectionRule>, dispatcher: Dispatcher) -> Self {
        Self { rules, dispatcher }
    }

    /// Build notifiers for every rule action. Actions that cannot be built
    /// are logged and skipped; the rest of the rule stays active.
    pub fn build(rules: Vec<DetectionRule>, settings: &FactorySettings) -> Self {
        let mut dispatcher = Dispatcher::empty(settings.timeout);

        for rule in &rules {
            let mut channels: Vec<Box<dyn Notifier>> = Vec::with_capacity(rule.actions.len());
            for (index, action) in rule.actions.iter().enumerate() {
                match build_notifier(action, settings) {
                    Ok(notifier) => channels.push(notifier),
                    Err(e) => warn!(
                        rule_id = %rule.id,
                        action = index,
                        channel = %action.channel,
                        error = %e,
                        "skipping notification target that failed to build"
                    ),
                }
            }
            dispatcher.set_rule_channels(rule.id.clone(), channels);
        }

        Self { rules, dispatcher }
    }

    pub fn empty(timeout: Duration) -> Self {
        Self::new(Vec::new(), Dispatcher::empty(timeout))
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Evaluates events against the current rule set and dispatches alerts.
pub struct AlertEngine {
    evaluator: RuleEvaluator,
    rule_set: RwLock<Arc<RuleSet>>,
    settings: FactorySettings,
    retention: Duration,
}

impl AlertEngine {
    /// Build an engine over `rules` with a fresh tracker.
    pub fn new(rules: Vec<DetectionRule>, settings: FactorySettings) -> Self {
        Self::with_tracker(rules, settings, AggregationTracker::new(), DEFAULT_RETENTION)
    }

    /// Build an engine that shares an existing tracker.
    ///
    /// `retention` is only used to warn about rules whose window would be
    /// cut short by the sweep.
    pub fn with_tracker(
        rules: Vec<DetectionRule>,
        settings: FactorySettings,
        tracker: AggregationTracker,
        retention: Duration,
    ) -> Self {
        warn_on_long_windows(&rules, retention);
        let rule_set = RuleSet::build(rules, &settings);
        Self::from_rule_set(rule_set, settings, tracker, retention)
    }

    /// Build an engine from a prepared rule set.
    pub fn from_rule_set(
        rule_set: RuleSet,
        settings: FactorySettings,
        tracker: AggregationTracker,
        retention: Duration,
    ) -> Self {
        Self {
            evaluator: RuleEvaluator::new(tracker),
            rule_set: RwLock::new(Arc::new(rule_set)),
            settings,
            retention,
        }
    }

    /// Process one event: evaluate all rules and dispatch every alert.
    ///
    /// Rule errors and notification failures are logged, never returned.
    pub async fn process(&self, event: &SecurityEvent) -> Vec<Alert> {
        let rule_set = self.rule_set();

        let doc = match event.to_document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "failed to project event, skipping");
                return Vec::new();
            }
        };

        let mut alerts = Vec::new();

        for rule in rule_set.rules() {
            match self.evaluator.evaluate(event, &doc, rule) {
                Ok(Evaluation {
                    alert: Some(alert),
                    aggregation_count,
                }) => {
                    info!(
                        rule_id = %rule.id,
                        alert_id = %alert.id,
                        event_id = %event.id,
                        severity = %alert.severity,
                        count = ?aggregation_count,
                        "alert triggered"
                    );
                    let results = rule_set.dispatcher().dispatch(&rule.id, &alert).await;
                    let failed = results.iter().filter(|r| !r.success).count();
                    if failed > 0 {
                        warn!(rule_id = %rule.id, failed, total = results.len(), "some notifications failed");
                    }
                    alerts.push(alert);
                }
                Ok(Evaluation {
                    alert: None,
                    aggregation_count: Some(count),
                }) => {
                    debug!(rule_id = %rule.id, event_id = %event.id, count, "aggregation below threshold");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(rule_id = %rule.id, event_id = %event.id, error = %e, "rule evaluation failed");
                }
            }
        }

        alerts
    }

    /// Replace the rule set, rebuilding notification targets.
    pub fn reload(&self, rules: Vec<DetectionRule>) {
        warn_on_long_windows(&rules, self.retention);
        self.replace_rule_set(RuleSet::build(rules, &self.settings));
    }

    /// Replace the rule set with a prepared one.
    pub fn replace_rule_set(&self, rule_set: RuleSet) {
        let count = rule_set.len();
        *self.rule_set.write().expect("rule set lock poisoned") = Arc::new(rule_set);
        info!(rules = count, "rule set replaced");
    }

    /// Current rule set snapshot.
    pub fn rule_set(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rule_set.read().expect("rule set lock poisoned"))
    }

    /// Current rules, in load order.
    pub fn rules(&self) -> Vec<DetectionRule> {
        self.rule_set().rules().to_vec()
    }

    pub fn tracker(&self) -> &AggregationTracker {
        self.evaluator.tracker()
    }
}

fn warn_on_long_windows(rules: &[DetectionRule], retention: Duration) {
    let retention_secs = retention.as_secs_f64();
    for rule in rules {
        if let Some(agg) = rule.aggregation() {
            if agg.time_window_seconds >= retention_secs {
                warn!(
                    rule_id = %rule.id,
                    window_secs = agg.time_window_seconds,
                    retention_secs,
                    "aggregation window is not shorter than bucket retention; idle buckets may be evicted mid-window"
                );
            }
        }
    }
}
