//! Routes alerts to the notification targets of the rule that raised them.
//!
//! Targets are called in declaration order. Each call is bounded by the
//! dispatcher timeout, and a failing or slow target never prevents the
//! remaining targets from being called.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use vigil_core::Alert;

use crate::traits::{DispatchResult, Notifier, NotifyError};

type Targets = Vec<Box<dyn Notifier>>;

/// Per-rule notification targets plus the per-call deadline.
pub struct Dispatcher {
    rule_channels: HashMap<String, Targets>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(rule_channels: HashMap<String, Targets>, timeout: Duration) -> Self {
        Self {
            rule_channels,
            timeout,
        }
    }

    pub fn empty(timeout: Duration) -> Self {
        Self::new(HashMap::new(), timeout)
    }

    /// Install `channels` for `rule_id`, replacing any previous set.
    pub fn set_rule_channels(&mut self, rule_id: String, channels: Targets) {
        self.rule_channels.insert(rule_id, channels);
    }

    pub fn channel_count(&self, rule_id: &str) -> usize {
        self.rule_channels.get(rule_id).map_or(0, Vec::len)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call each target of `rule_id` in order, one result per target.
    pub async fn dispatch(&self, rule_id: &str, alert: &Alert) -> Vec<DispatchResult> {
        let targets = match self.rule_channels.get(rule_id) {
            Some(targets) if !targets.is_empty() => targets,
            _ => {
                tracing::debug!(rule_id, "rule has no notification targets");
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.deliver(target.as_ref(), rule_id, alert).await);
        }
        results
    }

    async fn deliver(&self, target: &dyn Notifier, rule_id: &str, alert: &Alert) -> DispatchResult {
        let channel = target.channel_name();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, target.notify(alert))
            .await
            .unwrap_or(Err(NotifyError::Timeout(self.timeout)));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let error = match outcome {
            Ok(()) => {
                tracing::info!(rule_id, alert_id = %alert.id, channel, duration_ms, "alert delivered");
                None
            }
            Err(e) => {
                tracing::warn!(rule_id, alert_id = %alert.id, channel, duration_ms, error = %e, "alert delivery failed");
                Some(e.to_string())
            }
        };

        DispatchResult {
            channel: channel.to_string(),
            success: error.is_none(),
            error,
            duration_ms,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .rule_channels
            .iter()
            .map(|(rule, channels)| (rule.as_str(), channels.len()))
            .collect();
        f.debug_struct("Dispatcher")
            .field("rule_channels", &counts)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use vigil_core::{EventType, SecurityEvent, Severity};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[derive(Clone, Copy)]
    enum Behaviour {
        Accept,
        Reject,
        Stall,
    }

    /// Records the name of every target that completed a call.
    struct Scripted {
        name: &'static str,
        behaviour: Behaviour,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl Notifier for Scripted {
        async fn notify(&self, _alert: &Alert) -> Result<(), NotifyError> {
            if let Behaviour::Stall = self.behaviour {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.log.lock().unwrap().push(self.name);
            match self.behaviour {
                Behaviour::Reject => Err(NotifyError::Delivery("upstream said no".to_string())),
                _ => Ok(()),
            }
        }

        fn channel_name(&self) -> &str {
            self.name
        }
    }

    fn dispatcher_with(script: &[(&'static str, Behaviour)]) -> (Dispatcher, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let targets: Targets = script
            .iter()
            .map(|&(name, behaviour)| {
                Box::new(Scripted {
                    name,
                    behaviour,
                    log: Arc::clone(&log),
                }) as Box<dyn Notifier>
            })
            .collect();
        let mut dispatcher = Dispatcher::empty(TIMEOUT);
        dispatcher.set_rule_channels("rule-1".to_string(), targets);
        (dispatcher, log)
    }

    fn alert() -> Alert {
        Alert::new(
            "rule-1",
            "Rule One",
            Severity::Medium,
            chrono::Utc::now(),
            SecurityEvent::new("evt-1", EventType::Process, "spawn"),
            "Rule One: spawn by unknown".to_string(),
        )
    }

    #[tokio::test]
    async fn every_target_called_in_order() {
        let (dispatcher, log) = dispatcher_with(&[("a", Behaviour::Accept), ("b", Behaviour::Accept)]);

        let results = dispatcher.dispatch("rule-1", &alert()).await;

        assert!(results.iter().all(|r| r.success && r.error.is_none()));
        let channels: Vec<_> = results.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(channels, ["a", "b"]);
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn failing_target_does_not_stop_the_rest() {
        let (dispatcher, log) = dispatcher_with(&[("bad", Behaviour::Reject), ("good", Behaviour::Accept)]);

        let results = dispatcher.dispatch("rule-1", &alert()).await;

        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("upstream said no"));
        assert!(results[1].success);
        assert_eq!(*log.lock().unwrap(), ["bad", "good"]);
    }

    #[tokio::test]
    async fn stalled_target_is_cut_off_at_timeout() {
        let (dispatcher, log) = dispatcher_with(&[("slow", Behaviour::Stall), ("good", Behaviour::Accept)]);

        let results = dispatcher.dispatch("rule-1", &alert()).await;

        assert!(!results[0].success);
        assert!(results[0].duration_ms < 5_000);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].success);
        assert_eq!(*log.lock().unwrap(), ["good"]);
    }

    #[tokio::test]
    async fn rule_without_targets_yields_nothing() {
        let (dispatcher, _) = dispatcher_with(&[]);
        assert!(dispatcher.dispatch("rule-1", &alert()).await.is_empty());
        assert!(dispatcher.dispatch("nonexistent", &alert()).await.is_empty());
        assert_eq!(dispatcher.channel_count("nonexistent"), 0);
    }
}
