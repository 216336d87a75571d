//! Aggregation window tracker.
//!
//! Counts matching events per `(rule, field value)` over tumbling windows.
//! Buckets are created lazily, reset on rollover or trigger, and removed by
//! a periodic sweep once idle beyond a retention period. The sweep runs as a
//! tokio task owned through a [`SweeperHandle`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::path::key_value;
use crate::schema::AggregationCondition;

/// Default period between eviction sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default idle time after which a bucket is evicted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    pub rule_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationBucket {
    pub count: u64,
    pub window_start: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Outcome of tracking one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationResult {
    pub triggered: bool,
    /// Count after this event, or the captured count when triggered.
    pub count: u64,
}

impl AggregationResult {
    const UNTRACKED: Self = Self {
        triggered: false,
        count: 0,
    };
}

/// Point-in-time view of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSnapshot {
    pub rule_id: String,
    pub value: String,
    pub count: u64,
    pub window_start: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Keyed bucket store shared between event processing and the sweeper.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct AggregationTracker {
    buckets: Arc<Mutex<HashMap<AggregationKey, AggregationBucket>>>,
}

impl AggregationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one matching event at the current time.
    pub fn track(&self, rule_id: &str, doc: &Value, cond: &AggregationCondition) -> AggregationResult {
        self.track_at(rule_id, doc, cond, Utc::now())
    }

    /// Track one matching event at an explicit instant.
    ///
    /// Events whose grouping field is absent, `null` or empty are untracked
    /// and leave every bucket untouched.
    pub fn track_at(
        &self,
        rule_id: &str,
        doc: &Value,
        cond: &AggregationCondition,
        now: DateTime<Utc>,
    ) -> AggregationResult {
        let Some(value) = key_value(doc, &cond.field) else {
            return AggregationResult::UNTRACKED;
        };

        let key = AggregationKey {
            rule_id: rule_id.to_string(),
            value,
        };

        let mut buckets = self.buckets.lock().expect("aggregation lock poisoned");
        let bucket = buckets.entry(key).or_insert_with(|| AggregationBucket {
            count: 0,
            window_start: now,
            last_seen: now,
        });

        if now - bucket.window_start > cond.window() {
            bucket.count = 0;
            bucket.window_start = now;
        }

        bucket.count += 1;
        bucket.last_seen = now;

        if bucket.count >= cond.count_threshold {
            let count = bucket.count;
            bucket.count = 0;
            bucket.window_start = now;
            return AggregationResult {
                triggered: true,
                count,
            };
        }

        AggregationResult {
            triggered: false,
            count: bucket.count,
        }
    }

    /// Remove buckets whose last event is older than `retention`.
    ///
    /// Returns the number of buckets removed.
    pub fn sweep_at(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let mut buckets = self.buckets.lock().expect("aggregation lock poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| (now - bucket.last_seen).num_milliseconds() <= retention_ms);
        before - buckets.len()
    }

    /// Spawn the periodic eviction sweep on the current tokio runtime.
    pub fn start_sweeper(&self, interval: Duration, retention: Duration) -> SweeperHandle {
        let tracker = self.clone();
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // skip immediate tick

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = tracker.sweep_at(Utc::now(), retention);
                        if evicted > 0 {
                            debug!(evicted, remaining = tracker.len(), "evicted idle aggregation buckets");
                        }
                    }
                    _ = stop_signal.notified() => {
                        info!("aggregation sweeper stopping");
                        break;
                    }
                }
            }
        });

        info!(
            interval_secs = interval.as_secs(),
            retention_secs = retention.as_secs(),
            "aggregation sweeper started"
        );

        SweeperHandle {
            stop,
            task: Some(task),
        }
    }

    /// Current count of one bucket.
    pub fn count(&self, rule_id: &str, value: &str) -> Option<u64> {
        let key = AggregationKey {
            rule_id: rule_id.to_string(),
            value: value.to_string(),
        };
        self.buckets
            .lock()
            .expect("aggregation lock poisoned")
            .get(&key)
            .map(|b| b.count)
    }

    /// All buckets, sorted by rule id then value.
    pub fn snapshot(&self) -> Vec<BucketSnapshot> {
        let mut out: Vec<BucketSnapshot> = self
            .buckets
            .lock()
            .expect("aggregation lock poisoned")
            .iter()
            .map(|(key, bucket)| BucketSnapshot {
                rule_id: key.rule_id.clone(),
                value: key.value.clone(),
                count: bucket.count,
                window_start: bucket.window_start,
                last_seen: bucket.last_seen,
            })
            .collect();
        out.sort_by(|a, b| a.rule_id.cmp(&b.rule_id).then_with(|| a.value.cmp(&b.value)));
        out
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().expect("aggregation lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the sweeper task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to finish.
    pub async fn stop(mut self) {
        self.stop.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
