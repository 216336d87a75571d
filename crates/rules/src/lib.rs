//! Security event detection rules.
//!
//! This crate provides:
//! - YAML rule schema with serde deserialization
//! - Dotted-path field lookup over event projections
//! - Condition matcher and tumbling-window aggregation tracker
//! - Rule evaluator and the per-event alert dispatch loop
//! - Filesystem loader with hot-reload via `notify` watcher

pub mod aggregator;
pub mod engine;
pub mod evaluator;
pub mod loader;
pub mod matcher;
pub mod path;
pub mod schema;

pub use aggregator::{AggregationResult, AggregationTracker, BucketSnapshot, SweeperHandle};
pub use engine::{AlertEngine, RuleSet};
pub use evaluator::{EvaluateError, Evaluation, RuleEvaluator};
pub use loader::{load_from_str, RuleLoad, RuleLoader};
pub use schema::{AggregationCondition, DetectionRule, FieldCondition, OneOrMany, Operator, RuleConditions};
