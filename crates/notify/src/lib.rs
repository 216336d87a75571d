//! Notification targets for detection alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Console, webhook, and Slack notifier implementations
//! - Minijinja template rendering for webhook request bodies
//! - A factory that builds notifiers from rule action descriptors
//! - Dispatcher that routes alerts to each rule's channels with a per-call timeout

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod env;
pub mod factory;
pub mod slack;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use config::{ChannelType, NotifierConfig};
pub use dispatcher::Dispatcher;
pub use factory::{build_notifier, FactorySettings};
pub use webhook::{WebhookNotifier, WebhookOptions};
pub use traits::{DispatchResult, Notifier, NotifyError};
