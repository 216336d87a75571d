//! Alerting service: feeds normalized security events through the detection
//! engine and exposes its state over HTTP.
//!
//! The `alerting-worker` binary wires these pieces together.

pub mod api;
pub mod source;
pub mod worker;

pub use api::{build_router, AppState};
pub use source::{ChannelSource, EventSource, LineSource, SourceError};
pub use worker::{run_event_loop, shutdown_signal, WorkerStats};
