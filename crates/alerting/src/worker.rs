//! Worker loop: pulls events from a source and runs them through the engine
//! one at a time until the source ends or shutdown is requested.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use vigil_rules::AlertEngine;

use crate::source::EventSource;

/// Counters shared between the worker loop and the HTTP layer.
#[derive(Debug, Default)]
pub struct WorkerStats {
    events_processed: AtomicU64,
    alerts_raised: AtomicU64,
    malformed_events: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_processed: u64,
    pub alerts_raised: u64,
    pub malformed_events: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }
}

/// Run until `source` is exhausted, fails, or `shutdown` is notified.
///
/// Shutdown is only observed between events: an event already taken from
/// the source is fully processed, dispatch included.
pub async fn run_event_loop<S: EventSource + ?Sized>(
    engine: &AlertEngine,
    source: &mut S,
    stats: &WorkerStats,
    shutdown: &Notify,
) {
    info!(source = %source.name(), rules = engine.rule_set().len(), "event loop started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("shutdown requested, no longer reading events");
                break;
            }
            next = source.next_event() => next,
        };

        match next {
            Some(Ok(event)) => {
                let alerts = engine.process(&event).await;
                stats.events_processed.fetch_add(1, Ordering::Relaxed);
                stats.alerts_raised.fetch_add(alerts.len() as u64, Ordering::Relaxed);
                if alerts.is_empty() {
                    debug!(event_id = %event.id, event_type = %event.event_type, "no alerts");
                }
            }
            Some(Err(e)) if e.is_recoverable() => {
                stats.malformed_events.fetch_add(1, Ordering::Relaxed);
                warn!(source = %source.name(), error = %e, "skipping malformed event");
            }
            Some(Err(e)) => {
                error!(source = %source.name(), error = %e, "event source failed");
                break;
            }
            None => {
                info!(source = %source.name(), "event source exhausted");
                break;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to register signal handlers, falling back to ctrl_c");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl_c");
        std::future::pending::<()>().await;
    }
}
