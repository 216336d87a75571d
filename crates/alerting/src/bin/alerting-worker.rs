//! alerting-worker — runs normalized security events through the detection
//! rules and dispatches alerts to each rule's notification targets.
//!
//! Events are read as newline-delimited JSON from stdin or `--input`.
//! Serves `GET /health`, `GET /rules` and `GET /aggregations`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

use vigil_alerting::{build_router, run_event_loop, shutdown_signal, AppState, EventSource, LineSource, WorkerStats};
use vigil_core::config::load_dotenv;
use vigil_core::Config;
use vigil_notify::templating::TemplateRenderer;
use vigil_notify::FactorySettings;
use vigil_rules::{AggregationTracker, AlertEngine, RuleLoader};

// ── CLI ─────────────────────────────────────────────────────────────

/// Detection worker: rule evaluation, aggregation and alert dispatch.
#[derive(Parser, Debug)]
#[command(name = "alerting-worker", version, about)]
struct Cli {
    /// NDJSON event file to read instead of stdin.
    #[arg(long, short, env = "ALERTING_INPUT")]
    input: Option<PathBuf>,

    /// Rules directory (overrides RULES_DIR).
    #[arg(long)]
    rules_dir: Option<PathBuf>,

    /// Reload rules when files in the rules directory change.
    #[arg(long)]
    watch: bool,

    /// HTTP bind host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// HTTP port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Do not start the HTTP server.
    #[arg(long, env = "ALERTING_NO_HTTP")]
    no_http: bool,

    /// Disable ANSI colours in console alerts.
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,

    /// Keep serving HTTP after the event source is exhausted, until a signal arrives.
    #[arg(long)]
    linger: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.rules_dir {
            config.rules.dir = dir.clone();
        }
        if self.watch {
            config.rules.watch = true;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.log_summary();

    // Rules
    let mut loader = RuleLoader::new(config.rules.dir.clone());
    let load = loader.load_all()?;
    info!(rules = load.rules.len(), failed_files = load.failed(), "rules loaded");
    if load.rules.is_empty() {
        warn!(path = %config.rules.dir.display(), "no rules loaded, no alerts will fire");
    }

    let settings = FactorySettings {
        timeout: config.notify.timeout(),
        console_color: !cli.no_color,
        renderer: Arc::new(TemplateRenderer::new()),
    };
    let tracker = AggregationTracker::new();
    let engine = Arc::new(AlertEngine::with_tracker(
        load.rules,
        settings,
        tracker.clone(),
        config.aggregation.retention(),
    ));

    let sweeper = tracker.start_sweeper(config.aggregation.sweep_interval(), config.aggregation.retention());

    if config.rules.watch {
        let engine = Arc::clone(&engine);
        loader.watch(move |rules| engine.reload(rules))?;
    }

    let stats = Arc::new(WorkerStats::default());

    // HTTP
    let (http_shutdown_tx, http_shutdown_rx) = watch::channel(false);
    let server = if cli.no_http {
        None
    } else {
        let app = build_router(
            AppState {
                engine: Arc::clone(&engine),
                stats: Arc::clone(&stats),
            },
            &config.server.cors_origin,
        );
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %addr, "alerting HTTP server listening");

        let mut rx = http_shutdown_rx;
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await
                .ok();
            info!("alerting HTTP server stopped");
        }))
    };

    // Signals
    let shutdown = Arc::new(Notify::new());
    let signalled = Arc::new(Notify::new());
    {
        let (shutdown, signalled) = (Arc::clone(&shutdown), Arc::clone(&signalled));
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.notify_one();
            signalled.notify_one();
        });
    }

    // Event loop
    let mut source: Box<dyn EventSource> = match &cli.input {
        Some(path) => Box::new(LineSource::open(path).await?),
        None => Box::new(LineSource::stdin()),
    };

    info!("alerting-worker starting");
    run_event_loop(&engine, source.as_mut(), &stats, &shutdown).await;

    if cli.linger && server.is_some() {
        info!("event source finished, serving HTTP until shutdown signal");
        signalled.notified().await;
    }

    // Shutdown: the loop has finished its last event; stop background work.
    sweeper.stop().await;
    let _ = http_shutdown_tx.send(true);
    if let Some(server) = server {
        let _ = server.await;
    }

    let totals = stats.snapshot();
    info!(
        events = totals.events_processed,
        alerts = totals.alerts_raised,
        malformed = totals.malformed_events,
        "alerting-worker exited cleanly"
    );
    Ok(())
}
