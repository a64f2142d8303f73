//! Hot-swap engine service
//!
//! Hosts every swapper variant behind one audit log and exposes their state
//! over a read-only HTTP API and Prometheus metrics. Swaps, votes and chain
//! registrations are driven through the library types; the service itself
//! has no write surface.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, warn};

use hotswap_engine::api::{self, AppState};
use hotswap_engine::config::Settings;
use hotswap_engine::events::AuditLog;
use hotswap_engine::metrics::{self, MetricsServer};
use hotswap_engine::swapper::SwapperSuite;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first: it decides the log format
    let settings = Settings::load()?;

    init_logging(settings.service.log_json);

    info!("Starting hot-swap engine v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Loaded configuration for instance {} ({} chains)",
        settings.service.instance_id,
        settings.chains.len()
    );

    let audit = match &settings.audit.path {
        Some(path) => {
            let log = AuditLog::with_file(path)
                .with_context(|| format!("Failed to open audit file {:?}", path))?;
            info!("Audit records mirrored to {:?}", path);
            log
        }
        None => AuditLog::new(),
    };
    let audit = Arc::new(audit);

    let suite = Arc::new(SwapperSuite::from_settings(&settings, audit.clone())?);
    info!("Swappers initialized");

    // Mirror audit records into the log stream
    let audit_handle = tokio::spawn({
        let mut records = audit.subscribe();
        async move {
            loop {
                match records.recv().await {
                    Ok(record) => info!(
                        sequence = record.sequence,
                        event = record.event.name(),
                        "audit"
                    ),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Audit subscriber lagged, skipped {} records", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            suite: suite.clone(),
            instance_id: settings.service.instance_id.clone(),
            started_at: Instant::now(),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health check loop
    let health_handle = tokio::spawn({
        let suite = suite.clone();
        let interval = settings.service.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                // Requested entries never expire; surface any left by
                // in-process callers of the suite every tick
                for (swapper, pending) in suite.pending_requests().await {
                    metrics::record_pending_requests(swapper.as_str(), pending);
                    if pending > 0 {
                        warn!("{} swapper has {} pending request(s)", swapper, pending);
                    }
                }

                metrics::record_health_check();
            }
        }
    });

    info!("Hot-swap engine is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Abort background tasks
    api_handle.abort();
    health_handle.abort();
    audit_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    audit.flush().await;
    info!("Hot-swap engine stopped with {} audit records", audit.len().await);
    Ok(())
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hotswap_engine=debug,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
