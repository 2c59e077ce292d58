//! feedback-daemon - diagnostic report service.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use feedback_core::EventBus;
use feedback_daemon::logging::{init_tracing, LogSettings};
use feedback_daemon::{idle, router, AppState, ClientConnection, DaemonConfig};
use feedback_jobs::{CommandInvoker, OrchestratorConfig, PeerIdentityResolver, ReportOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let _log_guard = init_tracing(&log_settings);
    info!(
        log_format = log_settings.format_name(),
        log_file = %log_settings
            .file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stdout)".to_string()),
        "Logging initialized"
    );

    let config = DaemonConfig::from_env();
    let orchestrator_config = OrchestratorConfig::from_env();
    info!(
        collector = %orchestrator_config.collector_path.display(),
        output_dir = %orchestrator_config.output_dir.display(),
        report_timeout_secs = orchestrator_config.report_timeout.as_secs(),
        idle_exit_secs = config.idle_exit.map(|d| d.as_secs()).unwrap_or(0),
        "Configuration loaded"
    );

    let identity = PeerIdentityResolver::new();
    let orchestrator = Arc::new(ReportOrchestrator::new(
        orchestrator_config,
        Arc::new(identity),
        Arc::new(CommandInvoker::new()),
        EventBus::default(),
    ));

    let state = AppState::new(orchestrator.clone());
    let app = router(state.clone());

    // Start server
    let addr = config.socket_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<ClientConnection>(),
    )
    .with_graceful_shutdown(shutdown_signal(state, orchestrator.clone(), config.idle_exit))
    .await?;

    // Reports already accepted still publish their completion.
    let drain_limit = drain_limit(orchestrator.config());
    if tokio::time::timeout(drain_limit, idle::wait_for_drain(&orchestrator))
        .await
        .is_err()
    {
        warn!(
            drain_secs = drain_limit.as_secs(),
            remaining = orchestrator.working_set().len(),
            "Reports still running at exit"
        );
    }

    info!("Server stopped");
    Ok(())
}

/// Longest a single request can legitimately take: two distro queries and
/// one report run, plus slack for discovery.
fn drain_limit(config: &OrchestratorConfig) -> Duration {
    config.report_timeout + config.distro_timeout * 2 + Duration::from_secs(5)
}

async fn shutdown_signal(
    state: AppState,
    orchestrator: Arc<ReportOrchestrator>,
    idle_exit: Option<Duration>,
) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let idle_timeout = async {
        match idle_exit {
            Some(after) => idle::wait_for_idle(&orchestrator, after).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = idle_timeout => info!("Idle, shutting down"),
    }

    state.begin_shutdown();
}
