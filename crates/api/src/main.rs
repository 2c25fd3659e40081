use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ehco_core::scratch::ScratchArea;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ehco_api::background::artifact_retention;
use ehco_api::codec::orchestrator::JobOrchestrator;
use ehco_api::config::ServerConfig;
use ehco_api::router::build_app_router;
use ehco_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "ehco_api=debug,ehco_core=debug,tower_http=debug";

/// How long shutdown waits for background tasks to notice cancellation.
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(ServerConfig::from_env());
    tracing::info!(
        host = %config.host,
        port = config.port,
        scratch_dir = %config.scratch_dir.display(),
        public_dir = %config.public_dir.display(),
        "Configuration loaded"
    );

    // Without writable scratch space no job can run; report once and stop.
    let scratch = match ScratchArea::init(&config.scratch_dir, &config.public_dir).await {
        Ok(scratch) => scratch,
        Err(e) => {
            tracing::error!(error = %e, "Scratch area unavailable, refusing to start");
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(JobOrchestrator::new(
        scratch,
        config.compressor_path.clone(),
        config.metrics_tool_path.clone(),
        config.tool_timeout(),
        config.tool_concurrency,
    ));
    report_tools(&config, &orchestrator).await;

    let cancel = CancellationToken::new();
    let retention = spawn_retention(&config, &orchestrator, cancel.clone());

    let app = build_app_router(AppState {
        config: config.clone(),
        orchestrator,
    });

    let host: IpAddr = config
        .host
        .parse()
        .unwrap_or_else(|e| panic!("HOST '{}' is not an IP address: {e}", config.host));
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Cannot bind {addr}: {e}"));
    tracing::info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server terminated with an error");
    }

    cancel.cancel();
    if let Some(handle) = retention {
        if tokio::time::timeout(BACKGROUND_STOP_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Artifact retention did not stop in time");
        }
    }
    tracing::info!("Shutdown complete");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Log where the tools are expected and warn when one cannot be launched.
/// The server still starts; `/health` keeps reporting the same status.
async fn report_tools(config: &ServerConfig, orchestrator: &JobOrchestrator) {
    let status = orchestrator.tool_status().await;
    tracing::info!(
        compressor = %config.compressor_path.display(),
        compressor_ok = status.compressor,
        metrics_tool = %config.metrics_tool_path.display(),
        metrics_tool_ok = status.metrics_tool,
        tool_timeout_secs = config.tool_timeout_secs,
        tool_concurrency = config.tool_concurrency,
        "Codec tools"
    );
    if !status.compressor {
        tracing::warn!(path = %config.compressor_path.display(), "Compressor missing or not executable");
    }
    if !status.metrics_tool {
        tracing::warn!(path = %config.metrics_tool_path.display(), "Metrics tool missing or not executable");
    }
}

fn spawn_retention(
    config: &ServerConfig,
    orchestrator: &JobOrchestrator,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let Some(ttl) = config.artifact_ttl() else {
        tracing::info!("ARTIFACT_TTL_SECS is 0, artifacts are never evicted");
        return None;
    };
    let public_root = orchestrator.scratch().public_root().to_path_buf();
    Some(tokio::spawn(artifact_retention::run(public_root, ttl, cancel)))
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("Interrupted, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
