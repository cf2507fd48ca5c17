use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queuewarden::api::create_router;
use queuewarden::state::AppState;
use queuewarden_core::{
    config::{LogFormat, LoggingConfig, ProberConfig},
    load_config, validate_config, Backend, Config, ContentFilter, FfprobeProber,
    HttpConnectivity, MediaProber, QBittorrentClient, ReconciliationCycle, Scheduler,
    SchedulerConfig, ServarrClient, TorrentClient,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging is not initialized yet when the config is unreadable.
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("QUEUEWARDEN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config.logging);
    info!(version = VERSION, path = ?config_path, "Configuration loaded");

    let client: Arc<dyn TorrentClient> = Arc::new(
        QBittorrentClient::new(config.qbittorrent.clone())
            .context("Failed to create qBittorrent client")?,
    );
    info!(url = %config.qbittorrent.url, "Using qBittorrent");

    let backends = build_backends(&config)?;

    let prober = build_prober(&config.prober).await;
    let filter = Arc::new(
        ContentFilter::new(&config.filter, prober).context("Invalid content filter")?,
    );

    let cycle = ReconciliationCycle::new(client, backends, filter, config.settings.clone());
    let connectivity = Arc::new(
        HttpConnectivity::new(config.settings.ping_urls.clone())
            .context("Failed to create connectivity checker")?,
    );
    let scheduler = Arc::new(Scheduler::new(
        cycle,
        connectivity,
        SchedulerConfig::from(&config.settings),
    ));
    let loop_handle = scheduler.start();

    if config.server.enabled {
        let state = Arc::new(AppState::new(config.clone(), Arc::clone(&scheduler)));
        let app = create_router(state);

        let addr = SocketAddr::new(config.server.host, config.server.port);
        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;
    } else {
        shutdown_signal().await;
    }

    info!("Shutting down...");
    scheduler.stop();
    if let Some(handle) = loop_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Reconciliation loop ended abnormally");
        }
    }
    info!("Shutdown complete");

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// One backend per managed entry. Every completed folder must already exist.
fn build_backends(config: &Config) -> Result<Vec<Backend>> {
    let completed_root = &config.settings.completed_download_folder;
    let mut backends = Vec::new();

    for backend_config in &config.backends {
        if !backend_config.managed {
            info!(backend = %backend_config.name, "Backend not managed, skipping");
            continue;
        }

        let folder = completed_root.join(&backend_config.category);
        if !folder.is_dir() {
            bail!(
                "Completed folder {:?} for backend '{}' does not exist",
                folder,
                backend_config.name
            );
        }

        let manager = ServarrClient::new(backend_config)
            .with_context(|| format!("Failed to create client for '{}'", backend_config.name))?;
        info!(
            backend = %backend_config.name,
            kind = backend_config.kind.as_str(),
            category = %backend_config.category,
            url = %backend_config.url,
            "Backend initialized"
        );
        backends.push(Backend::new(
            backend_config.clone(),
            Arc::new(manager),
            completed_root,
        ));
    }

    if backends.is_empty() {
        warn!("No managed backends configured, only the failed category will be handled");
    }
    Ok(backends)
}

/// The prober is optional: without it, on-disk files are judged by name only.
async fn build_prober(config: &ProberConfig) -> Option<Arc<dyn MediaProber>> {
    if !config.enabled {
        info!("Media prober disabled");
        return None;
    }

    let prober = FfprobeProber::new(config.clone());
    match prober.validate().await {
        Ok(()) => {
            info!(path = ?config.ffprobe_path, "Using ffprobe for media validation");
            Some(Arc::new(prober) as Arc<dyn MediaProber>)
        }
        Err(e) => {
            error!(error = %e, "ffprobe unavailable, media validation disabled");
            None
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
