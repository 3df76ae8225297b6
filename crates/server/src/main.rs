//! quotagate server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use quotagate_core::config::AppConfig;
use quotagate_server::bootstrap::{prepare_index, wait_for_build};
use quotagate_server::{AppState, create_router, publish};
use std::future::IntoFuture;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// quotagate - token verification server
#[derive(Parser, Debug)]
#[command(name = "quotagated")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "QUOTAGATE_CONFIG",
        default_value = "config/quotagate.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("quotagate v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    quotagate_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let index = quotagate_index::from_config(&config.index)
        .await
        .context("failed to initialize index store")?;
    index
        .health_check()
        .await
        .context("index store health check failed")?;
    tracing::info!(backend = index.backend_name(), "Index store initialized");

    let quotas = config.quota.to_table().context("invalid quota table")?;
    let publisher =
        publish::from_config(&config.publish).context("failed to initialize publisher")?;

    let shutdown = CancellationToken::new();
    let build = prepare_index(index.clone(), &config.build, shutdown.child_token()).await?;

    let state = AppState::new(config.clone(), index, quotas, publisher, shutdown.clone());
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown));

    tokio::select! {
        result = server.into_future() => result.context("server error")?,
        Err(e) = wait_for_build(build) => return Err(e),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Load configuration from defaults, an optional TOML file, and `QUOTAGATE_*` variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    figment
        .merge(Env::prefixed("QUOTAGATE_").split("__"))
        .extract()
        .context("failed to load configuration")
}

/// Resolve on Ctrl-C or SIGTERM, then cancel in-flight work.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
