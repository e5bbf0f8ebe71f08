//! Image I/O daemon binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use imageio_core::config::AppConfig;
use imageio_server::{AppState, Service, create_control_router, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// imageiod - ticket-authorized image I/O over a local socket
#[derive(Parser, Debug)]
#[command(name = "imageiod")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "IMAGEIO_CONFIG",
        default_value = "/etc/ovirt-imageio/daemon.toml"
    )]
    config: String,
}

fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("IMAGEIO_").split("__").ignore(&["CONFIG"]))
        .extract()
        .context("failed to load configuration")?;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
            tracing::info!("Received SIGINT");
        }
        _ = terminate.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }
    Ok(())
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

    tracing::info!("imageiod v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    imageio_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let state = AppState::new(config.clone());

    let local = Service::start(
        "local",
        &config.local.socket,
        config.local.socket_mode,
        create_router(state.clone()),
    )
    .with_context(|| format!("failed to start local service on {}", config.local.socket.display()))?;

    let control = if config.control.enabled {
        let service = Service::start(
            "control",
            &config.control.socket,
            config.control.socket_mode,
            create_control_router(state.clone()),
        );
        match service {
            Ok(service) => Some(service),
            Err(e) => {
                local.stop().await.ok();
                return Err(e).with_context(|| {
                    format!(
                        "failed to start control service on {}",
                        config.control.socket.display()
                    )
                });
            }
        }
    } else {
        tracing::warn!("Control service disabled, tickets cannot be registered");
        None
    };

    shutdown_signal().await?;
    tracing::info!("Shutting down");

    if let Some(control) = control {
        control.stop().await.context("control service failed")?;
    }
    local.stop().await.context("local service failed")?;

    Ok(())
}
