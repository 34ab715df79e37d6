use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context as _;
use tokio::net::TcpListener;

use chatgate_api::{AppServices, GatewayConfig, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("CHATGATE_CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chatgate.toml"));

    let config = GatewayConfig::load(Some(&config_path)).context("failed to load configuration")?;

    chatgate_observability::init(config.log_format);

    if config.uses_default_secret() {
        tracing::warn!("jwt_secret not set; using insecure dev default");
    }

    let services =
        AppServices::from_config(&config, None).context("failed to build upstream client")?;
    let audit = services.pipeline.audit().clone();
    let app = build_app(services);

    let address = config.bind_addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    let drained = audit.shutdown(config.audit_grace_period()).await;
    tracing::info!(drained, "shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
