use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};

use urban_intelligence_api::api::{RouterConfig, build_router};
use urban_intelligence_api::app::AppState;
use urban_intelligence_api::infra::{
    AppConfig, HttpAgentClient, NgsiLdBrokerClient, UpstreamConfig, init_logging,
    init_metrics_handle,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_logging(config.log_format, "info");

    let metrics = init_metrics_handle();
    if metrics.is_none() {
        warn!("Prometheus recorder not installed; /metrics will return 404");
    }

    let upstream = UpstreamConfig::default().with_timeout(config.upstream_timeout);
    let broker = NgsiLdBrokerClient::new(&config.context_broker_url, upstream.clone())
        .context("failed to create context broker client")?;
    let agents = HttpAgentClient::new(&config.agent_service_url, upstream)
        .context("failed to create agent service client")?;

    let app_state = AppState::new(
        Arc::new(broker),
        Arc::new(agents),
        config.api_auth_key.clone(),
    )
    .with_environment(config.environment)
    .with_metrics(metrics);

    let router = build_router(Arc::new(app_state), &RouterConfig::from(&config));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        address = %addr,
        environment = %config.environment,
        rate_limited = config.rate_limit.is_some(),
        "Server starting"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
