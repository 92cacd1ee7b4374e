use dotenvy::dotenv;
use portal_frontend::config::get_configuration;
use portal_frontend::services::GoTrueClient;
use portal_frontend::startup::build_router;
use portal_frontend::AppState;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "portal-frontend",
        &configuration.server.log_level,
        configuration.server.otlp_endpoint.as_deref(),
    )?;

    portal_frontend::services::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let provider = Arc::new(GoTrueClient::new(configuration.provider.clone())?);
    info!(provider = %provider.base_url(), "Identity provider client ready");

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let app = build_router(AppState::new(provider, configuration));

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting portal-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
