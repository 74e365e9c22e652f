use gateway_service::config::GatewayConfig;
use gateway_service::services::metrics::init_metrics;
use gateway_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let otlp_endpoint =
        std::env::var("OTLP_ENDPOINT").unwrap_or_else(|_| "http://tempo:4317".to_string());
    init_tracing("gateway-service", "info", &otlp_endpoint);
    init_metrics();

    let config = GatewayConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
