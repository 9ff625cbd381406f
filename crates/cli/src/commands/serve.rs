//! `devpilot serve`: start the HTTP API server.

use devpilot_config::AppConfig;
use tracing::warn;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        warn!("No model API key configured; chat requests will fail with 503");
    }

    println!("DevPilot API");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Backend:   {}{}", config.backend.base_url, config.backend.api_prefix);
    println!("   Model:     {} ({})", config.default_model, config.default_provider);

    devpilot_gateway::start(config).await?;

    Ok(())
}
