//! `docchat serve`: start the web UI and HTTP API.

use docchat_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🤖 DocChat");
    println!("   Open:   http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:  {}", config.model);
    if !config.has_api_key() {
        println!("   ⚠️  No API key configured; sessions will report a connection error");
    }

    docchat_gateway::start(config).await?;

    Ok(())
}
