//! `docchat status`: show configuration and connectivity.

use docchat_agent::{Connectivity, SessionFactory};
use docchat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🤖 DocChat Status");
    println!("=================");
    println!("  Config file:  {}", AppConfig::config_path().display());
    println!("  API URL:      {}", config.api_url);
    println!("  Model:        {}", config.model);
    println!("  Temperature:  {}", config.temperature);
    println!("  Max tokens:   {}", config.max_output_tokens);
    println!(
        "  Upload limit: {}",
        docchat_core::format_file_size(config.uploads.max_file_bytes)
    );
    println!("  Retention:    {} hours (remote)", config.uploads.retention_hours);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  API key:      {}",
        if config.has_api_key() { "set" } else { "missing" }
    );

    match SessionFactory::from_config(&config).new_session().connectivity() {
        Connectivity::Connected => println!("\n  ✅ Gemini client ready"),
        Connectivity::Disconnected { reason } => println!("\n  ❌ {reason}"),
    }

    if !AppConfig::config_path().exists() {
        println!("  ⚠️  No config file; run `docchat init` first");
    }

    Ok(())
}
