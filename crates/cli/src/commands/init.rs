//! `docchat init`: write a starter config file.

use docchat_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("🤖 DocChat Setup");
    println!("================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("  Config file exists: {}", config_path.display());
        println!("  (use --force to overwrite)");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Wrote {}", config_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Set `api_key` in the config file, or export GEMINI_API_KEY");
    println!("  2. Run `docchat serve` and open the printed address");
    println!("     or `docchat chat --file report.pdf` for the terminal");

    Ok(())
}
