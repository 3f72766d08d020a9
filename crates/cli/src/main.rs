//! DocChat CLI: the main entry point.
//!
//! Commands:
//! - `init`    Write a starter config file
//! - `serve`   Start the web UI and HTTP API
//! - `chat`    Interactive terminal chat, or a one-shot question
//! - `status`  Show configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docchat",
    about = "DocChat: ask a Gemini model questions about your documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the web UI and HTTP API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat about documents in the terminal
    Chat {
        /// Upload these files (and select them) before chatting
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Ask a single question and exit instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration and connectivity
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { files, message } => commands::chat::run(files, message).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
