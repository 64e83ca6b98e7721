//! Delve CLI - the main entry point.
//!
//! Commands:
//! - `chat`     - Interactive research session or single-query mode
//! - `example`  - Run a scripted demo session
//! - `serve`    - Start the HTTP task API
//! - `onboard`  - Write the default config

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "delve",
    about = "Delve: conversational research assistant",
    version,
    author
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
    /// Research interactively, keeping conversation context
    Chat {
        /// Answer a single query instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run three example queries end to end
    Example,

    /// Start the HTTP research task API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize configuration
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message } => commands::chat::run(message, cli.verbose).await?,
        Commands::Example => commands::example::run(cli.verbose).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
