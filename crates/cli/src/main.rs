//! PitchScout CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `ask`      Answer one question
//! - `chat`     Interactive question session
//! - `serve`    Start the HTTP gateway and webhook
//! - `ingest`   Load pitch records into the vector store
//! - `doctor`   Diagnose config, provider and store

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pitchscout",
    about = "PitchScout — ask about 2022 WBC Team USA pitchers",
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
    /// Write a default configuration file
    Onboard,

    /// Answer a single question
    Ask {
        question: String,

        /// Conversation to continue
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Ask questions interactively, keeping conversation memory
    Chat {
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load a JSON Lines file of pitch records into the vector store
    Ingest {
        file: std::path::PathBuf,

        /// Add documents even if the collection is already populated
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and service reachability
    Doctor,
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
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Ask { question, user } => commands::ask::run(&question, &user).await?,
        Commands::Chat { user } => commands::chat::run(&user).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ingest { file, force } => commands::ingest::run(&file, force).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
