//! Loopwright CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive or single-message agent session
//! - `config`: Show, locate, initialise or validate the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "loopwright",
    about = "Loopwright: a streaming, tool-using coding agent",
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
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured model
        #[arg(long)]
        model: Option<String>,

        /// Directory the tools are confined to
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// File to attach to the first message (noted, not uploaded)
        #[arg(long = "attach", value_name = "FILE")]
        attachments: Vec<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
    /// Load and validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            model,
            workspace,
            attachments,
        } => commands::chat::run(message, model, workspace, attachments).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
