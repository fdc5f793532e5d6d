//! forge - conversational assistant for the terminal
//!
//! Wraps an OpenAI-compatible chat endpoint with chat memory, file context
//! (text, SQLite and anything line-readable) and an optional mode that writes
//! returned code back into the files it came from.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod ai;
mod cli;
mod config;
mod core;
mod engine;
mod error;
mod ui;

/// forge - a conversational assistant with file context
#[derive(Parser)]
#[command(name = "forge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with a model about your files, and let it edit them", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(flatten)]
    engine: cli::EngineArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// Initial prompt
        prompt: Option<String>,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,
    },

    /// Check that the API key is accepted
    Probe,

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so replies stay pipeable
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("forge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Chat { prompt }) => {
            cli::chat::run(config, cli.engine, prompt).await?;
        }
        Some(Commands::Ask { question }) => {
            cli::ask::run(config, cli.engine, &question).await?;
        }
        Some(Commands::Probe) => {
            cli::probe::run(config, cli.engine).await?;
        }
        Some(Commands::Config { show, init }) => {
            if init {
                config::init_config()?;
            } else if show {
                config::show_config(&config)?;
            }
        }
        None => {
            // Default: Start interactive chat
            cli::chat::run(config, cli.engine, None).await?;
        }
    }

    Ok(())
}
