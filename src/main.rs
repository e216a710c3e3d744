use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cleo::config::CleoConfig;

#[derive(Parser)]
#[command(name = "cleo", version, about = "Discord chat bot backed by an OpenAI-compatible completion API")]
struct Cli {
    /// Config file (defaults to ~/.cleo/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to Discord and start answering messages
    Serve,
    /// Show the stored conversation context of a channel
    Context {
        /// Discord channel id
        channel: String,
        /// Include expired messages
        #[arg(long)]
        all: bool,
    },
    /// Show the notes kept about a user
    Notes {
        /// Discord user id
        user: String,
    },
    /// Check configuration and storage
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CleoConfig::load_from(path)?,
        None => CleoConfig::load()?,
    };

    // Logs go to stderr so command output on stdout stays clean.
    cleo::logging::init_tracing(&config.logging);

    match cli.command {
        Command::Serve => {
            let state = cleo::state::setup_shared_state(config)?;
            cleo::bot::run(state).await?;
        }
        Command::Context { channel, all } => {
            cleo::cli::context::show_context(&config, &channel, all)?;
        }
        Command::Notes { user } => {
            cleo::cli::notes::show_notes(&config, &user).await;
        }
        Command::Doctor => {
            cleo::cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
