mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fyx_core::FyxConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fyx")]
#[command(about = "Attention agent for browser focus sessions", long_about = None)]
struct Cli {
    /// Config file (defaults to the data directory's config.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSONL file of tab messages through the agent
    Replay {
        /// One message per line: {"tab": 1, "at": "...", "message": {...}}
        file: PathBuf,
        /// Skip the remote services and use fallbacks only
        #[arg(long)]
        offline: bool,
    },
    /// Score a single signal and show its classification
    Score {
        /// Signal JSON, e.g. '{"idleSeconds": 50, "visible": false}'
        json: String,
        /// Ambient camera state (focused, looking_away, absent, bored)
        #[arg(long)]
        camera: Option<String>,
    },
    /// Show the persisted intervention log
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 30)]
        limit: usize,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config_path = match cli.config_path {
        Some(path) => path,
        None => FyxConfig::default_path()?,
    };

    match cli.command {
        Commands::Replay { file, offline } => {
            let config = FyxConfig::load(&config_path)?;
            commands::replay::handle_replay_command(&config, &file, offline).await
        }
        Commands::Score { json, camera } => {
            commands::score::handle_score_command(&json, camera.as_deref())
        }
        Commands::History { limit } => {
            let config = FyxConfig::load(&config_path)?;
            commands::history::handle_history_command(&config, limit)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::handle_config_show(&config_path),
            ConfigAction::Init { force } => {
                commands::config::handle_config_init(&config_path, force)
            }
        },
    }
}
