use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agent_board::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "agent-board")]
#[command(version, about = "Kanban board for remote cloud coding agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format: text or json
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to config.toml (defaults to .agent-board/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the local state file (column order, drafts)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the board server and poller
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind all interfaces)
        #[arg(long)]
        dev: bool,

        /// Open the board in a browser once listening
        #[arg(long)]
        open: bool,
    },
    /// Poll once and print the board
    Board,
    /// Show or change the column order
    Columns {
        #[command(subcommand)]
        command: Option<ColumnsCommands>,
    },
    /// Manage local drafts
    Drafts {
        #[command(subcommand)]
        command: Option<DraftsCommands>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ColumnsCommands {
    /// Show columns in display order
    Show,
    /// Move a column to a new position (0-based)
    Move { column: String, index: usize },
    /// Restore the default order
    Reset,
}

#[derive(Subcommand, Clone)]
pub enum DraftsCommands {
    /// List drafts
    List,
    /// Save a new draft
    Add {
        /// Repository URL (defaults to the last one used)
        #[arg(long)]
        repository: Option<String>,
        /// Branch or ref to start from
        #[arg(long = "ref", default_value = "main")]
        git_ref: String,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Delete a draft
    Remove { id: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default config.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Serve { port, dev, open } => {
            let config = cmd::load_config(&cli, &project_dir)?.with_port(*port);
            cmd::cmd_serve(&config, *dev, *open).await?;
        }
        Commands::Board => {
            let config = cmd::load_config(&cli, &project_dir)?;
            cmd::cmd_board(&config).await?;
        }
        Commands::Columns { command } => {
            let config = cmd::load_config(&cli, &project_dir)?;
            cmd::cmd_columns(&config, command.clone())?;
        }
        Commands::Drafts { command } => {
            let config = cmd::load_config(&cli, &project_dir)?;
            cmd::cmd_drafts(&config, command.clone())?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), command.clone())?;
        }
    }

    Ok(())
}
