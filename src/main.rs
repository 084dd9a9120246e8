use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use boards::config::BoardsConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "boards")]
#[command(version, about = "Inspect kanban board snapshots")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a boards.toml. Defaults to ./boards.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute and print a view of a board snapshot
    View {
        /// JSON file holding an array of blocks
        snapshot: PathBuf,

        /// Board to show (required when the snapshot holds several)
        #[arg(long)]
        board: Option<String>,

        /// View to show (defaults to the board's first view)
        #[arg(long)]
        view: Option<String>,

        /// Only show cards whose title contains this text
        #[arg(long)]
        search: Option<String>,

        /// Print the derived view as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// List configuration warnings
    Validate,
    /// Write a default boards.toml to the working directory
    Init,
}

fn init_logging(config: &BoardsConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.toml.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BoardsConfig::resolve(cli.config.as_deref(), cli.verbose)?;
    init_logging(&config);

    match &cli.command {
        Commands::View {
            snapshot,
            board,
            view,
            search,
            json,
        } => {
            let args = cmd::ViewArgs {
                snapshot: snapshot.clone(),
                board: board.clone(),
                view: view.clone(),
                search: search.clone(),
                json: *json,
            };
            cmd::cmd_view(&config, args).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
