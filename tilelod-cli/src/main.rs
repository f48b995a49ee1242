//! TileLOD CLI - Command-line interface
//!
//! Renders single tiles through the level-of-detail engine and manages the
//! configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilelod::config::config_file_path;

use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilelod")]
#[command(version = tilelod::VERSION)]
#[command(about = "Render map tiles from a multi-resolution cache", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/tilelod/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one tile to an image file
    Render(RenderArgs),

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);
    match cli.command {
        Commands::Render(args) => commands::render::run(args, &config_path).await,
        Commands::Config { command } => commands::config::run(command, &config_path),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}
