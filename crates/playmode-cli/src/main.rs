use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod dispatch;
mod metadata;
mod render;

const LOG_ENV: &str = "PLAYMODE_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser, Debug)]
#[command(name = "playmode")]
#[command(about = "Switch a game installation between mod play modes", long_about = None)]
struct Cli {
    /// Config file; defaults to $PLAYMODE_CONFIG or the per-user config path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,
    #[arg(long, global = true)]
    documents_root: Option<PathBuf>,
    /// Manifest file path or http(s) URL.
    #[arg(long, global = true)]
    manifest: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    List {
        /// Only show modes whose artifacts are already cached.
        #[arg(long)]
        offline: bool,
    },
    Status,
    Switch {
        mode: String,
        /// Refuse to switch unless every artifact is already cached.
        #[arg(long)]
        offline: bool,
    },
    ClearCache,
    Gc,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    dispatch::run_cli(cli)
}
