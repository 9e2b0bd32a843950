use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(version, about = "Workorder lifecycle engine for river maintenance")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding sluice.toml and the database (defaults to cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database under the project directory
    Init,
    /// Run the API server with the background escalation sweep
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Permissive CORS for local UI development
        #[arg(long)]
        dev: bool,
    },
    /// Run a single escalation sweep and print the report
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = sluice::config::SluiceConfig::load(&dir)?;

    match cli.command {
        Commands::Init => cmd::init::run(&dir, config),
        Commands::Serve { port, dev } => cmd::serve::run(&dir, config, port, dev).await,
        Commands::Sweep => cmd::sweep::run(&dir, config).await,
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_filter = if verbose { "sluice=debug,info" } else { "sluice=info,warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
