//! shelfd: light novel acquisition daemon

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shelfd::config::{Config, LogFormat, DEFAULT_CONFIG_FILE};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "shelfd")]
#[command(about = "Search, download and keep light novels up to date")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon and its HTTP API
    Serve {
        /// Listen address, overrides `http.listen_addr`
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Directory to write the config into
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Check the stored chapters of one source folder
    Check {
        /// Source folder containing meta.json
        novel_dir: PathBuf,

        /// Delete corrupted chapter files
        #[arg(long)]
        repair: bool,
    },
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.filter_directive(verbose)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_target(false).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `init` runs before any config exists
    if let Commands::Init { path } = &cli.command {
        init_logging(&Config::default(), cli.verbose)?;
        return commands::init::init_config(path);
    }

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Serve { listen } => commands::serve::serve(config, listen).await,
        Commands::Check { novel_dir, repair } => {
            commands::check::check_novel(&config, &novel_dir, repair)
        }
        Commands::Init { .. } => Ok(()),
    }
}
