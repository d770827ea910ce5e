//! abwright CLI, the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `serve`    Start the HTTP gateway
//! - `assign`   Run one assignment and print it as JSON
//! - `catalog`  Print the merged experiment catalog

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "abwright",
    about = "abwright - cookie-persisted A/B experiment assignment",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.abwright/config.toml)
    #[arg(short, long, global = true, env = "ABWRIGHT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Assign a single request and print the result
    Assign(commands::assign::AssignArgs),

    /// Print the merged experiment catalog
    Catalog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config).await?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Assign(args) => commands::assign::run(config, args).await?,
        Commands::Catalog => commands::catalog::run(config).await?,
    }

    Ok(())
}
