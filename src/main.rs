//! lanscan - LAN host discovery and TCP port scanning.

use clap::Parser;
use lanscan::cli::{Cli, Commands};
use lanscan::output;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Settings(cmd) if cmd.reset => cmd.reset(cli.config.as_deref()),
        Commands::Settings(cmd) => cmd.show(&cli.load_settings()?),
        Commands::Scan(cmd) => cmd.execute(&cli.load_settings()?).await,
        Commands::Discover(cmd) => cmd.execute(&cli.load_settings()?).await,
    }
}
