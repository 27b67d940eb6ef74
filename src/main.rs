mod analysis;
mod auth;
mod cli;
mod error;
mod insights;
mod models;
mod output;
mod providers;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    info!("Starting prlens - organization PR onboarding analysis");
    cli.execute().await?;

    Ok(())
}
