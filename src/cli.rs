use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;

use crate::analysis::{analyze, AnalysisOptions};
use crate::auth::Token;
use crate::output;
use crate::providers::github::{ClientConfig, CollectOptions, GitHubProvider};

#[derive(Parser)]
#[command(name = "prlens")]
#[command(author, version, about = "Time from joining an organization to first and tenth PR", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for CSV, JSON and chart output
    #[arg(short, long, global = true, default_value = "output")]
    output_dir: PathBuf,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a GitHub organization
    Github {
        /// GitHub API token
        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// GitHub API URL
        #[arg(short, long, default_value = "https://api.github.com")]
        url: String,

        /// Organization login
        #[arg(short = 'O', long, env = "GITHUB_ORG")]
        org: String,

        /// Only members who joined on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Only members who joined on or before this date (YYYY-MM-DD); later PRs are ignored
        #[arg(long)]
        until: Option<NaiveDate>,

        /// Members fetched concurrently
        #[arg(short, long, default_value_t = 5)]
        concurrency: usize,

        /// Maximum number of PRs fetched per member
        #[arg(long)]
        max_prs: Option<usize>,

        /// Cohort period length in months
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=12))]
        cohort_months: u32,

        /// HTTP request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Retries for failed requests
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Github {
                token,
                url,
                org,
                since,
                until,
                concurrency,
                max_prs,
                cohort_months,
                timeout,
                max_retries,
            } => {
                info!("Collecting PR history for organization: {org}");

                let config = ClientConfig {
                    timeout: Duration::from_secs(*timeout),
                    max_retries: *max_retries,
                    ..ClientConfig::default()
                };
                let token = Token::from_optional(token.as_deref());
                let provider = GitHubProvider::new(url, org.clone(), token, config)?;

                let collect_options = CollectOptions {
                    since: *since,
                    until: *until,
                    concurrency: *concurrency,
                    max_prs: *max_prs,
                };
                let snapshot = provider.collect_snapshot(&collect_options).await?;

                let report = analyze(
                    &snapshot,
                    &AnalysisOptions {
                        cohort_months: *cohort_months,
                    },
                )?;

                let files = output::write_all(&report, &self.output_dir, self.pretty)?;
                output::print_summary(&report, &files);

                Ok(())
            }
        }
    }
}
