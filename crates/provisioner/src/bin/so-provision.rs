//! so-provision - provisions Linear phase-projects for sales orders.
//!
//! # Environment Variables
//!
//! - `LINEAR_API_KEY` - Linear API key (required for `run` and `teardown`)
//! - `LINEAR_TEAM_ID` - Team owning the created projects (required for `run`)
//! - `LINEAR_API_URL` - GraphQL endpoint override
//! - `RUST_LOG` - Log filter (default `info`)
//!
//! A `.env` file in the working directory is loaded first.
//!
//! # Examples
//!
//! ```bash
//! # Provision two orders with the default pipeline
//! so-provision run --order SO109616 --order SO109617
//!
//! # Show what a job file would schedule
//! so-provision plan --config provision.yaml --base-date 2025-01-15
//!
//! # Remove everything created for an order
//! so-provision teardown --order SO109616
//! ```

#![allow(clippy::disallowed_macros)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use linear::LinearClient;
use provisioner::config::{required, API_KEY_VAR};
use provisioner::{
    plan, teardown, Credentials, DryRun, JobConfig, Provisioner, RunReport, TeardownEntry,
    TeardownOutcome,
};

/// Provision Linear phase-projects for sales orders.
#[derive(Parser)]
#[command(name = "so-provision")]
#[command(about = "Provision Linear phase-projects for sales orders from templates")]
#[command(version)]
struct Cli {
    /// Linear API key (or set `LINEAR_API_KEY`)
    #[arg(long, env = "LINEAR_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Team owning the created projects (or set `LINEAR_TEAM_ID`)
    #[arg(long, env = "LINEAR_TEAM_ID", global = true)]
    team_id: Option<String>,

    /// GraphQL endpoint (or set `LINEAR_API_URL`)
    #[arg(long, env = "LINEAR_API_URL", global = true)]
    api_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args)]
struct JobArgs {
    /// YAML job file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Sales order to process; repeat for several, overrides the job file
    #[arg(long = "order", short = 'o')]
    orders: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create projects, issues, relations and links for each order
    Run {
        #[command(flatten)]
        job: JobArgs,

        /// Base date of the first order (YYYY-MM-DD, default today)
        #[arg(long)]
        base_date: Option<NaiveDate>,

        /// Read from Linear but log writes instead of performing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete (or archive) every phase-project of each order
    Teardown {
        #[command(flatten)]
        job: JobArgs,

        /// Look the projects up but do not remove them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the date windows a run would use
    Plan {
        #[command(flatten)]
        job: JobArgs,

        /// Base date of the first order (YYYY-MM-DD, default today)
        #[arg(long)]
        base_date: Option<NaiveDate>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn load_job(args: &JobArgs) -> Result<JobConfig> {
    let mut config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };
    config.select_orders(&args.orders)?;
    config.require_orders()?;
    Ok(config)
}

fn linear_client(api_key: &str, api_url: Option<&str>, config: &JobConfig) -> Result<LinearClient> {
    let client = match api_url {
        Some(url) => LinearClient::with_url(api_key, url),
        None => LinearClient::new(api_key),
    }
    .context("Failed to create Linear client")?;
    Ok(client.with_call_delay(Duration::from_millis(config.call_delay_ms)))
}

fn resolve_base_date(flag: Option<NaiveDate>, config: &JobConfig) -> NaiveDate {
    flag.or(config.base_date)
        .unwrap_or_else(|| Utc::now().date_naive())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Run {
            job,
            base_date,
            dry_run,
        } => {
            let config = load_job(&job)?;
            let credentials = Credentials::resolve(cli.api_key, cli.team_id)?;
            let client = linear_client(&credentials.api_key, cli.api_url.as_deref(), &config)?;
            let base_date = resolve_base_date(base_date, &config);

            let report = if dry_run {
                let dir = DryRun::new(client);
                let report = Provisioner::new(&dir, &config, &credentials.team_id, base_date)
                    .run()
                    .await?;
                info!(suppressed = dir.suppressed(), "Dry run complete, nothing was written");
                report
            } else {
                Provisioner::new(&client, &config, &credentials.team_id, base_date)
                    .run()
                    .await?
            };
            print_run_report(&report);
        }

        Commands::Teardown { job, dry_run } => {
            let config = load_job(&job)?;
            let api_key = required(API_KEY_VAR, cli.api_key)?;
            let client = linear_client(&api_key, cli.api_url.as_deref(), &config)?;

            let entries = teardown(&client, &config.sales_orders, &config.phases, dry_run).await;
            print_teardown(&entries);

            let failed = entries
                .iter()
                .filter(|e| e.outcome == TeardownOutcome::Failed)
                .count();
            if failed > 0 {
                warn!(failed, "Some projects could not be removed");
            }
        }

        Commands::Plan { job, base_date } => {
            let config = load_job(&job)?;
            let base_date = resolve_base_date(base_date, &config);
            let plan = plan(&config, base_date)?;

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("Project").fg(Color::Cyan),
                Cell::new("Start").fg(Color::Cyan),
                Cell::new("Target").fg(Color::Cyan),
            ]);
            for (order, windows) in &plan {
                for phase in windows {
                    table.add_row(vec![
                        Cell::new(format!("{} {}", order.id, phase.phase)),
                        Cell::new(phase.window.start),
                        Cell::new(phase.window.end),
                    ]);
                }
            }
            println!("{table}");
        }
    }

    Ok(())
}

fn print_run_report(report: &RunReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Order").fg(Color::Cyan),
        Cell::new("Projects").fg(Color::Cyan),
        Cell::new("Issues").fg(Color::Cyan),
        Cell::new("Relations").fg(Color::Cyan),
        Cell::new("Links").fg(Color::Cyan),
    ]);

    for order in &report.orders {
        let projects = format!(
            "{} new, {} existing, {} failed",
            order.projects_created, order.projects_existing, order.projects_failed
        );
        let issues = format!(
            "{} new, {} existing, {} failed",
            order.issues_created, order.issues_existing, order.issues_failed
        );
        let relations = format!(
            "{} new, {} existing, {} failed",
            order.relations.created, order.relations.skipped, order.relations.failed
        );
        table.add_row(vec![
            Cell::new(&order.order),
            Cell::new(projects),
            Cell::new(issues),
            Cell::new(relations),
            Cell::new(order.links.len()),
        ]);
    }

    println!("{table}");
}

fn print_teardown(entries: &[TeardownEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Project").fg(Color::Cyan),
        Cell::new("Outcome").fg(Color::Cyan),
    ]);

    for entry in entries {
        let (label, color) = match entry.outcome {
            TeardownOutcome::Deleted => ("deleted", Color::Green),
            TeardownOutcome::Archived => ("archived", Color::Yellow),
            TeardownOutcome::Missing => ("missing", Color::DarkGrey),
            TeardownOutcome::WouldDelete => ("would delete", Color::Blue),
            TeardownOutcome::Failed => ("failed", Color::Red),
        };
        table.add_row(vec![Cell::new(&entry.project), Cell::new(label).fg(color)]);
    }

    println!("{table}");
}
