mod config;
mod error;
mod markup;
mod models;
mod periods;
mod providers;
mod report;
mod service;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use config::{ensure_initialized, load_config, Overrides};
use error::AppError;
use markup::MarkupFactor;
use periods::ReportPeriods;
use providers::aws::AwsCostExplorer;
use service::ReportService;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "aws-cost-report")]
#[command(about = "Previous-month and month-to-date AWS cost report")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Report options used when no subcommand is given
    #[command(flatten)]
    report: ReportArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the default config file
    Init,
    /// Fetch and print the cost report (the default)
    Report(ReportArgs),
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Markup (positive) or discount (negative) percentage
    #[arg(long, env = "AWS_MARGIN", allow_hyphen_values = true)]
    margin: Option<String>,
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
    /// DAILY or MONTHLY
    #[arg(long)]
    granularity: Option<String>,
    /// Metric to request; the first one is reported
    #[arg(long = "metric")]
    metrics: Vec<String>,
    /// none, a dimension such as SERVICE, tag:<key> or cost-category:<key>
    #[arg(long)]
    group_by: Option<String>,
    /// Reference date (YYYY-MM-DD) instead of today
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,
}

fn parse_as_of(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input.trim(), models::API_DATE_FORMAT)
        .map_err(|_| format!("Invalid date '{input}'. Use YYYY-MM-DD."))
}

fn init_logging(quiet: bool) {
    let filter = if quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aws_cost_report=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        margin,
        region,
        granularity,
        metrics,
        group_by,
        as_of,
    } = args;

    let mut cfg = load_config()?;
    cfg.apply_overrides(Overrides {
        region,
        granularity,
        metrics,
        group_by,
    })?;
    cfg.validate()?;

    let markup = MarkupFactor::from_setting(margin.as_deref());
    info!(percent = markup.percent(), "markup configured");

    let today = as_of.unwrap_or_else(|| Local::now().date_naive());
    info!(reference_date = %today, "report reference date");
    let periods = ReportPeriods::from_date(today)
        .ok_or_else(|| AppError::Config(format!("Reference date {today} is out of range.")))?;

    let source = AwsCostExplorer::connect(&cfg).await?;
    let svc = ReportService::new(source, cfg, markup);
    let mut stdout = std::io::stdout().lock();
    let summary = svc.run(&periods, &mut stdout).await?;
    info!(
        rendered = summary.rendered.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped.len(),
        "report complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match cli.command {
        Some(Commands::Init) => {
            let path = ensure_initialized()?;
            println!("Initialized {} config at {}", config::APP_NAME, path.display());
        }
        Some(Commands::Report(args)) => run_report(args).await?,
        None => run_report(cli.report).await?,
    }

    Ok(())
}
