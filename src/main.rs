use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod coverage;
mod error;
mod explore;
mod loader;
mod models;
mod report;

use config::{DataSources, DEFAULT_COORDINATORS_PATH, DEFAULT_TOTALS_PATH};
use loader::{TableCache, DEFAULT_COORDINATOR_SHEET};

#[derive(Parser)]
#[command(name = "coordinator-coverage")]
#[command(about = "Coordinator allocation coverage by region and hub", long_about = None)]
struct Cli {
    /// Spreadsheet listing coordinator assignments
    #[arg(long, global = true, default_value = DEFAULT_COORDINATORS_PATH)]
    coordinators: PathBuf,

    /// Sheet of the coordinator spreadsheet to read
    #[arg(long, global = true, default_value = DEFAULT_COORDINATOR_SHEET)]
    sheet: String,

    /// Spreadsheet listing every school, hub and region
    #[arg(long, global = true, default_value = DEFAULT_TOTALS_PATH)]
    totals: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Share of schools with a coordinator
    Completion,
    /// Coverage by region
    Regions,
    /// Coverage by hub within a region
    Hubs {
        #[arg(long)]
        region: String,
    },
    /// Record counts by coordinator status for one hub
    HubStatus {
        #[arg(long)]
        region: String,
        #[arg(long)]
        hub: String,
    },
    /// School records of one hub with their coordinators
    Detail {
        #[arg(long)]
        region: String,
        #[arg(long)]
        hub: String,
        /// Also export the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a markdown drill-down report
    Report {
        #[arg(long)]
        region: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Interactive drill-down from region to hub
    Explore,
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let sources = DataSources {
        coordinators: cli.coordinators,
        sheet: cli.sheet,
        totals: cli.totals,
    };
    debug!(?sources, "data sources");

    let mut cache = TableCache::new();
    let json = cli.format == Format::Json;

    match cli.command {
        Commands::Completion => {
            let tables = sources.load(&mut cache)?;
            let value = coverage::completion_percentage(&tables.coordinators, &tables.totals);
            if json {
                print_json(&serde_json::json!({ "completion": value }))?;
            } else {
                println!("Coordinator allocation: {}", report::progress_bar(value));
                println!("(base: {})", sources.coordinators.display());
            }
        }
        Commands::Regions => {
            let tables = sources.load(&mut cache)?;
            let rows = coverage::summarize_regions(&tables.coordinators, &tables.totals)?;
            if json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("No regions found in the totals table.");
            } else {
                print!("{}", report::render_coverage("GRE", &rows));
            }
        }
        Commands::Hubs { region } => {
            let tables = sources.load(&mut cache)?;
            let rows = coverage::summarize_hubs(&tables.coordinators, &tables.totals, &region)?;
            if json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("No hubs found for region {region}.");
            } else {
                print!("{}", report::render_coverage("Hub", &rows));
            }
        }
        Commands::HubStatus { region, hub } => {
            let tables = sources.load(&mut cache)?;
            let status = coverage::hub_status(&tables.coordinators, &tables.totals, &region, &hub)?;
            if json {
                print_json(&report::HubStatusView::new(&status, &tables.totals.headers))?;
            } else {
                print!("{}", report::render_status(&status));
            }
        }
        Commands::Detail { region, hub, csv } => {
            let tables = sources.load(&mut cache)?;
            let details =
                coverage::school_details(&tables.coordinators, &tables.totals, &region, &hub)?;
            if json {
                print_json(&details.rows)?;
            } else {
                print!("{}", report::render_details(&details));
            }
            if let Some(path) = csv {
                report::write_details_csv(&path, &details)?;
                info!(path = %path.display(), rows = details.rows.len(), "exported detail table");
                eprintln!("Detail table written to {}.", path.display());
            }
        }
        Commands::Report { region, out } => {
            let tables = sources.load(&mut cache)?;
            let report = report::build_report(
                &tables.coordinators,
                &tables.totals,
                region.as_deref(),
                Local::now().date_naive(),
            )?;
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Explore => {
            let stdin = std::io::stdin();
            explore::run(&sources, &mut cache, stdin.lock(), std::io::stdout())?;
        }
    }

    Ok(())
}
