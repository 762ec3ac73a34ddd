use analytics::{AnalyticsEngine, CashSnapshot, DayWindow, KpiReport};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use configuration::{ConfigArgs, Settings};
use core_types::{CompanyUnit, DatasetKind};
use database::{FinanceRepository, SeedOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// The main entry point for the Finsight application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if there is one
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let settings = configuration::load_settings_from(&cli.config.config, |key| std::env::var(key).ok())?;
    let _guard = configuration::init_tracing(&settings.logging, cli.config.debug || settings.api.debug)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Api => api_server::run_server(&settings).await,
        Commands::Dashboard => dashboard::run_dashboard(&settings).await,
        Commands::Seed(args) => handle_seed(args, &settings).await,
        Commands::Import(args) => handle_import(args, &settings).await,
        Commands::Export(args) => handle_export(args, &settings).await,
        Commands::Report(args) => handle_report(args, &settings).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Financial KPI API, reporting dashboard and data tools.
#[derive(Parser)]
#[command(name = "finsight", author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the financial API.
    Api,
    /// Serve the reporting dashboard.
    Dashboard,
    /// Generate sample data into an empty store.
    Seed(SeedArgs),
    /// Load periods, budgets or cash flows from a CSV file.
    Import(ImportArgs),
    /// Write periods, budgets or cash flows as CSV.
    Export(ExportArgs),
    /// Print the KPIs of a business unit.
    Report(ReportArgs),
}

#[derive(Parser)]
struct SeedArgs {
    /// Months of history to generate (defaults to `seed.months`).
    #[arg(long)]
    months: Option<u32>,

    /// Seed of the random generator (defaults to `seed.rng_seed`).
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct ImportArgs {
    /// Dataset in the file: periods, budgets or cash-flows.
    #[arg(long)]
    kind: DatasetKind,

    #[arg(long)]
    file: PathBuf,
}

#[derive(Parser)]
struct ExportArgs {
    /// Dataset to export: periods, budgets or cash-flows.
    #[arg(long)]
    kind: DatasetKind,

    /// Only rows of this business unit.
    #[arg(long)]
    unit: Option<CompanyUnit>,

    /// Output file. Standard output when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct ReportArgs {
    #[arg(long, default_value = "consolidated")]
    unit: CompanyUnit,

    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=24))]
    months: u32,

    /// Day the window ends on (format: YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Connects to the configured store and applies pending migrations.
async fn open_repository(settings: &Settings) -> anyhow::Result<FinanceRepository> {
    let pool = database::connect(&settings.database.url, settings.database.max_connections).await?;
    database::run_migrations(&pool).await?;
    Ok(FinanceRepository::new(pool))
}

async fn handle_seed(args: SeedArgs, settings: &Settings) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let months = args.months.unwrap_or(settings.seed.months);
    let rng_seed = args.seed.unwrap_or(settings.seed.rng_seed);

    let today = Utc::now().date_naive();
    match database::generate_sample_data(&repo, months, rng_seed, today).await? {
        SeedOutcome::Generated { periods } => {
            println!("Generated {periods} financial periods ({months} months, seed {rng_seed}).")
        }
        SeedOutcome::Skipped { existing } => {
            println!("Store already holds {existing} periods; nothing generated.")
        }
    }
    Ok(())
}

async fn handle_import(args: ImportArgs, settings: &Settings) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let reader = BufReader::new(File::open(&args.file)?);

    // Set up the progress bar; its length is known once the file is parsed
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message(format!("Importing {}", args.kind.as_str()));

    let summary = database::import_csv_with_progress(&repo, args.kind, reader, |done, total| {
        progress_bar.set_length(total as u64);
        progress_bar.set_position(done as u64);
    })
    .await?;
    progress_bar.finish_with_message("Import complete!");

    println!("Imported {} rows from {}.", summary.imported, args.file.display());
    for rejected in &summary.rejected {
        eprintln!("  line {}: {}", rejected.line, rejected.error);
    }
    if !summary.rejected.is_empty() {
        eprintln!("{} rows were rejected.", summary.rejected.len());
    }
    Ok(())
}

async fn handle_export(args: ExportArgs, settings: &Settings) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let writer: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    let rows = database::export_csv(&repo, args.kind, args.unit, writer).await?;
    if let Some(path) = &args.out {
        println!("Wrote {rows} {} rows to {}.", args.kind.as_str(), path.display());
    }
    Ok(())
}

async fn handle_report(args: ReportArgs, settings: &Settings) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let window = DayWindow::trailing_months(as_of, args.months)?;

    let current = repo.periods_between(args.unit, window.start, window.end).await?;
    let previous = repo.periods_in_range(args.unit, window.previous_start, window.start).await?;
    let before_start = window.start.pred_opt().unwrap_or(window.start);
    let cash = CashSnapshot {
        current: repo.latest_cash_balance(args.unit, window.end).await?,
        previous: repo.latest_cash_balance(args.unit, before_start).await?,
    };

    let report = AnalyticsEngine::new().kpis(&current, &previous, cash, window.start, window.end)?;
    println!("{} | {} to {}", args.unit.label(), report.period_start, report.period_end);
    println!("{}", kpi_table(&report));
    Ok(())
}

fn kpi_table(report: &KpiReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value", "Change"]);
    table.add_row(vec![
        Cell::new("Total Revenue"),
        Cell::new(report.total_revenue),
        Cell::new(format!("{}%", report.revenue_growth_pct)),
    ]);
    table.add_row(vec![
        Cell::new("Net Profit"),
        Cell::new(report.total_profit),
        Cell::new(format!("{}%", report.profit_growth_pct)),
    ]);
    table.add_row(vec![
        Cell::new("Net Margin"),
        Cell::new(format!("{}%", report.net_margin_pct)),
        Cell::new(format!("{}pp", report.margin_change_pp)),
    ]);
    table.add_row(vec![
        Cell::new("Cash Position"),
        Cell::new(report.cash_position),
        Cell::new(
            report
                .cash_growth_pct
                .map(|pct| format!("{pct}%"))
                .unwrap_or_else(|| "n/a".to_string()),
        ),
    ]);
    table.add_row(vec![
        Cell::new("Periods Analyzed"),
        Cell::new(report.periods_analyzed),
        Cell::new(""),
    ]);
    table
}
