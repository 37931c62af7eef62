//! Savings metrics CLI - dashboard metrics from the group's ledger sheets
//!
//! # Main Commands
//!
//! ```bash
//! savings-metrics serve                      # Start HTTP server over Google Sheets
//! savings-metrics serve --csv-dir exports/   # ...or over CSV exports
//! savings-metrics report -o report.json      # Run one refresh cycle, print the report
//! savings-metrics append members --row '{"MemberID":"M7","Name":"Wanjiru"}'
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! savings-metrics parse 02_MonthlyCollection.csv    # Just parse CSV to records
//! savings-metrics validate disbursement rows.json   # Validate rows against schema
//! ```

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use savings_metrics::sheets::fetch_workbook;
use savings_metrics::table::build;
use savings_metrics::{
    parse_csv_file_auto, run_pipeline, serve, validate_row, Config, CsvDirSource, JoinPolicy,
    SheetKind, SheetSource, StaticSource,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "savings-metrics")]
#[command(about = "Derive savings group dashboard metrics from ledger sheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to read the ledger from; Google Sheets when neither is given
#[derive(Args)]
struct SourceArgs {
    /// Directory of `<sheet>.csv` exports
    #[arg(long, conflicts_with = "workbook")]
    csv_dir: Option<PathBuf>,

    /// JSON workbook file (`{"<sheet>": [[...], ...]}`)
    #[arg(long)]
    workbook: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SERVER_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run one refresh cycle and output the dashboard report
    Report {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop the MonthOrder helper column
        #[arg(long)]
        no_month_order: bool,

        /// Abort when a MemberID is missing from the roster
        #[arg(long)]
        fail_on_orphans: bool,
    },

    /// Parse a CSV file and output its records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate rows (a JSON object or array) against a sheet schema
    Validate {
        /// Sheet kind: members, monthly-collection, disbursement, administrative-costs
        kind: SheetKind,

        /// Input JSON file
        input: PathBuf,
    },

    /// Validate one row and append it to the live sheet
    Append {
        /// Sheet kind: members, monthly-collection, disbursement, administrative-costs
        kind: SheetKind,

        /// Row as a JSON object keyed by column name
        #[arg(short, long)]
        row: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,savings_metrics=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, source } => cmd_serve(port, source).await,

        Commands::Report {
            source,
            output,
            no_month_order,
            fail_on_orphans,
        } => cmd_report(source, output.as_deref(), no_month_order, fail_on_orphans).await,

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Validate { kind, input } => cmd_validate(kind, &input),

        Commands::Append { kind, row } => cmd_append(kind, &row).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>, source: SourceArgs) -> CliResult {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.server_port = port;
    }
    info!("Starting savings metrics server with config: {:?}", config);

    match (source.csv_dir, source.workbook) {
        (Some(dir), _) => serve(CsvDirSource::new(dir), &config).await?,
        (None, Some(path)) => serve(StaticSource::from_json_file(path)?, &config).await?,
        (None, None) => serve(config.sheets_client()?, &config).await?,
    }
    Ok(())
}

async fn cmd_report(
    source: SourceArgs,
    output: Option<&Path>,
    no_month_order: bool,
    fail_on_orphans: bool,
) -> CliResult {
    let mut config = Config::from_env()?;
    if no_month_order {
        config.include_month_order = false;
    }
    if fail_on_orphans {
        config.join_policy = JoinPolicy::Fail;
    }

    let report = match (source.csv_dir, source.workbook) {
        (Some(dir), _) => {
            eprintln!("📂 Reading CSV exports from: {}", dir.display());
            build_report(&CsvDirSource::new(dir), &config).await?
        }
        (None, Some(path)) => {
            eprintln!("📄 Reading workbook: {}", path.display());
            build_report(&StaticSource::from_json_file(path)?, &config).await?
        }
        (None, None) => {
            eprintln!("📡 Reading Google Sheets");
            build_report(&config.sheets_client()?, &config).await?
        }
    };

    let summary = &report.summary;
    eprintln!("\n📊 Summary:");
    eprintln!("   Contributions:     {:.2}", summary.total_contributions);
    eprintln!("   Disbursements:     {:.2}", summary.total_disbursements);
    eprintln!("   Admin costs:       {:.2}", summary.total_admin_costs);
    eprintln!("   Net position:      {:.2}", summary.net_position);
    if !report.warnings.is_empty() {
        eprintln!("   ⚠️  {} join warning(s)", report.warnings.len());
    }

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn build_report<S: SheetSource>(
    source: &S,
    config: &Config,
) -> Result<savings_metrics::DashboardReport, Box<dyn std::error::Error>> {
    let raw = fetch_workbook(source, &config.sheet_names).await?;
    Ok(run_pipeline(&raw, &config.sheet_names, &config.pipeline_options())?)
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));

    let table = build(result.rows)?;
    eprintln!("   Columns: {}", table.columns().join(", "));
    eprintln!("✅ Parsed {} records", table.len());

    let json = serde_json::to_string_pretty(&table.records())?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_validate(kind: SheetKind, input: &Path) -> CliResult {
    eprintln!("✔️  Validating {} rows: {}", kind.slug(), input.display());

    let content = fs::read_to_string(input)?;
    let rows = match serde_json::from_str::<Value>(&content)? {
        Value::Array(rows) => rows,
        row => vec![row],
    };

    let mut valid = 0;
    let mut invalid = 0;

    for (i, row) in rows.iter().enumerate() {
        match validate_row(kind, row) {
            Ok(()) => valid += 1,
            Err(e) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Row {} invalid: {}", i, e);
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        return Err(format!("{} invalid row(s)", invalid).into());
    }
    Ok(())
}

async fn cmd_append(kind: SheetKind, row: &str) -> CliResult {
    let config = Config::from_env()?;
    let client = config.sheets_client()?;
    let row: Value = serde_json::from_str(row)?;

    let sheet = config.sheet_names.get(kind);
    eprintln!("📝 Appending to: {}", sheet);

    let header = client.read_header(sheet).await?;
    let values = savings_metrics::prepare_append(kind, sheet, &row, &header)?;
    let result = client.append_row(sheet, values).await?;

    eprintln!("✅ Appended {} row(s) at {}", result.updated_rows, result.updated_range);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
