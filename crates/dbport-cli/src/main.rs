//! dbport CLI - export, import, and inspect SQLite application databases.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dbport::{
    export_filename, Config, ImportMode, ImportOptions, ImportReport, Orchestrator, PortError,
};
use serde_json::json;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "dbport")]
#[command(about = "Whole-database JSON export and import for SQLite")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides database.path)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every manifest table to a JSON document
    Export {
        /// Output file [default: dbport-export-YYYY-MM-DD.json]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON document into the database
    Import {
        /// Export document or import payload to read
        file: PathBuf,

        /// Reconciliation mode: merge or replace
        #[arg(short, long)]
        mode: String,

        /// Run the import, then roll it back
        #[arg(long)]
        dry_run: bool,
    },

    /// Show row counts per manifest table
    Stats,

    /// Show the table processing order
    Manifest,

    /// Copy the raw database file
    Snapshot {
        /// Output file [default: dbport-snapshot-YYYY-MM-DD.db]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), PortError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = load_config(cli.config.as_deref(), cli.database.as_deref())?;

    // Reject a bad mode before the store is opened
    if let Commands::Import { ref mode, .. } = cli.command {
        mode.parse::<ImportMode>()?;
    }

    let orchestrator = Orchestrator::new(config).await?;

    match cli.command {
        Commands::Export { output } => {
            let document = orchestrator.export().await?;
            let path =
                output.unwrap_or_else(|| PathBuf::from(export_filename(Utc::now().date_naive())));
            tokio::fs::write(&path, document.to_json()?).await?;
            info!("Wrote export to {}", path.display());

            if cli.output_json {
                let summary = json!({
                    "path": path,
                    "version": document.version,
                    "exportedAt": document.exported_at,
                    "tables": document.row_counts(),
                    "totalRows": document.total_rows(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Export written to {}", path.display());
                for (table, rows) in document.row_counts() {
                    println!("  {}: {} rows", table, rows);
                }
                println!("  Total: {} rows", document.total_rows());
            }
        }

        Commands::Import {
            file,
            mode,
            dry_run,
        } => {
            let contents = tokio::fs::read_to_string(&file).await?;
            let payload: serde_json::Value = serde_json::from_str(&contents)?;
            let request = orchestrator.parse_request(&mode, payload)?;

            let report = orchestrator
                .import(&request, ImportOptions { dry_run })
                .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Stats => {
            let diagnostics = orchestrator.diagnostics().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else {
                println!("Row counts:");
                for (table, count) in &diagnostics.tables {
                    match count {
                        Some(n) => println!("  {}: {}", table, n),
                        None => println!("  {}: (missing)", table),
                    }
                }
                println!("  Total: {}", diagnostics.total_rows());
            }
        }

        Commands::Manifest => {
            let manifest = orchestrator.manifest();

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(manifest)?);
            } else {
                println!("Table order ({} tables):", manifest.len());
                for (i, table) in manifest.forward().enumerate() {
                    println!("  {}. {}", i + 1, table);
                }
            }
        }

        Commands::Snapshot { output } => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "dbport-snapshot-{}.db",
                    Utc::now().date_naive().format("%Y-%m-%d")
                ))
            });
            let result = orchestrator.snapshot(&path).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Snapshot written to {} ({} bytes)",
                    result.path.display(),
                    result.bytes
                );
            }
        }

        Commands::HealthCheck => {
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Database ({}): {} ({}ms)",
                    result.database.display(),
                    if result.healthy { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if !result.healthy {
                return Err(PortError::Config("Health check failed".to_string()));
            }
        }
    }

    orchestrator.close().await;
    Ok(())
}

/// Build the configuration from `--config` and/or `--database`.
fn load_config(config: Option<&Path>, database: Option<&Path>) -> Result<Config, PortError> {
    let config = match (config, database) {
        (Some(path), database) => {
            let mut config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            if let Some(database) = database {
                config.database.path = database.to_path_buf();
                config.validate()?;
            }
            config
        }
        (None, Some(database)) => Config::for_database(database),
        (None, None) => {
            return Err(PortError::Config(
                "either --config or --database is required".to_string(),
            ))
        }
    };
    Ok(config)
}

fn print_report(report: &ImportReport) {
    let status = if report.dry_run {
        "Dry run completed (rolled back)"
    } else {
        "Import completed!"
    };
    println!("\n{} [mode: {}]", status, report.mode);
    for (table, outcome) in &report.summary {
        println!(
            "  {}: {} imported ({} updated), {} skipped, {} errors",
            table, outcome.imported, outcome.updated, outcome.skipped, outcome.errors
        );
    }
    println!(
        "  Total: {} imported, {} skipped, {} errors",
        report.totals.imported, report.totals.skipped, report.totals.errors
    );

    if let Some(ref details) = report.error_details {
        println!("\nRow errors:");
        for entry in &details.entries {
            println!(
                "  {} [{}]: {}",
                entry.table, entry.row_identifier, entry.message
            );
        }
        if details.truncated {
            println!(
                "  ... {} more not shown",
                details.total_errors - details.entries.len()
            );
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
