//! table-migrate CLI - chunked PostgreSQL to PostgreSQL table migration.

mod progress;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use table_migrate::error::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use table_migrate::{
    Config, Credentials, MigrateError, MigrationReport, Orchestrator, PlannedTable,
    ProgressReporter, Role, TracingReporter,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::BarReporter;

#[derive(Parser)]
#[command(name = "table-migrate")]
#[command(about = "Migrate tables between PostgreSQL databases in committed chunks")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config/migration_config.yaml")]
    config: PathBuf,

    /// Dry run: reconcile every table and print the plan without changing the target
    #[arg(long)]
    dry_run: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Disable the progress bar and log progress instead
    #[arg(long)]
    no_progress: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Load credentials from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors share the configuration exit code; --help and --version
    // print and succeed.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_CONFIG_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), MigrateError> {
    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;
    load_env_file(cli.env_file.as_ref())?;

    let config = Config::load(&cli.config)?;
    info!(
        "Loaded configuration from {:?} ({} tables)",
        cli.config,
        config.tables.len()
    );

    let source = Credentials::from_env(Role::Source)?;
    let target = Credentials::from_env(Role::Target)?;

    let orchestrator = Orchestrator::connect(&config, &source, &target).await?;

    if cli.dry_run {
        let planned = orchestrator.plan(&config.tables).await;
        orchestrator.close();
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&planned)?);
        } else {
            print_plan(&planned);
        }
        return plan_result(&planned);
    }

    let reporter: Arc<dyn ProgressReporter> = if cli.no_progress || cli.output_json {
        Arc::new(TracingReporter)
    } else {
        Arc::new(BarReporter::new())
    };
    let orchestrator = orchestrator.with_reporter(reporter);

    let report = orchestrator.run(&config.tables).await;
    orchestrator.close();

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(&report);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(MigrateError::TablesFailed {
            failed: report.tables_failed,
            total: report.tables_total,
        })
    }
}

fn load_env_file(path: Option<&PathBuf>) -> Result<(), MigrateError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                MigrateError::Config(format!("cannot load env file {:?}: {}", path, e))
            })?;
        }
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        },
    }
    Ok(())
}

/// A dry run fails like a real run when any table would fail reconciliation.
fn plan_result(planned: &[PlannedTable]) -> Result<(), MigrateError> {
    let failed = planned.iter().filter(|p| p.error.is_some()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(MigrateError::TablesFailed {
            failed,
            total: planned.len(),
        })
    }
}

fn print_plan(planned: &[PlannedTable]) {
    println!("\nMigration plan (dry run):");
    for table in planned {
        match (&table.action, &table.error) {
            (Some(action), _) => {
                println!("  {} -> {}: {}", table.table_name, table.target_name, action);
                for sql in &table.ddl {
                    println!("    {}", sql.replace('\n', "\n    "));
                }
            }
            (None, Some(error)) => {
                println!("  {} -> {}: ERROR {}", table.table_name, table.target_name, error)
            }
            (None, None) => {}
        }
    }
}

fn print_summary(report: &MigrationReport) {
    let headline = if report.is_success() {
        "completed"
    } else {
        "finished with failures"
    };
    println!("\nMigration {}:", headline);
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Tables: {}/{} succeeded",
        report.tables_success, report.tables_total
    );
    println!("  Rows: {}", report.rows_migrated);

    for outcome in &report.outcomes {
        let action = outcome
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<30} {:<15} {:<18} {:>10} rows  {} indexes",
            outcome.table_name,
            outcome.status,
            action,
            outcome.rows_migrated,
            outcome.indexes_migrated
        );
        if let Some(detail) = &outcome.detail {
            println!("      {}", detail);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => verbosity.to_lowercase(),
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    // RUST_LOG wins over --verbosity when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_migrate::error::EXIT_TABLE_FAILURES;
    use table_migrate::ReconcileAction;

    fn planned(name: &str, error: Option<&str>) -> PlannedTable {
        PlannedTable {
            table_name: name.to_string(),
            target_name: name.to_string(),
            action: error.is_none().then_some(ReconcileAction::Append),
            ddl: Vec::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_clean_plan_succeeds() {
        assert!(plan_result(&[planned("a", None), planned("b", None)]).is_ok());
    }

    #[test]
    fn test_plan_with_mismatch_fails() {
        let err = plan_result(&[
            planned("a", None),
            planned("b", Some("Schema mismatch for table b: extra column c")),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            MigrateError::TablesFailed { failed: 1, total: 2 }
        ));
        assert_eq!(err.exit_code(), EXIT_TABLE_FAILURES);
    }
}
