//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `brand_harvest` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Ctrl-C handling
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;

use brand_harvest::config::{Command, Opt, SubjectSource};
use brand_harvest::initialization::init_logger_with;
use brand_harvest::{
    cancel_on_ctrl_c, run_catalog, run_crawl, run_index, run_migration, shutdown_gracefully,
    RunOutput,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials (STORAGE_SERVICE_KEY, SESSION_COOKIE) may live in .env:
    // current directory first, then next to the executable
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    let cancel = CancellationToken::new();
    let signal_task = cancel_on_ctrl_c(cancel.clone());

    let result = match opt.command {
        Command::Crawl(args) => run_crawl(args.into_config(), cancel).await,
        Command::Migrate(args) => match args.into_config() {
            Ok(config) => run_migration(config, cancel).await,
            Err(e) => Err(e.into()),
        },
        Command::Index(args) => match args.storage.into_sink_config() {
            Ok(sink) => {
                run_index(&SubjectSource::from(args.subjects), &sink, &args.report_dir).await
            }
            Err(e) => Err(e.into()),
        },
        Command::Catalog(args) => match args.storage.into_sink_config() {
            Ok(sink) => {
                run_catalog(
                    &args.source_dir,
                    &SubjectSource::from(args.subjects),
                    &sink,
                    &args.table,
                    &args.report_dir,
                )
                .await
            }
            Err(e) => Err(e.into()),
        },
    };

    shutdown_gracefully(Some(signal_task)).await;

    match result {
        Ok(output) => {
            print_summary(&output);
            Ok(())
        }
        Err(e) => {
            eprintln!("brand_harvest error: {:#}", e);
            process::exit(1);
        }
    }
}

fn print_summary(output: &RunOutput) {
    let report = &output.report;
    println!(
        "✅ {}: {} attempted ({} succeeded, {} skipped, {} failed{}) in {:.1}s{}",
        output.kind,
        report.attempted,
        report.succeeded,
        report.skipped,
        report.failed,
        if report.empty > 0 {
            format!(", {} empty", report.empty)
        } else {
            String::new()
        },
        output.elapsed_seconds,
        if report.interrupted { " - interrupted" } else { "" }
    );
    if let Some(path) = &output.failures_path {
        println!("Failures saved in {}", path.display());
    }
}
