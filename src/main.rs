use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::{CommandFactory, Parser};

use hoard_scan::cli::{Cli, Command};
use hoard_scan::commands;
use hoard_scan::config::Config;
use hoard_scan::error::{AuditError, EXIT_SCAN_FAILED};
use hoard_scan::roots;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Error: {}", e);
        return ExitCode::from(e.exit_code());
    }

    let span = tracing::info_span!("audit", run_id = %run_id());
    let _entered = span.enter();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<AuditError>()
                .map_or(EXIT_SCAN_FAILED, AuditError::exit_code);
            tracing::error!(error = %e, exit_code = code, "Run failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    tracing::debug!(?config, "Loaded configuration");

    // Dispatch to subcommand
    match cli.command {
        Command::Audit(args) => {
            tracing::info!(?args, "Starting audit");
            let roots = if args.path.is_none() {
                roots::discover()
            } else {
                Vec::new()
            };
            commands::audit::run(args, &config, &roots, cli.quiet)?;
        }
        Command::Roots => {
            commands::roots::run(&roots::discover())?;
        }
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "hoard-scan",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// `<pid>-<epoch secs>`, attached to every event of this run.
fn run_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}-{}", std::process::id(), secs)
}

fn init_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), AuditError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "warn"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hoard_scan={}", level)));

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path).map_err(|source| AuditError::LogBootstrap {
                path: path.to_path_buf(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // stdout carries the report
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
