//! Audit command implementation

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::audit::{Auditor, ScanPolicy, ScanProgress};
use crate::cli::AuditArgs;
use crate::config::{AuditConfig, Config, ScanMode};
use crate::error::{AuditError, Result};
use crate::lock::RunLock;
use crate::report;
use crate::roots::ScanRoot;
use crate::rules::RuleSet;
use crate::source::{self, WalkSource};

/// Run the audit command.
///
/// `roots` is only consulted when no root was given on the command line.
pub fn run(args: AuditArgs, config: &Config, roots: &[ScanRoot], quiet: bool) -> Result<()> {
    let audit_config = apply_overrides(&config.audit, &args);
    Config {
        audit: audit_config.clone(),
        ..config.clone()
    }
    .validate()?;

    let root = match &args.path {
        Some(path) => path.clone(),
        None => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            choose_root(roots, &mut stdin.lock(), &mut stdout.lock())?
        }
    };

    let _lock = if args.no_lock {
        None
    } else {
        Some(RunLock::acquire(&config.lock.path)?)
    };

    let rules = RuleSet::from_config(&config.rules)?;
    let backend = args.backend.unwrap_or(config.scanner.backend);
    let source = source::from_config(backend, &config.scanner);
    let progress = Arc::new(ScanProgress::new());
    let mut auditor = Auditor::new(source, rules, ScanPolicy::from_config(&audit_config))
        .with_progress(Arc::clone(&progress));

    let spinner = (!args.json && !quiet && io::stderr().is_terminal())
        .then(|| Spinner::start(Arc::clone(&progress)))
        .flatten();

    let result = if args.parallel {
        auditor.scan_parallel(&root, &WalkSource::new(&config.scanner))
    } else {
        auditor.scan(&root)
    };
    if let Some(spinner) = spinner {
        spinner.finish();
    }
    let outcome = result?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = if args.json {
        report::render_json(&root, &outcome)
            .map_err(io::Error::from)
            .and_then(|json| writeln!(out, "{}", json))
    } else {
        report::emit(&outcome, &mut out).and_then(|()| {
            if quiet {
                Ok(())
            } else {
                writeln!(out, "\n{}", report::summary(&outcome))
            }
        })
    };
    written.map_err(|source| AuditError::Io {
        path: "<stdout>".into(),
        source,
    })?;

    tracing::debug!(throughput = outcome.throughput(), "Eligible entries per second");
    Ok(())
}

/// Command-line values take precedence over the configuration file.
fn apply_overrides(base: &AuditConfig, args: &AuditArgs) -> AuditConfig {
    let mut config = base.clone();
    if let Some(top) = args.top {
        config.top_n = top;
    }
    if let Some(days) = args.min_age {
        config.min_age_days = days;
    }
    if let Some(mib) = args.min_size {
        config.size_threshold_mib = mib;
    }
    if args.legacy {
        config.mode = ScanMode::Legacy;
    }
    config
}

/// List `roots` and read a 1-based selection from `input`.
pub fn choose_root<R: BufRead, W: Write>(
    roots: &[ScanRoot],
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf> {
    let io_err = |source: io::Error| AuditError::Io {
        path: "<terminal>".into(),
        source,
    };

    writeln!(output, "Available roots:").map_err(io_err)?;
    super::roots::write_list(roots, output).map_err(io_err)?;
    write!(output, "Select a root [1-{}]: ", roots.len()).map_err(io_err)?;
    output.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    let answer = line.trim();

    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| roots.get(i))
        .map(|root| root.path.clone())
        .ok_or_else(|| AuditError::InvalidSelection(answer.to_string()))
}

/// Stderr spinner fed from the live scan counters.
struct Spinner {
    bar: ProgressBar,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Spinner {
    /// `None` when the style cannot be built; the scan then runs without one.
    fn start(progress: Arc<ScanProgress>) -> Option<Self> {
        let style = match spinner_style() {
            Ok(style) => style,
            Err(e) => {
                tracing::debug!("Progress spinner disabled: {}", e);
                return None;
            }
        };
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let bar = bar.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    bar.set_message(progress_message(&progress));
                    thread::sleep(Duration::from_millis(100));
                }
            })
        };

        Some(Self { bar, stop, handle })
    }

    fn finish(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
        self.bar.finish_and_clear();
    }
}

fn spinner_style() -> std::result::Result<ProgressStyle, indicatif::style::TemplateError> {
    Ok(ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
}

fn progress_message(progress: &ScanProgress) -> String {
    format!(
        "Examined: {} | Eligible: {} | Flagged: {}",
        progress.examined(),
        progress.eligible(),
        progress.matched()
    )
}
