use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::Backend;

/// Hoard Scan - find large, old, likely-disposable files
#[derive(Parser, Debug)]
#[command(name = "hoard-scan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH", env = "HOARD_SCAN_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a filesystem root and report disposable-looking files
    Audit(AuditArgs),

    /// List the filesystems that can be audited
    Roots,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug, Default)]
pub struct AuditArgs {
    /// Root to scan (prompts with the discovered roots when omitted)
    pub path: Option<PathBuf>,

    /// Number of entries in the report
    #[arg(short = 'n', long, value_name = "N")]
    pub top: Option<usize>,

    /// Minimum age in days since last modification
    #[arg(long, value_name = "DAYS")]
    pub min_age: Option<u32>,

    /// Minimum file size in MiB
    #[arg(long, value_name = "MIB")]
    pub min_size: Option<u64>,

    /// Rank every match and apply the size cutoff at the end
    #[arg(long)]
    pub legacy: bool,

    /// Enumeration backend
    #[arg(short, long, value_enum, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Walk top-level subtrees in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not take the exclusive run lock
    #[arg(long)]
    pub no_lock: bool,
}
