use std::path::PathBuf;
use thiserror::Error;

/// Exit code for an unhandled scan failure.
pub const EXIT_SCAN_FAILED: u8 = 1;
/// Exit code when another audit already holds the run lock.
pub const EXIT_LOCK_HELD: u8 = 3;
/// Exit code when the log file cannot be opened.
pub const EXIT_LOG_BOOTSTRAP: u8 = 4;

/// Core library errors
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to launch enumeration backend '{program}': {source}")]
    BackendLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Another audit is already running (lock held at '{0}')")]
    LockHeld(PathBuf),

    #[error("Failed to open log file '{path}': {source}")]
    LogBootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan cannot start from state {0:?}; reset it first")]
    InvalidState(crate::audit::ScanState),

    #[error("Invalid classification pattern: {0}")]
    Rule(#[from] regex::Error),

    #[error("Invalid root selection: {0}")]
    InvalidSelection(String),
}

impl AuditError {
    /// Process exit code for this error.
    ///
    /// Lock and log bootstrap failures keep their own codes so that wrappers
    /// can tell them apart from a failed scan.
    pub fn exit_code(&self) -> u8 {
        match self {
            AuditError::LockHeld(_) => EXIT_LOCK_HELD,
            AuditError::LogBootstrap { .. } => EXIT_LOG_BOOTSTRAP,
            _ => EXIT_SCAN_FAILED,
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AuditError>;
