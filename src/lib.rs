//! Hoard Scan - audit a filesystem for large, old, likely-disposable files
//!
//! The pipeline is a [`source::MetadataSource`] feeding an [`audit::Auditor`],
//! which applies the age and size gates, classifies survivors with a
//! [`rules::RuleSet`] and keeps the largest matches in a [`ranking::TopN`].

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod lock;
pub mod ranking;
pub mod report;
pub mod roots;
pub mod rules;
pub mod source;

// Re-export commonly used types
pub use audit::{Auditor, ScanOutcome, ScanPolicy, ScanState};
pub use config::Config;
pub use error::{AuditError, Result};
pub use ranking::{MatchRecord, RankedReport, TopN};
pub use rules::RuleSet;
