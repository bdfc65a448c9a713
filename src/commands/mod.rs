//! Subcommand implementations

pub mod audit;
pub mod roots;
