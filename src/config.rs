use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const MIB: u64 = 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audit: AuditConfig,
    pub rules: RulesConfig,
    pub scanner: ScannerConfig,
    pub lock: LockConfig,
}

/// How the size threshold interacts with classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Size and age gate before classification, bounded ranking
    Streaming,
    /// Age gate before classification, size applied at the final cutoff
    Legacy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Minimum age in days before a file is considered
    pub min_age_days: u32,
    /// Minimum file size in MiB
    pub size_threshold_mib: u64,
    /// Number of entries in the final report
    pub top_n: usize,
    /// Extra capacity retained by the ranker between compactions
    pub slack: usize,
    pub mode: ScanMode,
}

/// Token lists compiled into the classification rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub backup_tokens: Vec<String>,
    pub install_prefixes: Vec<String>,
    pub dump_dir_suffixes: Vec<String>,
    pub dump_extensions: Vec<String>,
    pub hotfix_subpaths: Vec<String>,
    pub hotfix_extensions: Vec<String>,
}

/// Enumeration backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Platform default: find+stat on Unix, PowerShell on Windows
    Auto,
    /// External find | xargs stat pipeline
    Find,
    /// External PowerShell Get-ChildItem listing
    Powershell,
    /// In-process directory walk
    Walk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub backend: Backend,
    /// Extra paths pruned from enumeration
    pub exclude: Vec<PathBuf>,
    pub find_program: String,
    pub xargs_program: String,
    pub stat_program: String,
    pub powershell_program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock file serializing concurrent audits
    pub path: PathBuf,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is read
    /// when present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/hoard-scan/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hoard-scan").join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.top_n == 0 {
            return Err(ConfigError::Invalid("audit.top_n must be at least 1".into()));
        }
        if self.audit.size_threshold_mib == 0 {
            return Err(ConfigError::Invalid(
                "audit.size_threshold_mib must be at least 1".into(),
            ));
        }

        let programs = [
            ("find_program", &self.scanner.find_program),
            ("xargs_program", &self.scanner.xargs_program),
            ("stat_program", &self.scanner.stat_program),
            ("powershell_program", &self.scanner.powershell_program),
        ];
        for (name, value) in programs {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("scanner.{} is empty", name)));
            }
        }

        let lists = [
            ("backup_tokens", &self.rules.backup_tokens),
            ("install_prefixes", &self.rules.install_prefixes),
            ("dump_dir_suffixes", &self.rules.dump_dir_suffixes),
            ("dump_extensions", &self.rules.dump_extensions),
            ("hotfix_subpaths", &self.rules.hotfix_subpaths),
            ("hotfix_extensions", &self.rules.hotfix_extensions),
        ];
        for (name, tokens) in lists {
            if tokens.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "rules.{} contains an empty entry",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl AuditConfig {
    pub fn size_threshold_bytes(&self) -> u64 {
        self.size_threshold_mib.saturating_mul(MIB)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_age_days: 30,
            size_threshold_mib: 500,
            top_n: 20,
            slack: 100,
            mode: ScanMode::Streaming,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            backup_tokens: strings(&["BKP", "BKUP", "BACKUP", "BACK_UP"]),
            install_prefixes: strings(&["DSC_", "INST_", "INSTALL_", "SETUP_", "ORIG_"]),
            dump_dir_suffixes: strings(&["dump", "dumps", "export", "datapump"]),
            dump_extensions: strings(&["dmp", "dump", "exp", "expdp", "sql"]),
            hotfix_subpaths: strings(&["hotfix", "hotfixes", "patches"]),
            hotfix_extensions: strings(&["zip", "tar", "gz", "tgz", "7z", "rar", "jar", "war"]),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            exclude: vec![],
            find_program: "find".to_string(),
            xargs_program: "xargs".to_string(),
            stat_program: "stat".to_string(),
            powershell_program: "powershell".to_string(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: runtime_dir.join("hoard-scan.lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audit.min_age_days, 30);
        assert_eq!(config.audit.top_n, 20);
        assert_eq!(config.audit.slack, 100);
    }

    #[test]
    fn default_threshold_is_500_mib() {
        let config = AuditConfig::default();
        assert_eq!(config.size_threshold_bytes(), 500 * 1024 * 1024);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[audit]"));
        assert!(toml_str.contains("mode = \"streaming\""));
    }

    #[test]
    fn default_rules_cover_backup_tokens() {
        let rules = RulesConfig::default();
        assert!(rules.backup_tokens.contains(&"BACK_UP".to_string()));
        assert!(rules.install_prefixes.contains(&"DSC_".to_string()));
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let mut config = Config::default();
        config.audit.top_n = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_rule_token_is_rejected() {
        let mut config = Config::default();
        config.rules.dump_extensions.push("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dump_extensions"));
    }

    #[test]
    fn empty_program_is_rejected() {
        let mut config = Config::default();
        config.scanner.stat_program.clear();
        assert!(config.validate().is_err());
    }
}
