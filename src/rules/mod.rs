//! Classification rules for disposable-file detection.
//!
//! Rules are compiled once from [`RulesConfig`] and evaluated in a fixed
//! priority order: backup pattern, install prefix, dump extension, hotfix
//! extension. The first rule that matches decides the reason.

mod rule;

pub use rule::{ClassificationRule, RuleKind};

use std::path::Path;

use crate::config::RulesConfig;
use crate::error::Result;

/// Ordered, immutable set of classification rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// Compile the rule set from configuration.
    ///
    /// A rule whose token list is empty is left out of the set.
    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(4);

        if !config.backup_tokens.is_empty() {
            rules.push(ClassificationRule::backup_pattern(&config.backup_tokens)?);
        }
        if !config.install_prefixes.is_empty() {
            rules.push(ClassificationRule::install_prefix(&config.install_prefixes)?);
        }
        if !config.dump_dir_suffixes.is_empty() && !config.dump_extensions.is_empty() {
            rules.push(ClassificationRule::dump_extension(
                &config.dump_dir_suffixes,
                &config.dump_extensions,
            )?);
        }
        if !config.hotfix_subpaths.is_empty() && !config.hotfix_extensions.is_empty() {
            rules.push(ClassificationRule::hotfix_extension(
                &config.hotfix_subpaths,
                &config.hotfix_extensions,
            )?);
        }

        tracing::debug!(
            rules = ?rules.iter().map(|r| r.kind().id()).collect::<Vec<_>>(),
            "Compiled classification rules"
        );

        Ok(Self { rules })
    }

    /// Rule set built from the default token lists.
    pub fn builtin() -> Result<Self> {
        Self::from_config(&RulesConfig::default())
    }

    /// Return the first rule matching this file, if any.
    pub fn classify(&self, path: &str, parent_dir: &str) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule.try_match(path, parent_dir))
    }

    /// Classify a filesystem path. Paths that are not valid UTF-8 never match.
    pub fn classify_path(&self, path: &Path) -> Option<&ClassificationRule> {
        let path_str = path.to_str()?;
        let parent = path.parent().and_then(|p| p.to_str()).unwrap_or("");
        self.classify(path_str, parent)
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_are_in_priority_order() {
        let rules = RuleSet::builtin().unwrap();
        let kinds: Vec<_> = rules.rules().iter().map(|r| r.kind()).collect();

        assert_eq!(
            kinds,
            vec![
                RuleKind::BackupPattern,
                RuleKind::InstallPrefix,
                RuleKind::DumpExtension,
                RuleKind::HotfixExtension,
            ]
        );
    }

    #[test]
    fn first_match_wins_over_dump_rule() {
        let rules = RuleSet::builtin().unwrap();

        let rule = rules
            .classify("/u01/dumps/full_backup.dmp", "/u01/dumps")
            .unwrap();
        assert_eq!(rule.kind(), RuleKind::BackupPattern);
        assert_eq!(rule.reason(), "Backup pattern match");
    }

    #[test]
    fn dump_rule_applies_without_backup_token() {
        let rules = RuleSet::builtin().unwrap();

        let rule = rules.classify("/u01/dumps/full.dmp", "/u01/dumps").unwrap();
        assert_eq!(rule.kind(), RuleKind::DumpExtension);
    }

    #[test]
    fn install_prefix_reason() {
        let rules = RuleSet::builtin().unwrap();

        let rule = rules.classify_path(Path::new("/data/DSC_old.bak")).unwrap();
        assert_eq!(rule.reason(), "Installation backup prefix match");
    }

    #[test]
    fn no_match_is_none() {
        let rules = RuleSet::builtin().unwrap();

        assert!(rules.classify("/home/user/movie.mkv", "/home/user").is_none());
        assert!(rules.classify_path(Path::new("/srv/hotfix/notes.txt")).is_none());
    }

    #[test]
    fn empty_lists_drop_rules() {
        let config = RulesConfig {
            backup_tokens: vec![],
            dump_extensions: vec![],
            ..RulesConfig::default()
        };
        let rules = RuleSet::from_config(&config).unwrap();

        assert_eq!(rules.len(), 2);
        assert!(rules.classify("/x/my_backup.iso", "/x").is_none());
    }

    #[test]
    fn rule_set_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleSet>();
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_never_matches() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let rules = RuleSet::builtin().unwrap();
        let path = Path::new(OsStr::from_bytes(b"/data/BACKUP_\xff.iso"));
        assert!(rules.classify_path(path).is_none());
    }
}
