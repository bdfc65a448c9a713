//! A single compiled classification rule.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Rule categories, listed in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    BackupPattern,
    InstallPrefix,
    DumpExtension,
    HotfixExtension,
}

impl RuleKind {
    /// Short identifier (e.g., "backup").
    pub fn id(&self) -> &'static str {
        match self {
            RuleKind::BackupPattern => "backup",
            RuleKind::InstallPrefix => "install-prefix",
            RuleKind::DumpExtension => "dump",
            RuleKind::HotfixExtension => "hotfix",
        }
    }

    /// Reason string reported for files flagged by this kind of rule.
    pub fn reason(&self) -> &'static str {
        match self {
            RuleKind::BackupPattern => "Backup pattern match",
            RuleKind::InstallPrefix => "Installation backup prefix match",
            RuleKind::DumpExtension => "Dump file in monitored directory",
            RuleKind::HotfixExtension => "Hotfix archive in monitored directory",
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Pattern searched anywhere in the full path.
    Path(Regex),
    /// Pattern anchored at the start of the base name.
    BaseName(Regex),
    /// Parent directory pattern combined with an extension set.
    ScopedExtension {
        parent: Regex,
        extensions: HashSet<String>,
    },
}

/// A compiled, immutable classification predicate.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    kind: RuleKind,
    matcher: Matcher,
    reason: String,
}

impl ClassificationRule {
    /// Case-insensitive substring match of any token against the full path.
    pub fn backup_pattern(tokens: &[String]) -> Result<Self, regex::Error> {
        let pattern = format!("(?i)(?:{})", alternation(tokens));
        Ok(Self::new(RuleKind::BackupPattern, Matcher::Path(Regex::new(&pattern)?)))
    }

    /// Case-insensitive prefix match against the file's base name.
    pub fn install_prefix(prefixes: &[String]) -> Result<Self, regex::Error> {
        let pattern = format!("(?i)^(?:{})", alternation(prefixes));
        Ok(Self::new(
            RuleKind::InstallPrefix,
            Matcher::BaseName(Regex::new(&pattern)?),
        ))
    }

    /// Dump extension inside a directory whose path ends with one of `suffixes`.
    pub fn dump_extension(suffixes: &[String], extensions: &[String]) -> Result<Self, regex::Error> {
        let pattern = format!(r"(?i)(?:{})[/\\]*$", alternation(suffixes));
        Ok(Self::new(
            RuleKind::DumpExtension,
            Matcher::ScopedExtension {
                parent: Regex::new(&pattern)?,
                extensions: extension_set(extensions),
            },
        ))
    }

    /// Archive extension inside a directory whose path contains one of `subpaths`.
    pub fn hotfix_extension(
        subpaths: &[String],
        extensions: &[String],
    ) -> Result<Self, regex::Error> {
        let pattern = format!("(?i)(?:{})", alternation(subpaths));
        Ok(Self::new(
            RuleKind::HotfixExtension,
            Matcher::ScopedExtension {
                parent: Regex::new(&pattern)?,
                extensions: extension_set(extensions),
            },
        ))
    }

    fn new(kind: RuleKind, matcher: Matcher) -> Self {
        Self {
            kind,
            matcher,
            reason: kind.reason().to_string(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Test this rule against one file.
    pub fn try_match(&self, path: &str, parent_dir: &str) -> bool {
        match &self.matcher {
            Matcher::Path(re) => re.is_match(path),
            Matcher::BaseName(re) => base_name(path).is_some_and(|name| re.is_match(name)),
            Matcher::ScopedExtension { parent, extensions } => {
                parent.is_match(parent_dir)
                    && extension(path).is_some_and(|ext| extensions.contains(&ext))
            }
        }
    }
}

/// Escaped alternation; `/` in a token matches either path separator.
fn alternation(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            let normalized = t.trim().replace('\\', "/");
            regex::escape(normalized.trim_matches('/')).replace('/', r"[/\\]")
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn extension_set(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .collect()
}

// Both separators are accepted so listings from the Windows backend classify
// the same way on any host.
fn base_name(path: &str) -> Option<&str> {
    path.rsplit(&['/', '\\'][..]).next().filter(|n| !n.is_empty())
}

fn extension(path: &str) -> Option<String> {
    let name = base_name(path)?;
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
