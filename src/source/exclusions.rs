use std::path::{Component, Path, PathBuf};

/// Linux virtual filesystem paths that are never enumerated.
/// These can report incorrect/huge sizes and cause scanning issues.
pub const POSIX_VIRTUAL_FS_PATHS: &[&str] = &["/proc", "/sys", "/dev", "/run"];

/// Windows system directories skipped wherever they appear.
pub const WINDOWS_EXCLUDED_DIRS: &[&str] = &[
    "System Volume Information",
    "$Recycle.Bin",
    "$WINDOWS.~BT",
    "$Windows.~WS",
    "$WinREAgent",
];

/// Exclusion zones for one platform plus user-configured extras.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    /// Absolute paths pruned together with everything below them
    paths: Vec<PathBuf>,
    /// Lower-cased directory names pruned at any depth
    dir_names: Vec<String>,
}

impl Exclusions {
    /// POSIX pseudo filesystems plus `extra` paths.
    pub fn posix(extra: &[PathBuf]) -> Self {
        let mut paths: Vec<PathBuf> = POSIX_VIRTUAL_FS_PATHS.iter().map(PathBuf::from).collect();
        paths.extend(extra.iter().map(|p| normalize(p)));
        Self {
            paths,
            dir_names: vec![],
        }
    }

    /// Windows system directories plus `extra` paths.
    pub fn windows(extra: &[PathBuf]) -> Self {
        Self {
            paths: extra.iter().map(|p| normalize(p)).collect(),
            dir_names: WINDOWS_EXCLUDED_DIRS.iter().map(|d| d.to_lowercase()).collect(),
        }
    }

    /// Exclusions for the platform this binary was built for.
    pub fn native(extra: &[PathBuf]) -> Self {
        if cfg!(windows) {
            Self::windows(extra)
        } else {
            Self::posix(extra)
        }
    }

    /// Exclusions that apply to a scan of `root`.
    ///
    /// Zones equal to the root or containing it are dropped, so only paths
    /// strictly below the root are ever pruned.
    pub fn below(&self, root: &Path) -> Self {
        Self {
            paths: self
                .paths
                .iter()
                .filter(|p| !root.starts_with(p))
                .cloned()
                .collect(),
            dir_names: self.dir_names.clone(),
        }
    }

    /// Paths that must be pruned from enumeration.
    pub fn prune_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.paths.iter().any(|p| path.starts_with(p)) {
            return true;
        }
        if self.dir_names.is_empty() {
            return false;
        }

        // Split on both separators: Windows listings are parsed on any host.
        let text = path.to_string_lossy();
        text.split(&['/', '\\'][..])
            .any(|part| self.dir_names.iter().any(|d| part.eq_ignore_ascii_case(d)))
    }
}

/// Drop `.` components and trailing separators; anchor relative entries at
/// the working directory.
fn normalize(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.is_absolute() {
        return cleaned;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(cleaned),
        Err(_) => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_virtual_fs() {
        let excl = Exclusions::posix(&[]);

        assert!(excl.is_excluded(Path::new("/proc")));
        assert!(excl.is_excluded(Path::new("/proc/1/status")));
        assert!(excl.is_excluded(Path::new("/dev/sda")));
        assert!(excl.is_excluded(Path::new("/sys/class/net")));
        assert!(excl.is_excluded(Path::new("/run/user/1000")));

        assert!(!excl.is_excluded(Path::new("/home/user")));
        assert!(!excl.is_excluded(Path::new("/var/log")));
        assert!(!excl.is_excluded(Path::new("/processes")));
    }

    #[test]
    fn test_extra_paths() {
        let excl = Exclusions::posix(&[PathBuf::from("/mnt/archive")]);

        assert!(excl.is_excluded(Path::new("/mnt/archive/old.tar")));
        assert!(!excl.is_excluded(Path::new("/mnt/archive2/old.tar")));
        assert_eq!(excl.prune_paths().len(), 5);
    }

    #[test]
    fn test_below_keeps_only_zones_under_root() {
        let excl = Exclusions::posix(&[PathBuf::from("/run/media/usb/snapshots")]);

        let scoped = excl.below(Path::new("/run/media/usb"));
        assert!(!scoped.is_excluded(Path::new("/run/media/usb/BACKUP_old.iso")));
        assert!(scoped.is_excluded(Path::new("/run/media/usb/snapshots/a.bak")));
        assert_eq!(scoped.prune_paths().len(), 4);

        let at_zone = excl.below(Path::new("/proc"));
        assert!(!at_zone.is_excluded(Path::new("/proc/1/status")));

        let from_top = excl.below(Path::new("/"));
        assert!(from_top.is_excluded(Path::new("/run/user/1000")));
    }

    #[test]
    fn test_extra_paths_are_normalized() {
        let excl = Exclusions::posix(&[PathBuf::from("/mnt/archive/"), PathBuf::from("scratch")]);
        let cwd = std::env::current_dir().unwrap();

        assert!(excl.prune_paths().contains(&PathBuf::from("/mnt/archive")));
        assert!(excl.prune_paths().contains(&cwd.join("scratch")));
        assert!(excl.is_excluded(&cwd.join("scratch/old.tar")));
    }

    #[test]
    fn test_windows_dirs_any_depth_case_insensitive() {
        let excl = Exclusions::windows(&[]);

        assert!(excl.is_excluded(Path::new(r"C:\System Volume Information\tracking.log")));
        assert!(excl.is_excluded(Path::new(r"D:\$RECYCLE.BIN\S-1-5\file.bak")));
        assert!(excl.is_excluded(Path::new(r"C:\$Windows.~BT\Sources\install.wim")));
        assert!(!excl.is_excluded(Path::new(r"C:\Backups\db.bak")));
    }
}
