//! POSIX backend: `find -xdev ... -print0 | xargs -0 stat`.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use super::entry::parse_record;
use super::exclusions::Exclusions;
use super::process::{ensure_launchable, spawn, take_stdout, ProcessStream};
use super::{FileEntries, MetadataSource};
use crate::config::ScannerConfig;
use crate::error::Result;

/// `stat` output per file: size, mtime in epoch seconds, path, NUL.
const STAT_FORMAT: &str = "%s %Y %n\\0";

/// Bulk listing through `find` piped into `stat`.
///
/// `find` stays on the root's device (`-xdev`), prunes the exclusion zones and
/// emits only regular files, so symbolic links are never reported.
#[derive(Debug, Clone)]
pub struct FindStatSource {
    find_program: String,
    xargs_program: String,
    stat_program: String,
    exclusions: Exclusions,
}

impl FindStatSource {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            find_program: config.find_program.clone(),
            xargs_program: config.xargs_program.clone(),
            stat_program: config.stat_program.clone(),
            exclusions: Exclusions::posix(&config.exclude),
        }
    }

    /// Arguments passed to `find` for `root`.
    ///
    /// Paths are passed through as `OsString`, so roots that are not valid
    /// UTF-8 reach `find` unchanged.
    pub fn find_args(&self, root: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![root.into(), "-xdev".into(), "(".into()];
        for (i, path) in self.exclusions.below(root).prune_paths().iter().enumerate() {
            if i > 0 {
                args.push("-o".into());
            }
            args.push("-path".into());
            args.push(path.into());
        }
        args.extend(
            [")", "-prune", "-o", "-type", "f", "-print0"]
                .iter()
                .map(OsString::from),
        );
        args
    }

    /// Arguments passed to `xargs` to stat each listed path.
    pub fn stat_args(&self) -> Vec<String> {
        vec![
            "-0".to_string(),
            "-r".to_string(),
            self.stat_program.clone(),
            "--printf".to_string(),
            STAT_FORMAT.to_string(),
        ]
    }
}

impl MetadataSource for FindStatSource {
    fn name(&self) -> &'static str {
        "find"
    }

    fn entries(&self, root: &Path) -> Result<FileEntries> {
        ensure_launchable(&self.stat_program)?;

        let mut find = Command::new(&self.find_program);
        find.args(self.find_args(root)).stdin(Stdio::null());
        let mut find_child = spawn(&self.find_program, &mut find)?;
        let find_stdout = match take_stdout(&self.find_program, &mut find_child) {
            Ok(out) => out,
            Err(e) => {
                let _ = find_child.kill();
                let _ = find_child.wait();
                return Err(e);
            }
        };

        let mut stat = Command::new(&self.xargs_program);
        stat.args(self.stat_args()).stdin(Stdio::from(find_stdout));
        let stat_child = spawn(&self.xargs_program, &mut stat).and_then(|mut child| {
            let out = take_stdout(&self.xargs_program, &mut child);
            out.map(|o| (child, o))
        });
        let (stat_child, stat_stdout) = match stat_child {
            Ok(pair) => pair,
            Err(e) => {
                let _ = find_child.kill();
                let _ = find_child.wait();
                return Err(e);
            }
        };

        let stream = ProcessStream::new(
            vec![
                (self.find_program.clone(), find_child),
                (self.xargs_program.clone(), stat_child),
            ],
            stat_stdout,
            0,
            Box::new(|record| Some(parse_record(record))),
        );

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source() -> FindStatSource {
        FindStatSource::new(&ScannerConfig::default())
    }

    fn find_args(source: &FindStatSource, root: &Path) -> Vec<String> {
        source
            .find_args(root)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_find_args_prune_virtual_filesystems() {
        let args = find_args(&source(), Path::new("/"));

        assert_eq!(args[0], "/");
        assert_eq!(args[1], "-xdev");
        assert!(args.windows(2).any(|w| w == ["-path", "/proc"]));
        assert!(args.windows(2).any(|w| w == ["-path", "/run"]));
        assert_eq!(
            &args[args.len() - 6..],
            &[")", "-prune", "-o", "-type", "f", "-print0"]
        );
    }

    #[test]
    fn test_find_args_include_extra_excludes() {
        let config = ScannerConfig {
            exclude: vec![PathBuf::from("/mnt/snapshots")],
            ..ScannerConfig::default()
        };
        let args = find_args(&FindStatSource::new(&config), Path::new("/mnt"));

        assert!(args.windows(2).any(|w| w == ["-path", "/mnt/snapshots"]));
        assert_eq!(args.iter().filter(|a| *a == "-o").count(), 5);
    }

    #[test]
    fn test_find_args_keep_zones_below_root_only() {
        let config = ScannerConfig {
            exclude: vec![PathBuf::from("/run/media/usb/.snapshots/")],
            ..ScannerConfig::default()
        };
        let args = find_args(&FindStatSource::new(&config), Path::new("/run/media/usb"));

        assert!(!args.iter().any(|a| a == "/run"));
        assert!(args.windows(2).any(|w| w == ["-path", "/run/media/usb/.snapshots"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_args_preserve_non_utf8_root() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new(OsStr::from_bytes(b"/data/caf\xe9"));
        let args = source().find_args(root);
        assert_eq!(args[0].as_os_str(), root.as_os_str());
    }

    #[test]
    fn test_stat_args() {
        let args = source().stat_args();
        assert_eq!(args, vec!["-0", "-r", "stat", "--printf", "%s %Y %n\\0"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lists_regular_files_only() {
        use std::fs;

        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"hello").unwrap();
        fs::write(root.join("sub/b name.txt"), b"hi").unwrap();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link")).unwrap();

        let mut entries: Vec<_> = source()
            .entries(&root)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, root.join("a.txt"));
        assert_eq!(entries[0].size_bytes, 5);
        assert_eq!(entries[1].path, root.join("sub/b name.txt"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_root_inside_excluded_zone_matches_walk() {
        use crate::source::WalkSource;
        use std::fs;

        let tmp = tempfile::TempDir::new().unwrap();
        let zone = tmp.path().canonicalize().unwrap();
        let root = zone.join("media/USB");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("BACKUP_old.iso"), b"data").unwrap();

        let config = ScannerConfig {
            exclude: vec![zone.clone()],
            ..ScannerConfig::default()
        };
        fn paths(source: &dyn MetadataSource, root: &Path) -> Vec<PathBuf> {
            source
                .entries(root)
                .unwrap()
                .map(|e| e.unwrap().path)
                .collect()
        }

        let walked = paths(&WalkSource::new(&config), &root);
        let found = paths(&FindStatSource::new(&config), &root);
        assert_eq!(walked, vec![root.join("BACKUP_old.iso")]);
        assert_eq!(found, walked);
    }

    #[test]
    fn test_missing_stat_is_launch_failure() {
        let config = ScannerConfig {
            stat_program: "/nonexistent/stat".to_string(),
            ..ScannerConfig::default()
        };
        let result = FindStatSource::new(&config).entries(Path::new("/tmp"));
        assert!(matches!(
            result,
            Err(crate::error::AuditError::BackendLaunch { .. })
        ));
    }

    #[test]
    fn test_missing_find_is_launch_failure() {
        let config = ScannerConfig {
            find_program: "/nonexistent/find".to_string(),
            ..ScannerConfig::default()
        };
        let result = FindStatSource::new(&config).entries(Path::new("/tmp"));
        assert!(matches!(
            result,
            Err(crate::error::AuditError::BackendLaunch { .. })
        ));
    }
}
