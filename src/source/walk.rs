//! In-process backend built on `walkdir`.

use std::path::Path;
use walkdir::WalkDir;

use super::entry::{FileEntry, SkippedEntry};
use super::exclusions::Exclusions;
use super::{FileEntries, MetadataSource};
use crate::config::ScannerConfig;
use crate::error::Result;

/// Same-device directory walk that never follows symbolic links.
#[derive(Debug, Clone)]
pub struct WalkSource {
    exclusions: Exclusions,
}

impl WalkSource {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            exclusions: Exclusions::native(&config.exclude),
        }
    }

    pub fn with_exclusions(exclusions: Exclusions) -> Self {
        Self { exclusions }
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }
}

impl MetadataSource for WalkSource {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn entries(&self, root: &Path) -> Result<FileEntries> {
        let exclusions = self.exclusions.below(root);
        let walker = WalkDir::new(root)
            .follow_links(false)
            .same_file_system(true)
            .into_iter()
            .filter_entry(move |e| !exclusions.is_excluded(e.path()));

        let entries = walker.filter_map(|result| {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    // Handle permission errors gracefully
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    return Some(Err(SkippedEntry::Unreadable {
                        path,
                        message: err.to_string(),
                    }));
                }
            };

            if !entry.file_type().is_file() {
                return None;
            }
            if entry.path().to_str().is_none() {
                return Some(Err(SkippedEntry::Undecodable));
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    return Some(Err(SkippedEntry::Unreadable {
                        path: entry.path().to_path_buf(),
                        message: err.to_string(),
                    }))
                }
            };
            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(err) => {
                    return Some(Err(SkippedEntry::Unreadable {
                        path: entry.path().to_path_buf(),
                        message: err.to_string(),
                    }))
                }
            };

            Some(Ok(FileEntry::new(entry.into_path(), metadata.len(), modified)))
        });

        Ok(Box::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_structure() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        File::create(root.join("file1.txt"))
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        fs::create_dir(root.join("subdir")).unwrap();
        File::create(root.join("subdir/nested.bak"))
            .unwrap()
            .write_all(b"nested content")
            .unwrap();
        fs::create_dir(root.join("skipme")).unwrap();
        File::create(root.join("skipme/hidden.bak")).unwrap();

        dir
    }

    fn collect(source: &WalkSource, root: &Path) -> Vec<FileEntry> {
        let mut entries: Vec<_> = source
            .entries(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    #[test]
    fn test_walk_lists_files_with_sizes() {
        let dir = create_test_structure();
        let source = WalkSource::with_exclusions(Exclusions::posix(&[]));

        let entries = collect(&source, dir.path());

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, dir.path().join("file1.txt"));
        assert_eq!(entries[0].size_bytes, 5);
    }

    #[test]
    fn test_walk_prunes_excluded_paths() {
        let dir = create_test_structure();
        let source = WalkSource::with_exclusions(Exclusions::posix(&[dir.path().join("skipme")]));

        let entries = collect(&source, dir.path());

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.path.starts_with(dir.path().join("skipme"))));
    }

    #[test]
    fn test_walk_root_inside_excluded_zone() {
        let dir = create_test_structure();
        let zone = dir.path().to_path_buf();
        let source = WalkSource::with_exclusions(Exclusions::posix(&[zone.clone()]));

        let entries = collect(&source, &zone.join("subdir"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, zone.join("subdir/nested.bak"));

        assert_eq!(collect(&source, &zone).len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let dir = create_test_structure();
        std::os::unix::fs::symlink(dir.path().join("file1.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("subdir"), dir.path().join("linkdir")).unwrap();
        let source = WalkSource::with_exclusions(Exclusions::posix(&[]));

        let entries = collect(&source, dir.path());

        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| !e.path.ends_with("link.txt")));
    }

    #[test]
    fn test_walk_nonexistent_root_yields_skip() {
        let source = WalkSource::with_exclusions(Exclusions::posix(&[]));
        let items: Vec<_> = source
            .entries(Path::new("/nonexistent/path/12345"))
            .unwrap()
            .collect();

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(SkippedEntry::Unreadable { .. })));
    }
}
