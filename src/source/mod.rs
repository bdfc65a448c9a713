//! Metadata sources: lazy streams of `(path, size, mtime)` for every regular
//! file under a root.
//!
//! Platform divergence is confined here. The external backends delegate to the
//! host's bulk listing tools; [`WalkSource`] walks in-process. All of them stay
//! on the root's device, skip symbolic links and honor the exclusion zones.

mod entry;
mod exclusions;
mod find;
mod powershell;
mod process;
mod walk;

pub use entry::{parse_record, EntryResult, FileEntry, SkippedEntry};
pub use exclusions::{Exclusions, POSIX_VIRTUAL_FS_PATHS, WINDOWS_EXCLUDED_DIRS};
pub use find::FindStatSource;
pub use powershell::PowerShellSource;
pub use walk::WalkSource;

use std::path::Path;

use crate::config::{Backend, ScannerConfig};
use crate::error::Result;

/// Boxed stream of entries produced by a source.
pub type FileEntries = Box<dyn Iterator<Item = EntryResult> + Send>;

/// Trait for enumeration backends.
///
/// `entries` fails only when the backend cannot be started. Problems with
/// individual files are reported in-stream as [`SkippedEntry`] items.
pub trait MetadataSource: Send + Sync {
    /// Short identifier (e.g., "find").
    fn name(&self) -> &'static str;

    /// Start enumerating `root`.
    fn entries(&self, root: &Path) -> Result<FileEntries>;
}

/// Build the source for the requested backend.
pub fn from_config(backend: Backend, config: &ScannerConfig) -> Box<dyn MetadataSource> {
    match backend {
        Backend::Auto if cfg!(windows) => Box::new(PowerShellSource::new(config)),
        Backend::Auto => Box::new(FindStatSource::new(config)),
        Backend::Find => Box::new(FindStatSource::new(config)),
        Backend::Powershell => Box::new(PowerShellSource::new(config)),
        Backend::Walk => Box::new(WalkSource::new(config)),
    }
}
