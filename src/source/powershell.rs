//! Windows backend: recursive `Get-ChildItem` listing through PowerShell.

use std::path::Path;
use std::process::{Command, Stdio};

use super::entry::parse_record;
use super::exclusions::Exclusions;
use super::process::{spawn, take_stdout, ProcessStream};
use super::{FileEntries, MetadataSource};
use crate::config::ScannerConfig;
use crate::error::Result;

/// Environment variable carrying the scan root to the script.
pub const ROOT_ENV: &str = "HOARD_SCAN_ROOT";

const SCRIPT: &str = "$ErrorActionPreference = 'SilentlyContinue'; \
     [Console]::OutputEncoding = [System.Text.Encoding]::UTF8; \
     Get-ChildItem -LiteralPath $env:HOARD_SCAN_ROOT -Recurse -File -Force -Attributes !ReparsePoint | \
     ForEach-Object { '{0} {1} {2}' -f $_.Length, \
     ([DateTimeOffset]$_.LastWriteTimeUtc).ToUnixTimeSeconds(), $_.FullName }";

/// Native recursive listing on Windows, one `<size> <mtime> <path>` line per file.
///
/// Reparse points (junctions, symlinks, mounted folders) are not listed or
/// descended into. System directories are filtered from the output here rather
/// than in the script, so the filtering is shared with tests on any host.
#[derive(Debug, Clone)]
pub struct PowerShellSource {
    program: String,
    exclusions: Exclusions,
}

impl PowerShellSource {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            program: config.powershell_program.clone(),
            exclusions: Exclusions::windows(&config.exclude),
        }
    }

    /// Script listing every regular file below the directory named by
    /// [`ROOT_ENV`]. The root travels through the environment, so it needs no
    /// quoting and is never re-encoded.
    pub fn script() -> &'static str {
        SCRIPT
    }
}

impl MetadataSource for PowerShellSource {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn entries(&self, root: &Path) -> Result<FileEntries> {
        let mut command = Command::new(&self.program);
        command
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(Self::script())
            .env(ROOT_ENV, root)
            .stdin(Stdio::null());

        let mut child = spawn(&self.program, &mut command)?;
        let stdout = match take_stdout(&self.program, &mut child) {
            Ok(out) => out,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let exclusions = self.exclusions.below(root);
        let stream = ProcessStream::new(
            vec![(self.program.clone(), child)],
            stdout,
            b'\n',
            Box::new(move |record| match parse_record(record) {
                Ok(entry) if exclusions.is_excluded(&entry.path) => None,
                other => Some(other),
            }),
        );

        Ok(Box::new(stream))
    }
}
