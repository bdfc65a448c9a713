//! Roots command implementation

use std::io::{self, Write};

use humansize::{format_size, BINARY};

use crate::error::{AuditError, Result};
use crate::roots::ScanRoot;

/// One-line description: path, filesystem type and free space when known.
pub fn describe(root: &ScanRoot) -> String {
    let mut details = Vec::new();
    if let Some(fs_type) = &root.fs_type {
        details.push(fs_type.clone());
    }
    if let Some(available) = root.available_bytes() {
        details.push(format!("{} free", format_size(available, BINARY)));
    }

    if details.is_empty() {
        root.path.display().to_string()
    } else {
        format!("{} ({})", root.path.display(), details.join(", "))
    }
}

/// Write a numbered list of `roots`, starting at 1.
pub fn write_list<W: Write>(roots: &[ScanRoot], out: &mut W) -> io::Result<()> {
    for (i, root) in roots.iter().enumerate() {
        writeln!(out, "{:>3}) {}", i + 1, describe(root))?;
    }
    Ok(())
}

/// Run the roots command
pub fn run(roots: &[ScanRoot]) -> Result<()> {
    let stdout = io::stdout();
    write_list(roots, &mut stdout.lock()).map_err(|source| AuditError::Io {
        path: "<stdout>".into(),
        source,
    })
}
