//! Discovery of candidate scan roots.

use std::io::BufRead;
use std::path::{Path, PathBuf};

/// A mounted filesystem or drive that can be audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub device: Option<String>,
    pub fs_type: Option<String>,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            device: None,
            fs_type: None,
        }
    }

    /// Bytes available to unprivileged users, if the filesystem can be queried.
    pub fn available_bytes(&self) -> Option<u64> {
        available_bytes(&self.path)
    }
}

/// Roots present on this host, computed once per run.
pub fn discover() -> Vec<ScanRoot> {
    let roots = platform_roots();
    if roots.is_empty() {
        tracing::debug!("No mounts discovered, falling back to the filesystem root");
        return vec![ScanRoot::new(fallback_root())];
    }
    roots
}

#[cfg(unix)]
fn platform_roots() -> Vec<ScanRoot> {
    use std::fs::File;
    use std::io::BufReader;

    match File::open("/proc/mounts") {
        Ok(file) => parse_mounts(BufReader::new(file)),
        Err(e) => {
            tracing::debug!(error = %e, "Cannot read /proc/mounts");
            Vec::new()
        }
    }
}

#[cfg(windows)]
fn platform_roots() -> Vec<ScanRoot> {
    (b'A'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|p| p.exists())
        .map(ScanRoot::new)
        .collect()
}

#[cfg(not(any(unix, windows)))]
fn platform_roots() -> Vec<ScanRoot> {
    Vec::new()
}

fn fallback_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

/// Parse `/proc/mounts`, keeping real filesystems once each.
pub fn parse_mounts<R: BufRead>(reader: R) -> Vec<ScanRoot> {
    let mut roots: Vec<ScanRoot> = Vec::new();

    for line in reader.lines().map_while(|l| l.ok()) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let device = parts[0];
        let mount_point = unescape_mount_field(parts[1]);
        let fs_type = parts[2];

        if is_virtual_filesystem(fs_type, device, &mount_point) {
            continue;
        }
        let path = PathBuf::from(mount_point);
        if roots.iter().any(|r| r.path == path) {
            continue;
        }

        roots.push(ScanRoot {
            path,
            device: Some(device.to_string()),
            fs_type: Some(fs_type.to_string()),
        });
    }

    roots
}

/// Decode the octal escapes (`\040` for space) used in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_virtual_filesystem(fs_type: &str, device: &str, mount_point: &str) -> bool {
    const VIRTUAL_FS: &[&str] = &[
        "proc",
        "sysfs",
        "devtmpfs",
        "devpts",
        "tmpfs",
        "securityfs",
        "cgroup",
        "cgroup2",
        "pstore",
        "debugfs",
        "hugetlbfs",
        "mqueue",
        "fusectl",
        "configfs",
        "binfmt_misc",
        "autofs",
        "efivarfs",
        "tracefs",
        "bpf",
        "overlay",
        "squashfs",
        "nsfs",
        "ramfs",
    ];

    if VIRTUAL_FS.contains(&fs_type) {
        return true;
    }
    if mount_point.starts_with("/snap/") || mount_point.starts_with("/var/lib/docker/") {
        return true;
    }
    // NFS-style "host:/export" devices are real
    !device.starts_with('/') && device != "none" && !device.contains(':')
}

#[cfg(unix)]
fn available_bytes(path: &Path) -> Option<u64> {
    let stat = nix::sys::statvfs::statvfs(path).ok()?;
    Some(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

#[cfg(not(unix))]
fn available_bytes(_path: &Path) -> Option<u64> {
    None
}
