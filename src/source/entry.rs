use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Metadata for one regular file, as produced by a metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path to the file
    pub path: PathBuf,

    /// Apparent size in bytes
    pub size_bytes: u64,

    /// Last modification time
    pub modified_at: SystemTime,
}

/// Why a record from the backend did not become a [`FileEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedEntry {
    /// Path bytes were not valid UTF-8
    Undecodable,
    /// Record did not have the `<size> <mtime> <path>` shape
    Malformed(String),
    /// Entry could not be read or stat'ed
    Unreadable { path: PathBuf, message: String },
}

/// One item of a metadata stream.
pub type EntryResult = Result<FileEntry, SkippedEntry>;

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, modified_at: SystemTime) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            modified_at,
        }
    }

    /// Time elapsed between modification and `now`, `None` if modified in the future.
    pub fn age_at(&self, now: SystemTime) -> Option<Duration> {
        now.duration_since(self.modified_at).ok()
    }
}

/// Parse a `<size> <mtime-epoch-seconds> <path>` listing record.
pub fn parse_record(record: &[u8]) -> EntryResult {
    let mut fields = record.splitn(3, |b| *b == b' ');
    let (Some(size), Some(mtime), Some(path)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(SkippedEntry::Malformed(
            String::from_utf8_lossy(record).into_owned(),
        ));
    };

    let malformed = || SkippedEntry::Malformed(String::from_utf8_lossy(record).into_owned());

    let size_bytes = std::str::from_utf8(size)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(malformed)?;
    let mtime = std::str::from_utf8(mtime)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(malformed)?;
    let path = std::str::from_utf8(path).map_err(|_| SkippedEntry::Undecodable)?;
    if path.is_empty() {
        return Err(malformed());
    }

    Ok(FileEntry::new(path, size_bytes, epoch_seconds(mtime)))
}

fn epoch_seconds(secs: i64) -> SystemTime {
    let offset = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let entry = parse_record(b"1048576 1600000000 /data/dumps/full.dmp").unwrap();

        assert_eq!(entry.size_bytes, 1_048_576);
        assert_eq!(entry.path, PathBuf::from("/data/dumps/full.dmp"));
        assert_eq!(
            entry.modified_at,
            UNIX_EPOCH + Duration::from_secs(1_600_000_000)
        );
    }

    #[test]
    fn test_parse_record_keeps_spaces_in_path() {
        let entry = parse_record(b"10 0 /data/my backup file.iso").unwrap();
        assert_eq!(entry.path, PathBuf::from("/data/my backup file.iso"));
    }

    #[test]
    fn test_parse_record_windows_path() {
        let entry = parse_record(br"42 1700000000 C:\Backups\db.bak").unwrap();
        assert_eq!(entry.size_bytes, 42);
        assert_eq!(entry.path, PathBuf::from(r"C:\Backups\db.bak"));
    }

    #[test]
    fn test_parse_record_negative_mtime() {
        let entry = parse_record(b"1 -86400 /old").unwrap();
        assert_eq!(entry.modified_at, UNIX_EPOCH - Duration::from_secs(86_400));
    }

    #[test]
    fn test_parse_record_malformed() {
        assert!(matches!(
            parse_record(b"not-a-size 0 /x"),
            Err(SkippedEntry::Malformed(_))
        ));
        assert!(matches!(
            parse_record(b"12 /missing-mtime"),
            Err(SkippedEntry::Malformed(_))
        ));
        assert!(matches!(parse_record(b"12 0 "), Err(SkippedEntry::Malformed(_))));
        assert!(matches!(parse_record(b""), Err(SkippedEntry::Malformed(_))));
    }

    #[test]
    fn test_parse_record_undecodable_path() {
        assert_eq!(
            parse_record(b"12 0 /data/\xff\xfe.bin"),
            Err(SkippedEntry::Undecodable)
        );
    }

    #[test]
    fn test_age_at() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        let entry = FileEntry::new("/x", 1, UNIX_EPOCH + Duration::from_secs(400));
        assert_eq!(entry.age_at(now), Some(Duration::from_secs(600)));

        let future = FileEntry::new("/y", 1, UNIX_EPOCH + Duration::from_secs(2_000));
        assert_eq!(future.age_at(now), None);
    }
}
