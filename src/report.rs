//! Rendering of audit results.

use std::io::{self, Write};
use std::path::Path;

use humansize::{format_size, BINARY};
use serde::Serialize;

use crate::audit::ScanOutcome;
use crate::ranking::{MatchRecord, RankedReport};

/// Printed instead of an empty list.
pub const NO_MATCHES: &str = "No files matched the audit criteria.";

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

pub fn size_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// `<path> | <size> MiB | <reason>`
pub fn format_line(record: &MatchRecord) -> String {
    format!(
        "{} | {:.2} MiB | {}",
        record.path.display(),
        size_mib(record.size_bytes),
        record.reason
    )
}

/// One line per entry, or the single no-match line.
pub fn render_lines(report: &RankedReport) -> Vec<String> {
    if report.is_empty() {
        return vec![NO_MATCHES.to_string()];
    }
    report.iter().map(format_line).collect()
}

pub fn render_text(report: &RankedReport) -> String {
    let mut output = render_lines(report).join("\n");
    output.push('\n');
    output
}

/// Closing line with counters and the reclaimable total.
pub fn summary(outcome: &ScanOutcome) -> String {
    format!(
        "{} flagged, {} reclaimable ({} examined, {} eligible, {} skipped in {:.1}s)",
        outcome.report.len(),
        format_size(outcome.report.total_bytes(), BINARY),
        outcome.examined,
        outcome.eligible,
        outcome.skipped,
        outcome.elapsed.as_secs_f64()
    )
}

/// Write the report lines to `out`, mirroring each one to the log.
pub fn emit<W: Write>(outcome: &ScanOutcome, out: &mut W) -> io::Result<()> {
    for line in render_lines(&outcome.report) {
        tracing::info!(critical = true, "{}", line);
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    root: &'a Path,
    examined: u64,
    eligible: u64,
    skipped: u64,
    elapsed_ms: u64,
    total_bytes: u64,
    matches: &'a RankedReport,
}

pub fn render_json(root: &Path, outcome: &ScanOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        root,
        examined: outcome.examined,
        eligible: outcome.eligible,
        skipped: outcome.skipped,
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        total_bytes: outcome.report.total_bytes(),
        matches: &outcome.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::TopN;
    use std::path::PathBuf;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn outcome(records: Vec<MatchRecord>) -> ScanOutcome {
        let mut ranker = TopN::with_slack(20, 100);
        for r in records {
            ranker.offer(r);
        }
        ScanOutcome {
            eligible: 3,
            examined: 10,
            skipped: 1,
            report: ranker.finalize(),
            elapsed: Duration::from_millis(1500),
        }
    }

    fn dsc() -> MatchRecord {
        MatchRecord {
            path: PathBuf::from("/data/DSC_old.bak"),
            size_bytes: 600 * MIB,
            reason: "Installation backup prefix match".to_string(),
        }
    }

    #[test]
    fn test_format_line_two_decimals() {
        assert_eq!(
            format_line(&dsc()),
            "/data/DSC_old.bak | 600.00 MiB | Installation backup prefix match"
        );

        let odd = MatchRecord {
            size_bytes: 500 * MIB + MIB / 3,
            ..dsc()
        };
        assert!(format_line(&odd).contains("| 500.33 MiB |"));
    }

    #[test]
    fn test_empty_report_has_single_line() {
        let lines = render_lines(&RankedReport::default());
        assert_eq!(lines, vec![NO_MATCHES.to_string()]);
    }

    #[test]
    fn test_emit_writes_lines() {
        let mut out = Vec::new();
        emit(&outcome(vec![dsc()]), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("/data/DSC_old.bak | 600.00 MiB"));
    }

    #[test]
    fn test_summary() {
        let s = summary(&outcome(vec![dsc()]));
        assert!(s.starts_with("1 flagged, 600 MiB reclaimable"));
        assert!(s.contains("10 examined"));
        assert!(s.contains("1.5s"));
    }

    #[test]
    fn test_json_report() {
        let json = render_json(Path::new("/data"), &outcome(vec![dsc()])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["root"], "/data");
        assert_eq!(value["total_bytes"], 600 * MIB);
        assert_eq!(value["matches"][0]["path"], "/data/DSC_old.bak");
        assert_eq!(value["matches"][0]["reason"], "Installation backup prefix match");
    }
}
