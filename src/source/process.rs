//! Streaming reader over the stdout of an external listing pipeline.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};

use super::entry::EntryResult;
use crate::error::{AuditError, Result};

/// Converts one raw record into an entry; `None` drops the record silently.
pub(crate) type RecordParser = Box<dyn Fn(&[u8]) -> Option<EntryResult> + Send>;

/// Spawn `command` with piped stdout/stderr, mapping spawn failure to a
/// backend launch error.
pub(crate) fn spawn(program: &str, command: &mut Command) -> Result<Child> {
    tracing::debug!(?command, "Launching enumeration backend");

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| AuditError::BackendLaunch {
            program: program.to_string(),
            source,
        })?;

    if let Some(stderr) = child.stderr.take() {
        drain_stderr(program.to_string(), stderr);
    }

    Ok(child)
}

/// Check that `program` can be started, for tools that only run behind another
/// launcher (`xargs`) whose own exit status would hide a missing binary.
pub(crate) fn ensure_launchable(program: &str) -> Result<()> {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|source| AuditError::BackendLaunch {
            program: program.to_string(),
            source,
        })
}

/// Take the child's stdout handle.
pub(crate) fn take_stdout(program: &str, child: &mut Child) -> Result<ChildStdout> {
    child.stdout.take().ok_or_else(|| AuditError::BackendLaunch {
        program: program.to_string(),
        source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not captured"),
    })
}

/// Log backend diagnostics (permission denied and the like) without letting
/// the pipe fill up.
fn drain_stderr(program: String, stderr: ChildStderr) {
    let spawned = std::thread::Builder::new()
        .name(format!("{}-stderr", program))
        .spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(|l| l.ok()) {
                tracing::debug!(backend = %program, "{}", line);
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Could not start stderr reader: {}", e);
    }
}

/// Lazy sequence of entries read from the last process of a pipeline.
///
/// End of stream is reached when the pipe closes. A non-zero exit status is
/// logged but is not an error: `find` exits 1 whenever it hits an unreadable
/// directory.
pub(crate) struct ProcessStream {
    children: Vec<(String, Child)>,
    reader: BufReader<Box<dyn Read + Send>>,
    delimiter: u8,
    parse: RecordParser,
    buf: Vec<u8>,
    finished: bool,
}

impl ProcessStream {
    pub(crate) fn new(
        children: Vec<(String, Child)>,
        stdout: impl Read + Send + 'static,
        delimiter: u8,
        parse: RecordParser,
    ) -> Self {
        Self {
            children,
            reader: BufReader::with_capacity(64 * 1024, Box::new(stdout)),
            delimiter,
            parse,
            buf: Vec::with_capacity(512),
            finished: false,
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        for (program, child) in &mut self.children {
            match child.wait() {
                Ok(status) if status.success() => {
                    tracing::debug!(backend = %program, "Enumeration backend finished");
                }
                Ok(status) => {
                    tracing::warn!(
                        backend = %program,
                        %status,
                        "Enumeration backend exited with non-zero status"
                    );
                }
                Err(e) => {
                    tracing::warn!(backend = %program, "Failed to reap enumeration backend: {}", e);
                }
            }
        }
    }
}

impl Iterator for ProcessStream {
    type Item = EntryResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(self.delimiter, &mut self.buf) {
                Ok(0) => {
                    self.finish();
                    return None;
                }
                Ok(_) => {
                    let mut record = self.buf.as_slice();
                    if record.last() == Some(&self.delimiter) {
                        record = &record[..record.len() - 1];
                    }
                    if record.last() == Some(&b'\r') {
                        record = &record[..record.len() - 1];
                    }
                    if record.is_empty() {
                        continue;
                    }
                    if let Some(item) = (self.parse)(record) {
                        return Some(item);
                    }
                }
                Err(e) => {
                    tracing::warn!("Enumeration pipe read failed: {}", e);
                    self.finish();
                    return None;
                }
            }
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Dropped before end of stream: stop the pipeline instead of leaving it running.
        for (_, child) in &mut self.children {
            let _ = child.kill();
        }
        self.finish();
    }
}
