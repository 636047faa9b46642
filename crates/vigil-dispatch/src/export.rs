//! Newline delimited JSON export of problems and recoveries.

use crate::error::Result;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_common::types::Tag;

/// Default delay before a failed file operation is retried.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportHost {
    pub host: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemRecord {
    pub clock: i64,
    pub ns: i32,
    pub value: i32,
    pub eventid: u64,
    pub name: String,
    pub severity: i32,
    pub hosts: Vec<ExportHost>,
    pub groups: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryRecord {
    pub clock: i64,
    pub ns: i32,
    pub value: i32,
    pub eventid: u64,
    pub p_eventid: u64,
}

/// Append-only file capped at `size_limit` bytes.
///
/// When a line would overflow the cap the file is renamed with an `.old`
/// suffix, replacing any previous one, and a fresh file is started. Open,
/// write and rename failures are logged and retried after `retry_delay`
/// until they succeed.
pub struct ExportWriter {
    path: PathBuf,
    old_path: PathBuf,
    file: Option<File>,
    written: u64,
    size_limit: u64,
    retry_delay: Duration,
}

impl ExportWriter {
    pub fn new(path: PathBuf, size_limit: u64, retry_delay: Duration) -> Self {
        let mut old = path.clone().into_os_string();
        old.push(".old");
        Self {
            path,
            old_path: PathBuf::from(old),
            file: None,
            written: 0,
            size_limit,
            retry_delay,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn retry<T>(&self, what: &str, mut op: impl FnMut() -> std::io::Result<T>) -> T {
        loop {
            match op() {
                Ok(value) => return value,
                Err(e) => {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        retry_secs = self.retry_delay.as_secs(),
                        "Export file {what} failed, retrying"
                    );
                    std::thread::sleep(self.retry_delay);
                }
            }
        }
    }

    fn open(&mut self) {
        let path = self.path.clone();
        let file = self.retry("open", || OpenOptions::new().create(true).append(true).open(&path));
        self.written = self.retry("stat", || file.metadata()).len();
        self.file = Some(file);
    }

    fn rotate(&mut self) {
        self.file = None;
        let (from, to) = (self.path.clone(), self.old_path.clone());
        self.retry("rename", || std::fs::rename(&from, &to));
        tracing::debug!(path = %self.path.display(), "Export file rotated");
        self.open();
    }

    /// Appends one line; a trailing newline is added.
    pub fn write_line(&mut self, line: &str) {
        if self.file.is_none() {
            self.open();
        }

        let len = line.len() as u64 + 1;
        if self.size_limit != 0 && self.written > 0 && self.written + len > self.size_limit {
            self.rotate();
        }

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        loop {
            let result = match self.file.as_mut() {
                Some(file) => file.write_all(&buf).and_then(|_| file.flush()),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "export file is closed")),
            };
            match result {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        retry_secs = self.retry_delay.as_secs(),
                        "Export file write failed, retrying"
                    );
                    std::thread::sleep(self.retry_delay);
                    self.file = None;
                    self.open();
                }
            }
        }
        self.written += len;
    }
}

/// Writes problem and recovery records for one process.
pub struct ProblemExporter {
    writer: ExportWriter,
}

impl ProblemExporter {
    /// File `problems-<process>-<num>.ndjson` inside `dir`.
    pub fn new(dir: &Path, process: &str, num: u32, size_limit: u64, retry_delay: Duration) -> Self {
        let path = dir.join(format!("problems-{process}-{num}.ndjson"));
        Self {
            writer: ExportWriter::new(path, size_limit, retry_delay),
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn export_problem(&mut self, record: &ProblemRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_line(&line);
        Ok(())
    }

    pub fn export_recovery(&mut self, record: &RecoveryRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_line(&line);
        Ok(())
    }
}
