//! The durable report log.
//!
//! Diagnostics go to stderr through `tracing`; the report log is the
//! artifact an operator reads after a run. It records every divergent pair,
//! every name missing from Source A and, in audit mode, every pair's answers.

use crate::{
    answer::AnswerSet,
    core::{AuditEntry, ComparisonResult, Verdict},
    inventory::InventoryGap,
};
use chrono::Local;
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    sync::Mutex,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        })
    }
}

/// Receives the findings of a run.
pub trait ReportSink: Send + Sync {
    /// Records a classified pair. Only divergent pairs are written.
    fn record(&self, result: &ComparisonResult) -> io::Result<()>;

    /// Records one audit-mode observation.
    fn audit(&self, entry: &AuditEntry) -> io::Result<()>;

    /// Records every name of an inventory gap.
    fn gap(&self, gap: &InventoryGap) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

/// Renders the message part of a divergent pair's log line.
pub fn divergence_message(result: &ComparisonResult) -> String {
    let mut message = format!(
        "answers differ for {} after {} Source B attempt(s)\n  source A: {}\n  source B: {}",
        result.domain, result.attempts_used, result.last_a, result.last_b
    );
    if let Some(e) = &result.error_a {
        message.push_str(&format!("\n  source A error: {}", e));
    }
    if let Some(e) = &result.error_b {
        message.push_str(&format!("\n  source B error: {}", e));
    }
    message
}

pub fn audit_message(entry: &AuditEntry) -> String {
    let side = |answers: &AnswerSet, error: &Option<String>| match error {
        Some(e) => format!("{} ({})", answers, e),
        None => answers.to_string(),
    };
    format!(
        "{}\n  source A: {}\n  source B: {}",
        entry.domain,
        side(&entry.answer_a, &entry.error_a),
        side(&entry.answer_b, &entry.error_b)
    )
}

/// Writes `YYYY-MM-DD HH:MM:SS - LEVEL - message` lines to a file.
pub struct FileReportSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileReportSink {
    /// Opens the log, truncating it unless `truncate` is false.
    pub fn open(path: &Path, truncate: bool) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path)?;
        debug!(path = %path.display(), truncate, "Opened report log");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, level: Level, message: &str) -> io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("report log lock poisoned"))?;
        writeln!(writer, "{} - {} - {}", timestamp, level, message)
    }
}

impl ReportSink for FileReportSink {
    fn record(&self, result: &ComparisonResult) -> io::Result<()> {
        if result.verdict != Verdict::Divergent {
            return Ok(());
        }
        self.write_line(Level::Error, &divergence_message(result))
    }

    fn audit(&self, entry: &AuditEntry) -> io::Result<()> {
        self.write_line(Level::Info, &audit_message(entry))
    }

    fn gap(&self, gap: &InventoryGap) -> io::Result<()> {
        for result in gap.results() {
            self.write_line(
                Level::Error,
                &format!("{}: {} is not known to Source A", result.verdict, result.domain),
            )?;
        }
        self.write_line(Level::Error, &gap.to_string())
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .map_err(|_| io::Error::other("report log lock poisoned"))?
            .flush()
    }
}

/// Collects findings in memory, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryReportSink {
    pub results: Mutex<Vec<ComparisonResult>>,
    pub audits: Mutex<Vec<AuditEntry>>,
    pub gaps: Mutex<Vec<InventoryGap>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ComparisonResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn audits(&self) -> Vec<AuditEntry> {
        self.audits.lock().unwrap().clone()
    }

    pub fn gaps(&self) -> Vec<InventoryGap> {
        self.gaps.lock().unwrap().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ReportSink for MemoryReportSink {
    fn record(&self, result: &ComparisonResult) -> io::Result<()> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn audit(&self, entry: &AuditEntry) -> io::Result<()> {
        self.audits.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn gap(&self, gap: &InventoryGap) -> io::Result<()> {
        self.gaps.lock().unwrap().push(gap.clone());
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}
