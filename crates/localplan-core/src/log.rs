//! Leveled run log.
//!
//! Every entry is forwarded to `tracing` and kept with its timestamp so the
//! run can be written out as `plan.log`. Warnings and errors are counted
//! for the end-of-run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Level of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Severity::Info | Severity::Success => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
        }
    }

    /// Whether an entry at this level passes a `threshold` filter.
    pub fn at_least(self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "Info",
            Severity::Success => "Success",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        })
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "information" | "verbose" | "debug" => Ok(Severity::Info),
            "success" => Ok(Severity::Success),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown log severity: {}", other)),
        }
    }
}

/// A single timestamped run log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Collects the leveled trail of one run.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Mutex<Vec<LogEntry>>,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(outcome = "success", "{}", message);
        self.push(Severity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.fetch_add(1, Ordering::Relaxed);
        self.push(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.push(Severity::Error, message);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Snapshot of all entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Format entries at or above `threshold`, one per line.
    pub fn render(&self, threshold: Severity) -> String {
        self.lock()
            .iter()
            .filter(|e| e.severity.at_least(threshold))
            .map(|e| {
                format!(
                    "[{}] [{}] {}\n",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.severity.label(),
                    e.message
                )
            })
            .collect()
    }

    fn push(&self, severity: Severity, message: String) {
        self.lock().push(LogEntry {
            timestamp: Utc::now(),
            severity,
            message,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
