//! The station's append-only creation log.

use crate::message::CreationReport;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One logged creation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log (0-based)
    pub sequence: usize,

    /// The report as received, visited stack included
    pub report: CreationReport,
}

impl LogEntry {
    /// Rendered text of the entry.
    pub fn rendered(&self) -> String {
        self.report.to_string()
    }
}

/// Append-only log. No deduplication: the same report delivered twice is
/// logged twice.
#[derive(Debug, Default)]
pub struct StationLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl StationLog {
    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a report and returns the new entry.
    pub fn append(&self, report: CreationReport) -> LogEntry {
        let mut entries = self.lock();
        let entry = LogEntry {
            sequence: entries.len(),
            report,
        };
        entries.push(entry.clone());
        entry
    }

    /// Returns a copy of all entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Renders the whole log, one blank line before each entry.
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(|e| format!("\n{}", e.rendered()))
            .collect()
    }
}
