//! Run log: progress messages and per-step failures.
//!
//! The processor never logs through a global; it is handed a [`ProcessLog`]
//! for the duration of one run.

use std::cell::RefCell;

use tracing::{error, info, warn};

use crate::config::BookId;
use crate::error::Error;
use crate::processor::Step;

/// Sink for everything a run reports.
pub trait ProcessLog {
    /// Progress or informational message.
    fn message(&self, message: &str);

    /// A step failed. `step.is_fatal()` tells whether the run stops.
    fn failure(&self, step: Step, error: &Error);
}

impl<L: ProcessLog + ?Sized> ProcessLog for &L {
    fn message(&self, message: &str) {
        (**self).message(message)
    }

    fn failure(&self, step: Step, error: &Error) {
        (**self).failure(step, error)
    }
}

/// Forwards to `tracing`, tagging every event with the book id.
#[derive(Debug, Clone)]
pub struct TracingLog {
    book_id: BookId,
}

impl TracingLog {
    pub fn new(book_id: BookId) -> Self {
        Self { book_id }
    }
}

impl ProcessLog for TracingLog {
    fn message(&self, message: &str) {
        info!(book_id = %self.book_id, "{message}");
    }

    fn failure(&self, step: Step, err: &Error) {
        if step.is_fatal() {
            error!(book_id = %self.book_id, step = %step, error = %err, "Processing aborted");
        } else {
            warn!(book_id = %self.book_id, step = %step, error = %err, "Step failed, continuing");
        }
    }
}

/// One recorded log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Message(String),
    Failure { step: Step, error: String },
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: RefCell<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Recorded messages, without failures.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Message(message) => Some(message.clone()),
                LogEntry::Failure { .. } => None,
            })
            .collect()
    }

    /// Recorded failures as `(step, rendered error)`.
    pub fn failures(&self) -> Vec<(Step, String)> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Failure { step, error } => Some((*step, error.clone())),
                LogEntry::Message(_) => None,
            })
            .collect()
    }
}

impl ProcessLog for MemoryLog {
    fn message(&self, message: &str) {
        self.entries.borrow_mut().push(LogEntry::Message(message.to_string()));
    }

    fn failure(&self, step: Step, error: &Error) {
        self.entries.borrow_mut().push(LogEntry::Failure {
            step,
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryLog::new();
        let by_ref: &dyn ProcessLog = &log;

        by_ref.message("No fonts found, skipping...");
        by_ref.failure(Step::Document, &Error::NoBody("a.xhtml".into()));
        by_ref.message("Saved file: out/a.xhtml");

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.messages(), ["No fonts found, skipping...", "Saved file: out/a.xhtml"]);
        assert_eq!(
            log.failures(),
            [(Step::Document, "No body section found in a.xhtml".to_string())]
        );
    }
}
