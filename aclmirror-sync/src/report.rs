//! Structured results of bulk operations.

use serde::Serialize;
use std::fmt;

/// A bounded failure list: keeps the first `cap` records, counts all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureList<T = Failure> {
    cap: usize,
    total: usize,
    records: Vec<T>,
}

impl<T> FailureList<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            total: 0,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: T) {
        self.total += 1;
        if self.records.len() < self.cap {
            self.records.push(record);
        }
    }

    /// Exact number of failures, including those not retained.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The retained records, in insertion order.
    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// How many failures were counted but not retained.
    #[must_use]
    pub fn truncated(&self) -> usize {
        self.total - self.records.len()
    }
}

/// One failed item of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Human-readable item label, e.g. `#general (123…)` or a principal id.
    pub item: String,
    pub message: String,
}

impl Failure {
    pub fn new(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.message)
    }
}

impl fmt::Display for FailureList<Failure> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        if self.truncated() > 0 {
            write!(f, "...and {} more", self.truncated())?;
        }
        Ok(())
    }
}
