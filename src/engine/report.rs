//! Per-run accounting for enrichment jobs.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::types::JobKind;

/// A property the run could not process.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub property_id: i64,
    pub reason: String,
}

/// Summary of one job run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub job: JobKind,
    pub provider: &'static str,
    pub candidates: usize,
    pub batches: usize,
    /// Items whose result was written.
    pub succeeded: usize,
    /// Items where the provider produced nothing usable.
    pub skipped: usize,
    pub failed: Vec<FailedItem>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn new(job: JobKind, provider: &'static str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            job,
            provider,
            candidates: 0,
            batches: 0,
            succeeded: 0,
            skipped: 0,
            failed: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn record_failure(&mut self, property_id: i64, reason: impl Into<String>) {
        self.failed.push(FailedItem {
            property_id,
            reason: reason.into(),
        });
    }

    /// Items attempted so far, whatever their outcome.
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {}: candidates={} batches={} succeeded={} skipped={} failed={} ({:.1}s)",
            self.job,
            self.provider,
            self.candidates,
            self.batches,
            self.succeeded,
            self.skipped,
            self.failed.len(),
            self.duration().num_milliseconds() as f64 / 1000.0,
        )
    }
}
