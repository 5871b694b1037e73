//! Batch engine: candidate selection, generation, persistence and pacing.

pub mod enricher;
pub mod report;

pub use crate::types::JobKind;
pub use enricher::{BatchEnricher, BatchOptions};
pub use report::{BatchReport, FailedItem};
