//! Enrichment loop.
//!
//! Takes a snapshot of the candidate ids for a job, walks them in
//! batches of `batch_size`, and for each property: reloads it, asks the
//! generator for text, writes the result in one transaction, and sleeps
//! for the fixed item delay. One property failing never stops the run.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::report::BatchReport;
use crate::llm::{self, TextGenerator};
use crate::storage::Store;
use crate::types::{EnrichError, JobKind, Property, PropertyData};

/// Characters of review text echoed to the log.
const REVIEW_PREVIEW_CHARS: usize = 100;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Review job only: select every property and replace its reviews.
    pub force: bool,
    /// Pause between consecutive properties.
    pub item_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 2,
            force: false,
            item_delay: Duration::from_secs(1),
        }
    }
}

/// What happened to a single property.
#[derive(Debug)]
enum ItemOutcome {
    Written,
    Skipped(&'static str),
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

pub struct BatchEnricher<'a> {
    store: &'a Store,
    generator: &'a dyn TextGenerator,
    options: BatchOptions,
}

impl<'a> BatchEnricher<'a> {
    pub fn new(store: &'a Store, generator: &'a dyn TextGenerator, options: BatchOptions) -> Self {
        Self {
            store,
            generator,
            options,
        }
    }

    /// Run one job to completion. Only candidate selection can fail the
    /// whole run; per-property errors are logged and recorded.
    pub async fn run(&self, job: JobKind) -> Result<BatchReport> {
        if self.options.batch_size == 0 {
            return Err(EnrichError::Config("batch size must be >= 1".into()).into());
        }

        let mut report = BatchReport::new(job, self.generator.name());
        let ids = self
            .store
            .candidate_ids(job, self.options.force)
            .await
            .context("Candidate selection failed")?;
        report.candidates = ids.len();

        info!(
            run_id = %report.run_id,
            job = %job,
            provider = self.generator.name(),
            candidates = ids.len(),
            batch_size = self.options.batch_size,
            force = self.options.force,
            "Found properties to process"
        );

        let total = ids.len();
        for (batch_idx, batch) in ids.chunks(self.options.batch_size).enumerate() {
            report.batches += 1;
            info!(batch = batch_idx + 1, size = batch.len(), "Processing batch");

            for &id in batch {
                match self.process_one(job, id).await {
                    Ok(ItemOutcome::Written) => report.succeeded += 1,
                    Ok(ItemOutcome::Skipped(reason)) => {
                        warn!(property_id = id, job = %job, reason, "Nothing generated, skipping");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        error!(
                            property_id = id,
                            job = %job,
                            error = %format!("{e:#}"),
                            "Error processing property"
                        );
                        report.record_failure(id, format!("{e:#}"));
                    }
                }

                if report.processed() < total && !self.options.item_delay.is_zero() {
                    tokio::time::sleep(self.options.item_delay).await;
                }
            }
        }

        report.finish();
        info!(run_id = %report.run_id, "{report}");
        Ok(report)
    }

    async fn process_one(&self, job: JobKind, id: i64) -> Result<ItemOutcome> {
        let property = self
            .store
            .get_property(id)
            .await?
            .ok_or(EnrichError::PropertyNotFound(id))?;
        let data = PropertyData::from(&property);

        debug!(
            property_id = id,
            job = %job,
            title = %property.property_title,
            "Enriching property"
        );

        match job {
            JobKind::RewriteTitles => self.rewrite_title(&property, &data).await,
            JobKind::Descriptions => self.describe(&property, &data).await,
            JobKind::Summaries => self.summarize(&property, &data).await,
            JobKind::Reviews => self.review(&property, &data).await,
        }
    }

    async fn rewrite_title(&self, property: &Property, data: &PropertyData) -> Result<ItemOutcome> {
        let Some(title) = llm::rewrite_title(self.generator, data).await else {
            return Ok(ItemOutcome::Skipped("no title generated"));
        };
        self.store.update_title(property.id, &title).await?;
        info!(
            property_id = property.id,
            old = %property.property_title,
            new = %title,
            "Rewrote title"
        );
        Ok(ItemOutcome::Written)
    }

    async fn describe(&self, property: &Property, data: &PropertyData) -> Result<ItemOutcome> {
        let Some(description) = llm::generate_description(self.generator, data).await else {
            return Ok(ItemOutcome::Skipped("no description generated"));
        };
        self.store.set_description(property.id, &description).await?;
        info!(property_id = property.id, title = %property.property_title, "Generated description");
        Ok(ItemOutcome::Written)
    }

    async fn summarize(&self, property: &Property, data: &PropertyData) -> Result<ItemOutcome> {
        if property.description.is_none() {
            return Ok(ItemOutcome::Skipped("property has no description"));
        }
        let Some(summary) = llm::generate_summary(self.generator, data).await else {
            return Ok(ItemOutcome::Skipped("no summary generated"));
        };
        self.store.insert_summary(property.id, &summary).await?;
        info!(property_id = property.id, title = %property.property_title, "Generated summary");
        Ok(ItemOutcome::Written)
    }

    async fn review(&self, property: &Property, data: &PropertyData) -> Result<ItemOutcome> {
        let Some(parsed) = llm::generate_review(self.generator, data).await else {
            return Ok(ItemOutcome::Skipped("no review generated"));
        };
        if parsed.used_fallback {
            debug!(
                property_id = property.id,
                rating_source = ?parsed.rating_source,
                "Review response did not follow the requested format"
            );
        }
        let Some(text) = parsed.review.as_deref() else {
            return Ok(ItemOutcome::Skipped("response had no review text"));
        };

        let write = self
            .store
            .insert_review(property.id, parsed.rating, text, self.options.force)
            .await?;

        let preview: String = text.chars().take(REVIEW_PREVIEW_CHARS).collect();
        info!(
            property_id = property.id,
            title = %property.property_title,
            rating = parsed.rating,
            replaced = write.deleted,
            review = %preview,
            "Generated review"
        );
        Ok(ItemOutcome::Written)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
