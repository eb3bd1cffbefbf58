//! Job driver.
//!
//! A run extracts every requested category from one rendered page, then
//! normalizes, deduplicates and validates the result, and finally compares
//! it with the job's previous run and records a new snapshot.

use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent, TracingSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trawl_browser::RenderedPage;
use trawl_changes::{deduplicate, ChangeDetector, ChangeSet, ChangesError, SnapshotStore};
use trawl_core::{AppConfig, Category, JobId, Record, ScrapeResult, ThresholdPolicy};
use trawl_extract::{ExtractError, StrategyRegistry};
use trawl_normalize::{normalize_result, ErrorLogEntry, ThresholdStatus, Validator};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    /// Normalized, deduplicated and validated records
    pub result: ScrapeResult,
    /// Records rejected by validation
    pub errors: Vec<ErrorLogEntry>,
    /// Records that reached validation
    pub records_seen: usize,
    pub threshold: ThresholdStatus,
    /// Categories whose extraction failed and were left empty
    pub failed_categories: Vec<Category>,
    /// `None` when change tracking is off, the run was cancelled, or the
    /// snapshot could not be written
    pub changes: Option<ChangeSet>,
    pub snapshot_path: Option<PathBuf>,
    pub cancelled: bool,
}

/// Runs extraction jobs.
pub struct Pipeline {
    registry: StrategyRegistry,
    error_threshold: f64,
    threshold_policy: ThresholdPolicy,
    key_fields: BTreeMap<Category, Vec<String>>,
    snapshots: Option<SnapshotStore>,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Pipeline configured from `config`, with snapshots under
    /// [`AppConfig::snapshot_dir`] when enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .with_registry(StrategyRegistry::from_config(&config.extraction)?)
            .with_error_threshold(config.validation.error_threshold)
            .with_threshold_policy(config.validation.threshold_policy)
            .with_key_fields(config.changes.key_fields.clone());

        if config.snapshots.enabled {
            builder = builder.with_snapshot_store(SnapshotStore::new(config.snapshot_dir()?));
        }

        Ok(builder.build())
    }

    /// Run one job against an already loaded page.
    ///
    /// Categories run in request order, except that text runs last because
    /// it removes page regions other strategies read. Cancellation is
    /// checked before each strategy; a cancelled run keeps what it
    /// extracted and records no snapshot.
    ///
    /// # Errors
    /// With [`ThresholdPolicy::Abort`], a run whose validation error rate
    /// exceeds the threshold returns [`PipelineError::ThresholdExceeded`]
    /// carrying the partial outcome.
    pub async fn run(
        &self,
        job_id: &JobId,
        page: &dyn RenderedPage,
        categories: &[Category],
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let base_url = page.base_url().to_string();
        let order = run_order(categories);

        self.sink.emit(PipelineEvent::JobStarted {
            job_id: job_id.clone(),
            url: base_url.clone(),
            categories: order.clone(),
        });

        let mut extracted = ScrapeResult::default();
        let mut failed_categories = Vec::new();
        let mut cancelled = false;

        for (position, &category) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                self.sink.emit(PipelineEvent::Cancelled {
                    job_id: job_id.clone(),
                    skipped: order[position..].to_vec(),
                });
                break;
            }

            match self.extract(page, &base_url, category).await {
                Ok(records) => {
                    self.sink.emit(PipelineEvent::CategoryExtracted {
                        category,
                        count: records.len(),
                    });
                    extracted.set_records(category, records);
                }
                Err(e) => {
                    self.sink.emit(PipelineEvent::StrategyFailed {
                        category,
                        error: e.to_string(),
                    });
                    failed_categories.push(category);
                    extracted.set_records(category, Vec::new());
                }
            }
        }

        let normalized = normalize_result(extracted, &base_url);
        let deduplicated = self.deduplicate(normalized);

        let mut validator = Validator::new(self.error_threshold);
        let report = validator.validate_result(deduplicated);
        for entry in &report.errors {
            self.sink.emit(PipelineEvent::RecordRejected {
                category: entry.category,
                index: entry.index,
                message: entry.message.clone(),
            });
        }

        let mut outcome = JobOutcome {
            job_id: job_id.clone(),
            result: report.result,
            errors: report.errors,
            records_seen: report.total,
            threshold: report.threshold,
            failed_categories,
            changes: None,
            snapshot_path: None,
            cancelled,
        };

        if let ThresholdStatus::Exceeded {
            ratio,
            invalid,
            total,
            threshold,
        } = outcome.threshold
        {
            self.sink.emit(PipelineEvent::ThresholdExceeded {
                ratio,
                invalid,
                total,
                threshold,
            });
            if self.threshold_policy == ThresholdPolicy::Abort {
                self.finish(&outcome);
                return Err(PipelineError::ThresholdExceeded(Box::new(outcome)));
            }
        }

        if !cancelled {
            if let Some(store) = &self.snapshots {
                self.record_changes(store, &mut outcome).await;
            }
        }

        self.finish(&outcome);
        Ok(outcome)
    }

    async fn extract(
        &self,
        page: &dyn RenderedPage,
        base_url: &str,
        category: Category,
    ) -> std::result::Result<Vec<Record>, ExtractError> {
        let strategy = self.registry.require(category)?;
        let records = strategy.extract(page, base_url).await?;
        Ok(records
            .into_iter()
            .filter(|record| strategy.validate(record))
            .collect())
    }

    fn deduplicate(&self, mut result: ScrapeResult) -> ScrapeResult {
        for (&category, fields) in &self.key_fields {
            let fields = fields.as_slice();
            match category {
                Category::Products => {
                    result.products = result
                        .products
                        .take()
                        .map(|products| self.deduplicate_list(category, products, fields));
                }
                Category::Images => {
                    result.images = result
                        .images
                        .take()
                        .map(|images| self.deduplicate_list(category, images, fields));
                }
                Category::Assets => {
                    result.assets = result
                        .assets
                        .take()
                        .map(|assets| self.deduplicate_list(category, assets, fields));
                }
                Category::Contacts | Category::Text => {}
            }
        }
        result
    }

    fn deduplicate_list<R: Serialize + Clone>(
        &self,
        category: Category,
        records: Vec<R>,
        fields: &[String],
    ) -> Vec<R> {
        let before = records.len();
        match deduplicate_or_keep(records, fields) {
            Ok(unique) => {
                if unique.len() < before {
                    self.sink.emit(PipelineEvent::Deduplicated {
                        category,
                        removed: before - unique.len(),
                    });
                }
                unique
            }
            Err((records, e)) => {
                self.sink.emit(PipelineEvent::DeduplicationFailed {
                    category,
                    error: e.to_string(),
                });
                records
            }
        }
    }

    async fn record_changes(&self, store: &SnapshotStore, outcome: &mut JobOutcome) {
        let detector = ChangeDetector::new(store.clone(), self.key_fields.clone());
        let job_id = outcome.job_id.clone();
        let result = outcome.result.clone();
        let unavailable = outcome.failed_categories.clone();

        let recorded = tokio::task::spawn_blocking(move || {
            detector.record_run(&job_id, &result, &unavailable)
        })
        .await;

        match recorded {
            Ok(Ok(run)) => {
                self.sink.emit(PipelineEvent::ChangesDetected {
                    run: run.run,
                    new: run.changes.new_count(),
                    updated: run.changes.updated_count(),
                    removed: run.changes.removed_count(),
                    snapshot: run.snapshot_path.clone(),
                });
                outcome.changes = Some(run.changes);
                outcome.snapshot_path = Some(run.snapshot_path);
            }
            Ok(Err(e)) => self.sink.emit(PipelineEvent::SnapshotFailed {
                error: e.to_string(),
            }),
            Err(e) => self.sink.emit(PipelineEvent::SnapshotFailed {
                error: format!("snapshot task failed: {e}"),
            }),
        }
    }

    fn finish(&self, outcome: &JobOutcome) {
        let records = outcome
            .result
            .categories()
            .into_iter()
            .map(|c| outcome.result.count(c))
            .sum();

        self.sink.emit(PipelineEvent::JobFinished {
            job_id: outcome.job_id.clone(),
            records,
            errors: outcome.errors.len(),
            cancelled: outcome.cancelled,
        });
    }
}

/// `records` without identity duplicates, or the untouched input with the
/// error when identities cannot be computed.
fn deduplicate_or_keep<R: Serialize + Clone>(
    records: Vec<R>,
    fields: &[String],
) -> std::result::Result<Vec<R>, (Vec<R>, ChangesError)> {
    match deduplicate(records.clone(), fields) {
        Ok(unique) => Ok(unique),
        Err(e) => Err((records, e)),
    }
}

/// Requested categories without repeats, text moved to the end.
fn run_order(categories: &[Category]) -> Vec<Category> {
    let mut order: Vec<Category> = Vec::with_capacity(categories.len());
    for &category in categories {
        if !order.contains(&category) {
            order.push(category);
        }
    }
    if let Some(position) = order.iter().position(|c| *c == Category::Text) {
        let text = order.remove(position);
        order.push(text);
    }
    order
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    registry: StrategyRegistry,
    error_threshold: f64,
    threshold_policy: ThresholdPolicy,
    key_fields: BTreeMap<Category, Vec<String>>,
    snapshots: Option<SnapshotStore>,
    sink: Arc<dyn EventSink>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            registry: StrategyRegistry::default(),
            error_threshold: config.validation.error_threshold,
            threshold_policy: config.validation.threshold_policy,
            key_fields: config.changes.key_fields,
            snapshots: None,
            sink: Arc::new(TracingSink),
        }
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_error_threshold(mut self, threshold: f64) -> Self {
        self.error_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_threshold_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.threshold_policy = policy;
        self
    }

    /// Key fields for deduplication and change detection.
    #[must_use]
    pub fn with_key_fields(mut self, key_fields: BTreeMap<Category, Vec<String>>) -> Self {
        self.key_fields = key_fields;
        self
    }

    /// Enable change tracking with snapshots in `store`.
    #[must_use]
    pub fn with_snapshot_store(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            registry: self.registry,
            error_threshold: self.error_threshold,
            threshold_policy: self.threshold_policy,
            key_fields: self.key_fields,
            snapshots: self.snapshots,
            sink: self.sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_order_moves_text_last() {
        assert_eq!(
            run_order(&[
                Category::Text,
                Category::Products,
                Category::Assets,
                Category::Products
            ]),
            vec![Category::Products, Category::Assets, Category::Text]
        );
        assert!(run_order(&[]).is_empty());
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Unreadable(u32);

    impl Serialize for Unreadable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unreadable record"))
        }
    }

    #[test]
    fn test_deduplicate_keeps_records_it_cannot_identify() {
        let records = vec![Unreadable(1), Unreadable(1), Unreadable(2)];
        let (kept, error) = deduplicate_or_keep(records.clone(), &["title".to_string()])
            .expect_err("identities cannot be computed");
        assert_eq!(kept, records);
        assert!(error.to_string().contains("unreadable record"));
    }

    #[test]
    fn test_deduplicate_failure_is_reported_not_raised() {
        let sink = Arc::new(crate::MemorySink::new());
        let pipeline = Pipeline::builder().with_sink(sink.clone()).build();

        let kept = pipeline.deduplicate_list(
            Category::Products,
            vec![Unreadable(1), Unreadable(1)],
            &["title".to_string()],
        );

        assert_eq!(kept.len(), 2);
        assert!(matches!(
            sink.events().as_slice(),
            [PipelineEvent::DeduplicationFailed {
                category: Category::Products,
                ..
            }]
        ));
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let mut config = AppConfig::default();
        config.validation.error_threshold = 2.0;
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_without_snapshots() {
        let mut config = AppConfig::default();
        config.snapshots.enabled = false;
        let pipeline = Pipeline::from_config(&config).unwrap();
        assert!(pipeline.snapshots.is_none());
        assert_eq!(pipeline.threshold_policy, ThresholdPolicy::Advisory);
    }
}
