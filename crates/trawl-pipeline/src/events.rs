//! Structured progress events and the sinks that receive them.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use trawl_core::{Category, JobId};

/// Something that happened during a job run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    JobStarted {
        job_id: JobId,
        url: String,
        categories: Vec<Category>,
    },
    CategoryExtracted {
        category: Category,
        count: usize,
    },
    StrategyFailed {
        category: Category,
        error: String,
    },
    Cancelled {
        job_id: JobId,
        skipped: Vec<Category>,
    },
    Deduplicated {
        category: Category,
        removed: usize,
    },
    /// Record identities could not be computed; the category was kept as is.
    DeduplicationFailed {
        category: Category,
        error: String,
    },
    RecordRejected {
        category: Category,
        index: usize,
        message: String,
    },
    ThresholdExceeded {
        ratio: f64,
        invalid: usize,
        total: usize,
        threshold: f64,
    },
    ChangesDetected {
        run: u64,
        new: usize,
        updated: usize,
        removed: usize,
        snapshot: PathBuf,
    },
    SnapshotFailed {
        error: String,
    },
    JobFinished {
        job_id: JobId,
        records: usize,
        errors: usize,
        cancelled: bool,
    },
}

/// Receives pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::JobStarted {
                job_id,
                url,
                categories,
            } => {
                tracing::info!(job_id = %job_id, url = %url, ?categories, "job started");
            }
            PipelineEvent::CategoryExtracted { category, count } => {
                tracing::info!(category = %category, count, "category extracted");
            }
            PipelineEvent::StrategyFailed { category, error } => {
                tracing::warn!(category = %category, error = %error, "extraction failed");
            }
            PipelineEvent::Cancelled { job_id, skipped } => {
                tracing::warn!(job_id = %job_id, ?skipped, "job cancelled");
            }
            PipelineEvent::Deduplicated { category, removed } => {
                tracing::debug!(category = %category, removed, "duplicates removed");
            }
            PipelineEvent::DeduplicationFailed { category, error } => {
                tracing::warn!(category = %category, error = %error, "deduplication skipped");
            }
            PipelineEvent::RecordRejected {
                category,
                index,
                message,
            } => {
                tracing::debug!(category = %category, index, error = %message, "record rejected");
            }
            PipelineEvent::ThresholdExceeded {
                ratio,
                invalid,
                total,
                threshold,
            } => {
                tracing::warn!(ratio, invalid, total, threshold, "error threshold exceeded");
            }
            PipelineEvent::ChangesDetected {
                run,
                new,
                updated,
                removed,
                snapshot,
            } => {
                tracing::info!(
                    run,
                    new,
                    updated,
                    removed,
                    snapshot = %snapshot.display(),
                    "changes detected"
                );
            }
            PipelineEvent::SnapshotFailed { error } => {
                tracing::error!(error = %error, "snapshot not recorded");
            }
            PipelineEvent::JobFinished {
                job_id,
                records,
                errors,
                cancelled,
            } => {
                tracing::info!(job_id = %job_id, records, errors, cancelled, "job finished");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("acquire events lock").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("acquire events lock").clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().expect("acquire events lock").push(event);
    }
}
