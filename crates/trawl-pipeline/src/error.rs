use crate::pipeline::JobOutcome;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] trawl_core::ConfigError),

    #[error("Extraction setup error: {0}")]
    Extract(#[from] trawl_extract::ExtractError),

    /// The run finished but too many records failed validation. The
    /// outcome holds everything that was produced.
    #[error(
        "Validation error rate {:.2} exceeds threshold ({} of {} records invalid)",
        .0.threshold.ratio(),
        .0.errors.len(),
        .0.records_seen
    )]
    ThresholdExceeded(Box<JobOutcome>),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
