//! Trawl Pipeline - runs extraction jobs end to end.
//!
//! A job extracts the requested categories from one rendered page, cleans
//! and validates the records, drops duplicates, and compares the result
//! with the job's previous run. Progress is reported as [`PipelineEvent`]s
//! to an [`EventSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use trawl_browser::StaticPage;
//! use trawl_core::{AppConfig, Category, JobId};
//! use trawl_pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::from_config(&AppConfig::load()?)?;
//! let page = StaticPage::new(html, "https://shop.example.com/")?;
//! let outcome = pipeline
//!     .run(
//!         &JobId::new("shop")?,
//!         &page,
//!         &[Category::Products, Category::Contacts],
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod events;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use events::{EventSink, MemorySink, PipelineEvent, TracingSink};
pub use pipeline::{JobOutcome, Pipeline, PipelineBuilder};
