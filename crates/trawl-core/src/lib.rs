//! Trawl Core - Foundation crate for the Trawl extraction pipeline.
//!
//! This crate provides the typed record model, shared identifiers, error
//! handling and configuration management that all other Trawl crates
//! depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`Category`, `JobId`)
//! - [`records`] - Per-category record structs and the result object
//!
//! # Example
//!
//! ```rust
//! use trawl_core::{AppConfig, Category, JobId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let job = JobId::new("acme-store")?;
//! let keys = &config.changes.key_fields[&Category::Products];
//! println!("{job}: products keyed by {keys:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod records;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, ChangesConfig, ExtractionConfig, ProductSelectorOverrides,
    SnapshotConfig, ThresholdPolicy, ValidationConfig,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use records::{
    Asset, Contacts, ExtraFields, Image, Product, Record, ScrapeResult, TextContent,
};
pub use types::{Category, JobId};
