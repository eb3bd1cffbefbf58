//! Trawl Changes - record identities and run-to-run change detection.
//!
//! - [`identity`] - SHA-256 identities, fingerprints and deduplication
//! - [`snapshot`] - per-job run snapshots with exclusive run indices
//! - [`detector`] - new/updated/removed records against the last snapshot

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod detector;
pub mod error;
pub mod identity;
pub mod snapshot;

pub use detector::{detect_changes, ChangeDetector, ChangeSet, RecordedRun, UpdatedRecord};
pub use error::{ChangesError, Result};
pub use identity::{deduplicate, fingerprint, identity, Fingerprint, Identity};
pub use snapshot::{Snapshot, SnapshotStore};
