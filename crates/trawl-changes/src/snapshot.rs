//! Per-job run snapshots on disk.
//!
//! Layout: `<root>/<job_id>/run-<index:08>.json`. Each save reserves the
//! next run index by creating its file exclusively, so concurrent runs of
//! the same job never overwrite each other.

use crate::error::{ChangesError, Result};
use crate::identity::{identity, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use trawl_core::{Category, JobId, ScrapeResult};

const RUN_PREFIX: &str = "run-";
const RUN_SUFFIX: &str = ".json";

/// Attempts at reserving a run index before giving up.
const MAX_RESERVE_ATTEMPTS: u64 = 1024;

/// A persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub run: u64,
    pub captured_at: DateTime<Utc>,
    pub job_id: JobId,
    pub data: ScrapeResult,
    /// Identities of each keyed list category, in record order
    #[serde(default)]
    pub record_ids: BTreeMap<Category, Vec<Identity>>,
}

impl Snapshot {
    /// Build a snapshot of `data`, computing identities for every list
    /// category that is present and has key fields.
    pub fn capture(
        job_id: JobId,
        data: ScrapeResult,
        key_fields: &BTreeMap<Category, Vec<String>>,
    ) -> Result<Self> {
        let mut record_ids = BTreeMap::new();

        for (category, fields) in key_fields {
            if category.is_singleton() || !data.contains(*category) {
                continue;
            }
            let ids = data
                .records(*category)
                .iter()
                .map(|record| identity(record, fields.as_slice()))
                .collect::<Result<Vec<_>>>()?;
            record_ids.insert(*category, ids);
        }

        Ok(Self {
            run: 0,
            captured_at: Utc::now(),
            job_id,
            data,
            record_ids,
        })
    }
}

/// Directory of snapshots, one subdirectory per job.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Persist `snapshot` under the next free run index and return its path.
    ///
    /// The stored `run` field is set to the reserved index.
    pub fn save(&self, snapshot: &mut Snapshot) -> Result<PathBuf> {
        let dir = self.job_dir(&snapshot.job_id);
        fs::create_dir_all(&dir)?;

        let first = self
            .runs(&snapshot.job_id)?
            .last()
            .map_or(1, |(run, _)| run + 1);

        for run in first..first + MAX_RESERVE_ATTEMPTS {
            let path = dir.join(run_file_name(run));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(run, "run index taken, trying next");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            snapshot.run = run;
            let bytes = serde_json::to_vec_pretty(snapshot)?;
            file.write_all(&bytes)?;
            file.sync_all()?;

            tracing::debug!(job_id = %snapshot.job_id, run, path = %path.display(), "snapshot saved");
            return Ok(path);
        }

        Err(ChangesError::RunIndexExhausted(dir))
    }

    /// The snapshot with the highest run index that can be read.
    ///
    /// Unreadable snapshots are logged and skipped. `None` when the job has
    /// no readable snapshot.
    pub fn load_latest(&self, job_id: &JobId) -> Result<Option<Snapshot>> {
        for (run, path) in self.runs(job_id)?.into_iter().rev() {
            match Self::load(&path) {
                Ok(snapshot) => {
                    tracing::debug!(job_id = %job_id, run, "loaded previous snapshot");
                    return Ok(Some(snapshot));
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, run, error = %e, "skipping unreadable snapshot");
                }
            }
        }
        Ok(None)
    }

    /// Read one snapshot file.
    pub fn load(path: &Path) -> Result<Snapshot> {
        let contents = fs::read(path)?;
        serde_json::from_slice(&contents).map_err(|e| ChangesError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Run indices and paths of a job's snapshots, ascending.
    pub fn runs(&self, job_id: &JobId) -> Result<Vec<(u64, PathBuf)>> {
        let dir = self.job_dir(job_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(run) = name.to_str().and_then(parse_run_index) {
                runs.push((run, entry.path()));
            }
        }
        runs.sort_by_key(|(run, _)| *run);
        Ok(runs)
    }
}

fn run_file_name(run: u64) -> String {
    format!("{RUN_PREFIX}{run:08}{RUN_SUFFIX}")
}

fn parse_run_index(name: &str) -> Option<u64> {
    name.strip_prefix(RUN_PREFIX)?
        .strip_suffix(RUN_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trawl_core::{AppConfig, Product};

    fn job() -> JobId {
        JobId::new("shop").unwrap()
    }

    fn result(titles: &[&str]) -> ScrapeResult {
        ScrapeResult {
            products: Some(
                titles
                    .iter()
                    .map(|t| Product {
                        title: (*t).to_string(),
                        ..Product::default()
                    })
                    .collect(),
            ),
            ..ScrapeResult::default()
        }
    }

    fn capture(titles: &[&str]) -> Snapshot {
        let keys = AppConfig::default().changes.key_fields;
        Snapshot::capture(job(), result(titles), &keys).unwrap()
    }

    #[test]
    fn test_run_file_names() {
        assert_eq!(run_file_name(7), "run-00000007.json");
        assert_eq!(parse_run_index("run-00000007.json"), Some(7));
        assert_eq!(parse_run_index("run-x.json"), None);
        assert_eq!(parse_run_index("notes.txt"), None);
    }

    #[test]
    fn test_capture_records_identities() {
        let snapshot = capture(&["A", "B"]);
        assert_eq!(snapshot.record_ids[&Category::Products].len(), 2);
        assert!(!snapshot.record_ids.contains_key(&Category::Images));
    }

    #[test]
    fn test_save_assigns_increasing_runs() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let first = store.save(&mut capture(&["A"])).unwrap();
        let second = store.save(&mut capture(&["B"])).unwrap();

        assert!(first.ends_with("shop/run-00000001.json"));
        assert!(second.ends_with("shop/run-00000002.json"));
        assert_eq!(store.runs(&job()).unwrap().len(), 2);
    }

    #[test]
    fn test_save_skips_taken_index() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.save(&mut capture(&["A"])).unwrap();
        // A concurrent writer grabbed run 2 and has not finished writing
        fs::write(dir.path().join("shop").join(run_file_name(3)), b"").unwrap();
        fs::write(dir.path().join("shop").join(run_file_name(2)), b"").unwrap();

        let mut snapshot = capture(&["B"]);
        let path = store.save(&mut snapshot).unwrap();
        assert!(path.ends_with("run-00000004.json"));
        assert_eq!(snapshot.run, 4);
    }

    #[test]
    fn test_load_latest_by_run_index() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.save(&mut capture(&["old"])).unwrap();
        store.save(&mut capture(&["new"])).unwrap();

        let latest = store.load_latest(&job()).unwrap().unwrap();
        assert_eq!(latest.run, 2);
        assert_eq!(latest.data.products.unwrap()[0].title, "new");
    }

    #[test]
    fn test_load_latest_skips_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        store.save(&mut capture(&["good"])).unwrap();
        fs::write(dir.path().join("shop").join(run_file_name(2)), b"{ not json").unwrap();

        let latest = store.load_latest(&job()).unwrap().unwrap();
        assert_eq!(latest.run, 1);
    }

    #[test]
    fn test_load_latest_without_history() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load_latest(&job()).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_round_trip_keeps_record_ids() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut snapshot = capture(&["A", "B"]);
        let path = store.save(&mut snapshot).unwrap();
        let loaded = SnapshotStore::load(&path).unwrap();

        assert_eq!(loaded, snapshot);
    }
}
