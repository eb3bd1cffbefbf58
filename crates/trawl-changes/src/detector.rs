//! New/updated/removed detection between a run and the previous snapshot.

use crate::error::Result;
use crate::identity::{fingerprint, identity, Identity};
use crate::snapshot::{Snapshot, SnapshotStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use trawl_core::{Category, JobId, Record, ScrapeResult};

/// A record whose identity persisted but whose content changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatedRecord {
    pub id: Identity,
    pub previous: Record,
    pub current: Record,
}

/// Differences between the current run and the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    /// Records absent from the previous run, in current order
    pub new: BTreeMap<Category, Vec<Record>>,
    pub updated: BTreeMap<Category, Vec<UpdatedRecord>>,
    /// Identities absent from the current run, in previous order
    pub removed: BTreeMap<Category, Vec<Identity>>,
}

impl ChangeSet {
    /// True when nothing was added, updated or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.values().all(Vec::is_empty)
            && self.updated.values().all(Vec::is_empty)
            && self.removed.values().all(Vec::is_empty)
    }

    #[must_use]
    pub fn new_count(&self) -> usize {
        self.new.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.updated.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.values().map(Vec::len).sum()
    }
}

/// Compare `current` against `previous`.
///
/// Without a previous snapshot every record of every present category is
/// new. Otherwise only list categories that are present in `current` and
/// have key fields are compared; the rest are skipped.
pub fn detect_changes(
    current: &ScrapeResult,
    previous: Option<&Snapshot>,
    key_fields: &BTreeMap<Category, Vec<String>>,
) -> Result<ChangeSet> {
    let mut changes = ChangeSet::default();

    let Some(previous) = previous else {
        for category in current.categories() {
            changes.new.insert(category, current.records(category));
        }
        return Ok(changes);
    };

    for category in Category::ALL {
        if category.is_singleton() || !current.contains(category) {
            continue;
        }
        let Some(fields) = key_fields.get(&category) else {
            continue;
        };
        let fields = fields.as_slice();

        let current_records = current.records(category);
        let previous_records = previous.data.records(category);

        let mut current_ids = Vec::with_capacity(current_records.len());
        for record in &current_records {
            current_ids.push(identity(record, fields)?);
        }

        let persisted = previous
            .record_ids
            .get(&category)
            .filter(|ids| !ids.is_empty());
        let previous_ids = match persisted {
            Some(ids) => ids.clone(),
            None => previous_records
                .iter()
                .map(|record| identity(record, fields))
                .collect::<Result<Vec<_>>>()?,
        };
        let previous_set: HashSet<&Identity> = previous_ids.iter().collect();

        let current_set: HashSet<&Identity> = current_ids.iter().collect();

        let mut new = Vec::new();
        let mut updated = Vec::new();
        let mut handled = HashSet::new();

        for (id, record) in current_ids.iter().zip(&current_records) {
            if !handled.insert(id) {
                continue;
            }
            if !previous_set.contains(id) {
                new.push(record.clone());
                continue;
            }

            let mut previous_record = None;
            for candidate in &previous_records {
                if identity(candidate, fields)? == *id {
                    previous_record = Some(candidate);
                    break;
                }
            }

            if let Some(previous_record) = previous_record {
                if fingerprint(record)? != fingerprint(previous_record)? {
                    updated.push(UpdatedRecord {
                        id: id.clone(),
                        previous: previous_record.clone(),
                        current: record.clone(),
                    });
                }
            }
        }

        let mut removed = Vec::new();
        let mut seen_removed = HashSet::new();
        for id in &previous_ids {
            if !current_set.contains(id) && seen_removed.insert(id) {
                removed.push(id.clone());
            }
        }

        tracing::debug!(
            category = %category,
            new = new.len(),
            updated = updated.len(),
            removed = removed.len(),
            "compared with previous run"
        );

        changes.new.insert(category, new);
        changes.updated.insert(category, updated);
        changes.removed.insert(category, removed);
    }

    Ok(changes)
}

/// Outcome of [`ChangeDetector::record_run`].
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub changes: ChangeSet,
    pub snapshot_path: PathBuf,
    pub run: u64,
}

/// Change detection backed by a snapshot store.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    store: SnapshotStore,
    key_fields: BTreeMap<Category, Vec<String>>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(store: SnapshotStore, key_fields: BTreeMap<Category, Vec<String>>) -> Self {
        Self { store, key_fields }
    }

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    #[must_use]
    pub fn key_fields(&self) -> &BTreeMap<Category, Vec<String>> {
        &self.key_fields
    }

    /// Compare `current` with the job's latest snapshot, then save it as
    /// the job's next run.
    ///
    /// Categories in `unavailable` could not be read this run. They are left
    /// out of the comparison, and the saved snapshot keeps the previous
    /// run's records for them.
    pub fn record_run(
        &self,
        job_id: &JobId,
        current: &ScrapeResult,
        unavailable: &[Category],
    ) -> Result<RecordedRun> {
        let previous = self.store.load_latest(job_id)?;

        let mut compared = current.clone();
        for &category in unavailable {
            clear(&mut compared, category);
        }
        let changes = detect_changes(&compared, previous.as_ref(), &self.key_fields)?;

        let mut data = compared;
        if let Some(previous) = &previous {
            for &category in unavailable {
                if previous.data.contains(category) {
                    data.set_records(category, previous.data.records(category));
                }
            }
        }

        let mut snapshot = Snapshot::capture(job_id.clone(), data, &self.key_fields)?;
        let snapshot_path = self.store.save(&mut snapshot)?;

        tracing::info!(
            job_id = %job_id,
            run = snapshot.run,
            new = changes.new_count(),
            updated = changes.updated_count(),
            removed = changes.removed_count(),
            "run recorded"
        );

        Ok(RecordedRun {
            changes,
            snapshot_path,
            run: snapshot.run,
        })
    }
}

fn clear(result: &mut ScrapeResult, category: Category) {
    match category {
        Category::Products => result.products = None,
        Category::Images => result.images = None,
        Category::Contacts => result.contacts = None,
        Category::Text => result.text = None,
        Category::Assets => result.assets = None,
    }
}
