//! Deduplication and merge planning.
//!
//! [`merge`] reconciles a batch of candidates against a read-only
//! [`CatalogSnapshot`] and returns a [`MergePlan`]. Nothing is mutated
//! here: applying the plan is the catalog store's job, done atomically in
//! [`CatalogStore::commit`](crate::store::CatalogStore::commit).
//!
//! | Candidate vs. catalog            | Outcome                                  |
//! |----------------------------------|------------------------------------------|
//! | key absent                       | `to_insert`                              |
//! | key present, content identical   | `to_skip` with [`SkipReason::Unchanged`] |
//! | key present, content differs     | `to_update` if overwrite allowed, else `to_skip` with [`SkipReason::Conflict`] |
//! | key already seen in this batch   | `to_skip` (`Unchanged` or `Conflict`)    |
//! | shape invalid                    | `invalid`                                |
//!
//! "Identical" ignores `source_url`: a character listed on two pages is
//! one record, not a conflict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::identity_key;
use crate::models::{CharacterRecord, RecordUpdate};
use crate::store::CatalogSnapshot;

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Apply differing records as updates instead of reporting conflicts.
    pub allow_overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Identical to the catalog (or to an earlier candidate in the batch).
    Unchanged,
    /// Differs from `existing` and overwrite is not allowed.
    Conflict { existing: Box<CharacterRecord> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub record: CharacterRecord,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidCandidate {
    pub candidate: CharacterRecord,
    pub message: String,
}

/// Pure description of catalog changes. Every record in `to_insert`,
/// `to_update` and `to_skip` carries its resolved identity key as `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub to_insert: Vec<CharacterRecord>,
    pub to_update: Vec<RecordUpdate>,
    pub to_skip: Vec<SkippedRecord>,
    pub invalid: Vec<InvalidCandidate>,
}

impl MergePlan {
    /// Whether committing this plan would change the catalog.
    pub fn has_changes(&self) -> bool {
        !self.to_insert.is_empty() || !self.to_update.is_empty()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &SkippedRecord> {
        self.to_skip
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Conflict { .. }))
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &SkippedRecord> {
        self.to_skip
            .iter()
            .filter(|s| s.reason == SkipReason::Unchanged)
    }
}

/// Plan how `candidates` fold into `snapshot`.
///
/// Candidate order is preserved within each output list.
pub fn merge(
    candidates: &[CharacterRecord],
    snapshot: &CatalogSnapshot,
    options: MergeOptions,
) -> MergePlan {
    let mut plan = MergePlan::default();
    // Keys already claimed by this batch, pointing at the first record.
    let mut batch: BTreeMap<String, CharacterRecord> = BTreeMap::new();

    for candidate in candidates {
        if let Err(message) = validate_shape(candidate) {
            plan.invalid.push(InvalidCandidate {
                candidate: candidate.clone(),
                message,
            });
            continue;
        }

        let key = identity_key(candidate);
        let record = candidate.with_id(&key);

        if let Some(first) = batch.get(&key) {
            let reason = if first.same_content(&record) {
                SkipReason::Unchanged
            } else {
                SkipReason::Conflict {
                    existing: Box::new(first.clone()),
                }
            };
            plan.to_skip.push(SkippedRecord { record, reason });
            continue;
        }
        batch.insert(key.clone(), record.clone());

        match snapshot.get(&key) {
            None => plan.to_insert.push(record),
            Some(existing) if existing.same_content(&record) => plan.to_skip.push(SkippedRecord {
                record,
                reason: SkipReason::Unchanged,
            }),
            Some(existing) if options.allow_overwrite => plan.to_update.push(RecordUpdate {
                old: existing.clone(),
                new: record,
            }),
            Some(existing) => plan.to_skip.push(SkippedRecord {
                record,
                reason: SkipReason::Conflict {
                    existing: Box::new(existing.clone()),
                },
            }),
        }
    }

    tracing::debug!(
        insert = plan.to_insert.len(),
        update = plan.to_update.len(),
        skip = plan.to_skip.len(),
        invalid = plan.invalid.len(),
        "merge plan built"
    );

    plan
}

/// Checks a candidate must pass before it can enter the catalog.
pub fn validate_shape(record: &CharacterRecord) -> Result<(), String> {
    if record.name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if record.universe.trim().is_empty() {
        return Err("universe is empty".to_string());
    }
    for (key, value) in &record.stats {
        if key.trim().is_empty() {
            return Err("stat with empty name".to_string());
        }
        if !value.is_finite() || *value < 0.0 {
            return Err(format!("stats.{} must be a non-negative number", key));
        }
    }
    for (i, ability) in record.abilities.iter().enumerate() {
        if ability.name.trim().is_empty() {
            return Err(format!("abilities[{}].name is empty", i));
        }
        if !ability.cooldown.is_finite() || ability.cooldown < 0.0 {
            return Err(format!("abilities[{}].cooldown must be non-negative", i));
        }
        if !ability.damage.is_valid() {
            return Err(format!("abilities[{}].damage is out of range", i));
        }
    }
    Ok(())
}
