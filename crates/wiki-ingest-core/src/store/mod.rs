//! Catalog store abstraction.
//!
//! The [`CatalogStore`] trait is the only seam between the ingestion
//! engine and whatever owns the authoritative character catalog. The
//! engine reads a [`CatalogSnapshot`], computes a
//! [`MergePlan`](crate::merge::MergePlan) against it, and hands the plan
//! back through [`CatalogStore::commit`].
//!
//! Implementations must apply a plan atomically and one commit at a time.
//! Because another ingestion may have committed since the snapshot was
//! taken, `commit` re-checks every planned change against the live
//! catalog and fails with [`CommitError::Stale`] without applying anything
//! if the plan no longer fits.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::merge::MergePlan;
use crate::models::CharacterRecord;

/// Read-only copy of the catalog at one point in time, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    records: BTreeMap<String, CharacterRecord>,
}

impl CatalogSnapshot {
    /// Build a snapshot from records that already carry their ids.
    /// Records without an id are ignored.
    pub fn from_records(records: impl IntoIterator<Item = CharacterRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    pub fn insert(&mut self, record: CharacterRecord) {
        if let Some(id) = record.id.clone() {
            self.records.insert(id, record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&CharacterRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CharacterRecord> {
        self.records.values()
    }
}

/// What a successful commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Error)]
pub enum CommitError {
    /// The catalog changed under the plan; nothing was applied.
    #[error("catalog changed since snapshot: record '{id}' {detail}")]
    Stale { id: String, detail: String },
    /// A planned record has no id.
    #[error("plan contains a record without an id: {0}")]
    MissingId(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The two operations the ingestion engine needs from a catalog owner.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Current catalog contents.
    async fn snapshot(&self) -> anyhow::Result<CatalogSnapshot>;

    /// Apply `plan.to_insert` and `plan.to_update` atomically.
    async fn commit(&self, plan: &MergePlan) -> Result<CommitReceipt, CommitError>;
}

/// Check a plan against the live catalog without applying it.
///
/// `lookup` returns the current record for an id. Shared by the store
/// implementations so they agree on what "stale" means. An update must
/// still find exactly its `old` record, `source_url` included.
pub fn verify_plan<F>(plan: &MergePlan, mut lookup: F) -> Result<(), CommitError>
where
    F: FnMut(&str) -> Result<Option<CharacterRecord>, CommitError>,
{
    for record in &plan.to_insert {
        let id = planned_id(record)?;
        if lookup(id)?.is_some() {
            return Err(CommitError::Stale {
                id: id.to_string(),
                detail: "was inserted concurrently".to_string(),
            });
        }
    }
    for update in &plan.to_update {
        let id = planned_id(&update.new)?;
        match lookup(id)? {
            Some(current) if current == update.old => {}
            Some(_) => {
                return Err(CommitError::Stale {
                    id: id.to_string(),
                    detail: "was modified concurrently".to_string(),
                })
            }
            None => {
                return Err(CommitError::Stale {
                    id: id.to_string(),
                    detail: "was removed concurrently".to_string(),
                })
            }
        }
    }
    Ok(())
}

/// The id a planned record will be stored under.
pub fn planned_id(record: &CharacterRecord) -> Result<&str, CommitError> {
    record
        .id
        .as_deref()
        .ok_or_else(|| CommitError::MissingId(record.label()))
}
