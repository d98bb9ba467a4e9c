//! In-memory [`CatalogStore`] implementation for tests and embedding.
//!
//! Holds the catalog in a `BTreeMap` behind `std::sync::RwLock`. A commit
//! takes the write lock for its whole verify-then-apply step, so commits
//! are serialized and readers never observe a half-applied plan.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::merge::MergePlan;
use crate::models::CharacterRecord;

use super::{planned_id, verify_plan, CatalogSnapshot, CatalogStore, CommitError, CommitReceipt};

/// In-memory catalog.
pub struct InMemoryCatalog {
    records: RwLock<BTreeMap<String, CharacterRecord>>,
    commits: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            commits: AtomicUsize::new(0),
        }
    }

    /// Seed a catalog with records that already carry ids.
    pub fn with_records(records: impl IntoIterator<Item = CharacterRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.records.write() {
            for record in records {
                if let Some(id) = record.id.clone() {
                    map.insert(id, record);
                }
            }
        }
        store
    }

    pub fn get(&self, id: &str) -> Option<CharacterRecord> {
        self.records.read().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful commits that changed something.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn snapshot(&self) -> anyhow::Result<CatalogSnapshot> {
        let map = self
            .records
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        Ok(CatalogSnapshot::from_records(map.values().cloned()))
    }

    async fn commit(&self, plan: &MergePlan) -> Result<CommitReceipt, CommitError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;

        verify_plan(plan, |id| Ok(map.get(id).cloned()))?;

        for record in &plan.to_insert {
            map.insert(planned_id(record)?.to_string(), record.clone());
        }
        for update in &plan.to_update {
            map.insert(planned_id(&update.new)?.to_string(), update.new.clone());
        }

        if plan.has_changes() {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }

        Ok(CommitReceipt {
            inserted: plan.to_insert.len(),
            updated: plan.to_update.len(),
        })
    }
}
