//! Write-behind persistence.
//!
//! The synchronizer walks an owner's cache, partitions pending entries
//! into creates, updates and deletes, and applies them to the store in a
//! single transaction. Entries with nothing pending cost nothing, and an
//! owner with no pending entries issues no statements at all.

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TranslationError};
use crate::model::Translatable;
use crate::record::{TranslationKey, TranslationRecord};
use crate::store::TranslationStore;

/// What one save did, by row count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn merge(&mut self, other: SyncReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// One owner's partitioned pending changes, bound for one table.
pub(crate) struct Batch {
    pub(crate) table: String,
    pub(crate) creates: Vec<TranslationRecord>,
    pub(crate) updates: Vec<(TranslationKey, Option<String>)>,
    pub(crate) deletes: Vec<TranslationKey>,
}

impl Batch {
    fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Flushes instance caches to a [`TranslationStore`].
pub struct Synchronizer<'a> {
    store: &'a TranslationStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a TranslationStore) -> Self {
        Self { store }
    }

    /// Persist one owner's pending translations.
    ///
    /// The owner must have been saved first so its id exists; cache
    /// entries staged before that save adopt the id here.
    ///
    /// # Errors
    ///
    /// [`TranslationError::UnsavedOwner`] when the owner has no id yet.
    pub fn save<T: Translatable + ?Sized>(&self, instance: &T) -> Result<SyncReport> {
        let object_id = instance.object_id().ok_or(TranslationError::UnsavedOwner)?;
        let cache = instance.translations();
        cache.adopt_object_id(object_id);

        let batch = self.partition(instance, cache.entries_snapshot());
        if batch.is_empty() {
            return Ok(SyncReport::default());
        }

        let report = self.store.apply_batch(&batch)?;
        cache.finish_save();
        debug!(
            identifier = instance.translation_identifier(),
            object_id,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            "saved translations"
        );
        Ok(report)
    }

    /// Persist several owners, one transaction each.
    pub fn save_all(&self, instances: &[&dyn Translatable]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for instance in instances {
            report.merge(self.save(*instance)?);
        }
        Ok(report)
    }

    fn partition<T: Translatable + ?Sized>(
        &self,
        instance: &T,
        entries: Vec<crate::cache::CachedTranslation>,
    ) -> Batch {
        let mut batch = Batch {
            table: self.store.table_for(instance.translation_identifier()),
            creates: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        };

        for entry in entries {
            if entry.deleted {
                // Only rows that actually exist get a DELETE; clearing a
                // value that was never persisted stays local.
                if !entry.is_new {
                    if let Some(key) = entry.lookup() {
                        batch.deletes.push(key);
                    }
                }
            } else if entry.is_new {
                if entry.field_value.is_some() {
                    if let Some(record) = entry.attrs() {
                        batch.creates.push(record);
                    }
                }
            } else if entry.has_changed {
                if let Some(key) = entry.lookup() {
                    batch.updates.push((key, entry.field_value.clone()));
                }
            }
        }
        batch
    }
}
