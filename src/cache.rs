//! The per-instance write-behind translation cache.
//!
//! [`CachedTranslation`] wraps one `(field, language) -> value` pair and
//! tracks whether it is new, changed, or cleared since the last flush.
//! [`TranslationCache`] is the per-owner-instance registry of those values,
//! indexed `field -> language -> entry`, and owns the active-language state
//! and the lazy population logic. Nothing here touches the backing store
//! except the single-lookup cache-miss path; flushing is the synchronizer's
//! job.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;
use crate::languages;
use crate::record::{TranslationKey, TranslationRecord};
use crate::registry::{self, Registration};
use crate::store::TranslationStore;

/// One cached `(language, field_name) -> field_value` pair.
///
/// `is_new` stays true until a backing record is confirmed to exist,
/// `has_changed` marks divergence from the last persisted value, and
/// `deleted` marks a cleared value whose backing row must be removed at
/// save time (clearing never deletes eagerly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranslation {
    pub identifier: String,
    /// `None` while the owning instance has not been persisted yet.
    pub object_id: Option<i64>,
    pub language: String,
    pub field_name: String,
    pub field_value: Option<String>,
    pub is_new: bool,
    pub has_changed: bool,
    pub deleted: bool,
}

impl CachedTranslation {
    /// A fresh entry with no backing record.
    pub fn new(identifier: &str, object_id: Option<i64>, language: &str, field_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            object_id,
            language: language.to_string(),
            field_name: field_name.to_string(),
            field_value: None,
            is_new: true,
            has_changed: false,
            deleted: false,
        }
    }

    /// An entry mirroring an existing persisted record.
    pub fn from_record(record: &TranslationRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            object_id: Some(record.object_id),
            language: record.language.clone(),
            field_name: record.field_name.clone(),
            field_value: record.field_value.clone(),
            is_new: false,
            has_changed: false,
            deleted: false,
        }
    }

    /// The full attribute set needed to create or update a record.
    ///
    /// `None` while the owner has no object id.
    pub fn attrs(&self) -> Option<TranslationRecord> {
        let object_id = self.object_id?;
        Some(TranslationRecord {
            id: None,
            identifier: self.identifier.clone(),
            object_id,
            language: self.language.clone(),
            field_name: self.field_name.clone(),
            field_value: self.field_value.clone(),
            updated_at: None,
        })
    }

    /// The unique-key subset of [`attrs`](Self::attrs), excluding the value
    /// and timestamp.
    pub fn lookup(&self) -> Option<TranslationKey> {
        let object_id = self.object_id?;
        Some(TranslationKey {
            identifier: self.identifier.clone(),
            object_id,
            language: self.language.clone(),
            field_name: self.field_name.clone(),
        })
    }

    /// Apply a write. Empty strings are treated as "no value".
    ///
    /// Clearing an existing value defers the delete to save time; writing
    /// the value already held changes nothing.
    pub fn set_value(&mut self, value: Option<&str>) {
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);

        if value.is_none() {
            if self.field_value.is_some() {
                self.deleted = true;
            }
        } else {
            self.deleted = false;
        }

        if value != self.field_value {
            self.has_changed = true;
            self.field_value = value;
        }
    }

    /// Clear transient flags after a successful flush.
    pub fn reset_flags(&mut self) {
        self.is_new = false;
        self.has_changed = false;
        self.deleted = false;
    }
}

#[derive(Debug, Default)]
struct CacheState {
    language_override: Option<String>,
    entries: HashMap<String, HashMap<String, CachedTranslation>>,
    prefetched: bool,
}

/// Per-instance registry of cached translations.
///
/// Owned exclusively by one model instance and never shared; interior
/// mutability keeps reads ergonomic (a read may populate the cache).
#[derive(Debug)]
pub struct TranslationCache {
    identifier: String,
    fields: Vec<String>,
    default_language: String,
    state: RefCell<CacheState>,
}

impl TranslationCache {
    /// Build a cache from explicit parts, bypassing the registry.
    pub fn new(identifier: &str, fields: &[&str], default_language: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            default_language: default_language.to_string(),
            state: RefCell::new(CacheState::default()),
        }
    }

    /// Build a cache from a registration.
    pub fn from_registration(registration: &Registration) -> Self {
        Self {
            identifier: registration.identifier().to_string(),
            fields: registration.field_names(),
            default_language: registration.default_language().to_string(),
            state: RefCell::new(CacheState::default()),
        }
    }

    /// Build a cache for a registered identifier.
    pub fn for_identifier(identifier: &str) -> Result<Self> {
        let registration = registry::get_registration(identifier)?;
        Ok(Self::from_registration(&registration))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The translatable field list copied from the registration.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// The per-instance language override, if one was activated.
    pub fn language_override(&self) -> Option<String> {
        self.state.borrow().language_override.clone()
    }

    pub fn set_language_override(&self, language: Option<&str>) {
        self.state.borrow_mut().language_override = language.map(str::to_string);
    }

    /// Resolve the active language for the owning instance.
    ///
    /// Order: per-instance override, then the owner's own default-language
    /// field, then the thread-active language, then the registered default.
    /// Candidates outside the supported set are skipped.
    pub fn resolve_active(&self, instance_default: Option<&str>) -> String {
        if let Some(lang) = self.language_override() {
            return lang;
        }
        if let Some(lang) = instance_default {
            if languages::is_supported(lang) {
                return lang.to_string();
            }
        }
        if let Some(lang) = languages::active() {
            if languages::is_supported(&lang) {
                return lang;
            }
        }
        self.default_language.clone()
    }

    /// Fetch the cached entry for `(field_name, language)`, populating it on
    /// a miss.
    ///
    /// A miss on a persisted owner costs exactly one store lookup; a miss on
    /// an unsaved owner creates a fresh `is_new` entry without querying.
    pub fn get_cache(
        &self,
        store: &TranslationStore,
        object_id: Option<i64>,
        field_name: &str,
        language: &str,
    ) -> Result<CachedTranslation> {
        if let Some(entry) = self.peek(field_name, language) {
            return Ok(entry);
        }

        let entry = match object_id {
            Some(id) => {
                let key = TranslationKey {
                    identifier: self.identifier.clone(),
                    object_id: id,
                    language: language.to_string(),
                    field_name: field_name.to_string(),
                };
                match store.get(&key)? {
                    Some(record) => CachedTranslation::from_record(&record),
                    None => CachedTranslation::new(&self.identifier, Some(id), language, field_name),
                }
            }
            None => CachedTranslation::new(&self.identifier, None, language, field_name),
        };

        let mut state = self.state.borrow_mut();
        let slot = state
            .entries
            .entry(field_name.to_string())
            .or_default()
            .entry(language.to_string())
            .or_insert(entry);
        Ok(slot.clone())
    }

    /// Write a value through the cache, creating the entry first if absent.
    pub fn set_cache(
        &self,
        store: &TranslationStore,
        object_id: Option<i64>,
        field_name: &str,
        language: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.get_cache(store, object_id, field_name, language)?;

        let mut state = self.state.borrow_mut();
        if let Some(entry) = state
            .entries
            .get_mut(field_name)
            .and_then(|langs| langs.get_mut(language))
        {
            entry.set_value(value);
        }
        Ok(())
    }

    /// The cached entry, if present, without populating anything.
    pub fn peek(&self, field_name: &str, language: &str) -> Option<CachedTranslation> {
        self.state
            .borrow()
            .entries
            .get(field_name)
            .and_then(|langs| langs.get(language))
            .cloned()
    }

    /// Install an entry mirroring a fetched record, replacing any cached
    /// value for that pair. Used by prefetch distribution.
    pub fn insert_record(&self, record: &TranslationRecord) {
        let entry = CachedTranslation::from_record(record);
        self.state
            .borrow_mut()
            .entries
            .entry(record.field_name.clone())
            .or_default()
            .insert(record.language.clone(), entry);
    }

    /// Fill every missing `(field, language)` pair with an empty entry so
    /// later reads never fall back to the store.
    pub fn populate_missing(
        &self,
        fields: &[String],
        supported_languages: &[String],
        object_id: Option<i64>,
    ) {
        let mut state = self.state.borrow_mut();
        for field in fields {
            let langs = state.entries.entry(field.clone()).or_default();
            for language in supported_languages {
                langs.entry(language.clone()).or_insert_with(|| {
                    CachedTranslation::new(&self.identifier, object_id, language, field)
                });
            }
        }
    }

    /// Number of cached entries across all fields and languages.
    pub fn translations_count(&self) -> usize {
        self.state
            .borrow()
            .entries
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Field names with at least one cached entry, sorted.
    pub fn cached_fields(&self) -> Vec<String> {
        let state = self.state.borrow();
        let mut fields: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, langs)| !langs.is_empty())
            .map(|(field, _)| field.clone())
            .collect();
        fields.sort();
        fields
    }

    /// Distinct languages with at least one cached entry, sorted.
    pub fn cached_languages(&self) -> Vec<String> {
        let state = self.state.borrow();
        let mut langs: Vec<String> = state
            .entries
            .values()
            .flat_map(|langs| langs.keys().cloned())
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// Empty the cache. Does not touch the backing store or the language
    /// override.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.entries.clear();
        state.prefetched = false;
    }

    /// Whether a batched prefetch already populated this cache.
    pub fn is_prefetched(&self) -> bool {
        self.state.borrow().prefetched
    }

    pub fn mark_prefetched(&self) {
        self.state.borrow_mut().prefetched = true;
    }

    /// Assign the owner's real id to every entry still carrying the unsaved
    /// placeholder.
    pub fn adopt_object_id(&self, object_id: i64) {
        let mut state = self.state.borrow_mut();
        for langs in state.entries.values_mut() {
            for entry in langs.values_mut() {
                if entry.object_id.is_none() {
                    entry.object_id = Some(object_id);
                }
            }
        }
    }

    /// Snapshot of every cached entry, for the synchronizer's partitioning.
    pub fn entries_snapshot(&self) -> Vec<CachedTranslation> {
        self.state
            .borrow()
            .entries
            .values()
            .flat_map(|langs| langs.values().cloned())
            .collect()
    }

    /// Reconcile cache state after a successful flush: deleted entries are
    /// dropped, everything else has its transient flags cleared.
    pub fn finish_save(&self) {
        let mut state = self.state.borrow_mut();
        for langs in state.entries.values_mut() {
            langs.retain(|_, entry| !entry.deleted);
            for entry in langs.values_mut() {
                entry.reset_flags();
            }
        }
        state.entries.retain(|_, langs| !langs.is_empty());
    }
}
