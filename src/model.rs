//! The owner-side API.
//!
//! A host model type implements [`Translatable`] by exposing its
//! identifier, its persistence id, and an owned [`TranslationCache`].
//! Everything else comes from the blanket [`TranslatableExt`] extension.

use std::sync::Arc;

use crate::cache::TranslationCache;
use crate::error::{Result, TranslationError};
use crate::fields::{build_localized_name, FieldKind, FileHandle};
use crate::languages;
use crate::record::TranslationRecord;
use crate::registry::{self, Registration};
use crate::store::TranslationStore;
use crate::sync::{SyncReport, Synchronizer};

/// Implemented by model types whose fields live in the translation store.
pub trait Translatable {
    /// The identifier this type registered under.
    fn translation_identifier(&self) -> &str;

    /// The owner's persistence id, or `None` before its first save.
    fn object_id(&self) -> Option<i64>;

    /// The per-instance write-behind cache.
    fn translations(&self) -> &TranslationCache;

    /// A per-instance default language, read from the owner's own data
    /// (for example a `language` column). `None` defers to the ambient
    /// resolution chain.
    fn instance_default_language(&self) -> Option<String> {
        None
    }
}

impl<T: Translatable + ?Sized> Translatable for &T {
    fn translation_identifier(&self) -> &str {
        (**self).translation_identifier()
    }

    fn object_id(&self) -> Option<i64> {
        (**self).object_id()
    }

    fn translations(&self) -> &TranslationCache {
        (**self).translations()
    }

    fn instance_default_language(&self) -> Option<String> {
        (**self).instance_default_language()
    }
}

/// Derived operations available on every [`Translatable`].
pub trait TranslatableExt: Translatable {
    /// This type's registration.
    fn registration(&self) -> Result<Arc<Registration>> {
        registry::get_registration(self.translation_identifier())
    }

    /// The language reads and writes of base fields currently target.
    fn active_language(&self) -> String {
        self.translations()
            .resolve_active(self.instance_default_language().as_deref())
    }

    /// Pin this instance to one language until deactivated.
    fn activate_language(&self, language: &str) -> Result<()> {
        if !languages::is_supported(language) {
            return Err(TranslationError::UnsupportedLanguage(language.to_string()));
        }
        self.translations().set_language_override(Some(language));
        Ok(())
    }

    /// Drop the per-instance pin, restoring ambient resolution.
    fn deactivate_language(&self) {
        self.translations().set_language_override(None);
    }

    fn translatable_fields(&self) -> Vec<String> {
        self.translations().fields().to_vec()
    }

    /// Languages with at least one stored translation for this owner.
    /// Empty for an unsaved owner.
    fn available_languages(&self, store: &TranslationStore) -> Result<Vec<String>> {
        match self.object_id() {
            Some(id) => store.available_languages(self.translation_identifier(), id),
            None => Ok(Vec::new()),
        }
    }

    fn cached_translations_count(&self) -> usize {
        self.translations().translations_count()
    }

    fn clear_translations_cache(&self) {
        self.translations().clear();
    }

    /// Stored records for this owner, optionally one language only.
    /// Empty for an unsaved owner.
    fn get_translations(
        &self,
        store: &TranslationStore,
        language: Option<&str>,
    ) -> Result<Vec<TranslationRecord>> {
        match self.object_id() {
            Some(id) => store.get_translations(self.translation_identifier(), id, language),
            None => Ok(Vec::new()),
        }
    }

    /// Delete this owner's stored translations and drop the cache.
    /// Returns the number of deleted rows.
    fn delete_translations(
        &self,
        store: &TranslationStore,
        language: Option<&str>,
    ) -> Result<usize> {
        let deleted = match self.object_id() {
            Some(id) => {
                store.delete_translations(self.translation_identifier(), id, language)?
            }
            None => 0,
        };
        self.translations().clear();
        Ok(deleted)
    }

    /// Read a base field in the active language, falling back to the
    /// default language when the active value is absent.
    fn get_field(&self, store: &TranslationStore, field_name: &str) -> Result<Option<String>> {
        let cache = self.translations();
        if !cache.fields().iter().any(|f| f == field_name) {
            return Err(TranslationError::UnknownAttribute(field_name.to_string()));
        }

        let language = self.active_language();
        let entry = cache.get_cache(store, self.object_id(), field_name, &language)?;
        if entry.field_value.is_some() {
            return Ok(entry.field_value);
        }

        let default = cache.default_language().to_string();
        if language != default {
            let fallback = cache.get_cache(store, self.object_id(), field_name, &default)?;
            return Ok(fallback.field_value);
        }
        Ok(None)
    }

    /// Write a base field in the active language. No fallback on writes.
    fn set_field(
        &self,
        store: &TranslationStore,
        field_name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let cache = self.translations();
        if !cache.fields().iter().any(|f| f == field_name) {
            return Err(TranslationError::UnknownAttribute(field_name.to_string()));
        }
        let language = self.active_language();
        cache.set_cache(store, self.object_id(), field_name, &language, value)
    }

    /// Read by attribute name: either a base field (`title`, with
    /// fallback) or a suffixed one (`title_fr`, exact language).
    fn get_attr(&self, store: &TranslationStore, name: &str) -> Result<Option<String>> {
        let cache = self.translations();
        if cache.fields().iter().any(|f| f == name) {
            return self.get_field(store, name);
        }
        if let Some((field, language)) = resolve_localized_name(cache.fields(), name) {
            let entry = cache.get_cache(store, self.object_id(), &field, &language)?;
            return Ok(entry.field_value);
        }
        Err(TranslationError::UnknownAttribute(name.to_string()))
    }

    /// Write by attribute name, mirroring [`TranslatableExt::get_attr`].
    fn set_attr(&self, store: &TranslationStore, name: &str, value: Option<&str>) -> Result<()> {
        let cache = self.translations();
        if cache.fields().iter().any(|f| f == name) {
            return self.set_field(store, name, value);
        }
        if let Some((field, language)) = resolve_localized_name(cache.fields(), name) {
            return cache.set_cache(store, self.object_id(), &field, &language, value);
        }
        Err(TranslationError::UnknownAttribute(name.to_string()))
    }

    /// Read a file-kind attribute as a [`FileHandle`], never exposing the
    /// raw stored string. Accepts base and suffixed names like
    /// [`TranslatableExt::get_attr`].
    ///
    /// # Errors
    ///
    /// [`TranslationError::UnknownAttribute`] when the name does not
    /// resolve to a field the registration declares as file-kind.
    fn get_attr_file(&self, store: &TranslationStore, name: &str) -> Result<Option<FileHandle>> {
        require_file_kind(self, name)?;
        Ok(self.get_attr(store, name)?.map(FileHandle::new))
    }

    /// Write a file-kind attribute, mirroring
    /// [`TranslatableExt::get_attr_file`]. `None` clears the value.
    fn set_attr_file(
        &self,
        store: &TranslationStore,
        name: &str,
        file: Option<&FileHandle>,
    ) -> Result<()> {
        require_file_kind(self, name)?;
        self.set_attr(store, name, file.map(FileHandle::name))
    }

    /// Persist every pending cache change in one transaction.
    fn save_translations(&self, store: &TranslationStore) -> Result<SyncReport>
    where
        Self: Sized,
    {
        Synchronizer::new(store).save(self)
    }
}

impl<T: Translatable + ?Sized> TranslatableExt for T {}

/// Resolve `name` to its base field and check the registration declares
/// that field as file-kind.
fn require_file_kind<T: Translatable + ?Sized>(instance: &T, name: &str) -> Result<()> {
    let cache = instance.translations();
    let field = if cache.fields().iter().any(|f| f == name) {
        name.to_string()
    } else if let Some((field, _)) = resolve_localized_name(cache.fields(), name) {
        field
    } else {
        return Err(TranslationError::UnknownAttribute(name.to_string()));
    };

    match instance.registration()?.field_kind(&field) {
        Some(FieldKind::File) => Ok(()),
        _ => Err(TranslationError::UnknownAttribute(name.to_string())),
    }
}

/// Match `name` against `field_language` forms. Fields may themselves
/// contain underscores, so the field part is matched longest-known-field
/// first and the remainder must be a supported language code.
pub(crate) fn resolve_localized_name(fields: &[String], name: &str) -> Option<(String, String)> {
    for field in fields {
        for code in languages::supported_languages() {
            if build_localized_name(field, &code) == name {
                return Some((field.clone(), code));
            }
        }
    }
    None
}
