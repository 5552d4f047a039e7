//! Per-language field accessors.
//!
//! Each registered field fans out into one [`LocalizedField`] per
//! supported language, named by suffixing the language code onto the
//! field name (`title` + `fr` = `title_fr`). Region subtags keep their
//! hyphen in the language code but become underscores in the attribute
//! name, so `title` + `pt-br` = `title_pt_br`.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::Translatable;
use crate::store::TranslationStore;

/// What a field's stored string denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The value itself.
    Text,
    /// A storage-relative file name.
    File,
}

/// A field declared translatable at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableField {
    pub name: String,
    pub kind: FieldKind,
}

impl TranslatableField {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
        }
    }

    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::File,
        }
    }
}

/// Suffixed attribute name for a (field, language) pair.
pub fn build_localized_name(field_name: &str, language: &str) -> String {
    format!("{field_name}_{}", language.replace('-', "_"))
}

/// Accessor for one (field, language) pair of a registered type.
///
/// Reads and writes go through the owning instance's cache, so a set is
/// not persisted until the owner's translations are saved.
#[derive(Debug, Clone)]
pub struct LocalizedField {
    field_name: String,
    language: String,
    attname: String,
    kind: FieldKind,
}

impl LocalizedField {
    pub(crate) fn new(field_name: &str, language: &str, attname: &str, kind: FieldKind) -> Self {
        Self {
            field_name: field_name.to_string(),
            language: language.to_string(),
            attname: attname.to_string(),
            kind,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// The suffixed name, e.g. `title_fr`.
    pub fn attname(&self) -> &str {
        &self.attname
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Current value for this exact language. No fallback.
    pub fn get(
        &self,
        instance: &dyn Translatable,
        store: &TranslationStore,
    ) -> Result<Option<String>> {
        let cached = instance.translations().get_cache(
            store,
            instance.object_id(),
            &self.field_name,
            &self.language,
        )?;
        Ok(cached.field_value)
    }

    /// Stage a value for this exact language in the instance cache.
    ///
    /// `None` or an empty string marks an existing stored value for
    /// deletion on the next save.
    pub fn set(
        &self,
        instance: &dyn Translatable,
        store: &TranslationStore,
        value: Option<&str>,
    ) -> Result<()> {
        instance.translations().set_cache(
            store,
            instance.object_id(),
            &self.field_name,
            &self.language,
            value,
        )
    }

    /// File-handle view of the value, for [`FieldKind::File`] fields.
    pub fn get_file(
        &self,
        instance: &dyn Translatable,
        store: &TranslationStore,
    ) -> Result<Option<FileHandle>> {
        Ok(self.get(instance, store)?.map(FileHandle::new))
    }

    pub fn set_file(
        &self,
        instance: &dyn Translatable,
        store: &TranslationStore,
        file: Option<&FileHandle>,
    ) -> Result<()> {
        self.set(instance, store, file.map(FileHandle::name))
    }
}

/// A stored file name, resolvable against a storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
}

impl FileHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    pub fn exists(&self, root: &Path) -> bool {
        self.path(root).is_file()
    }

    pub fn open(&self, root: &Path) -> io::Result<File> {
        File::open(self.path(root))
    }
}
