//! The persisted translation row and its unique key.

/// One persisted translation value.
///
/// At most one record exists per `(identifier, object_id, language,
/// field_name)` tuple; the backing table enforces this with a unique
/// constraint. An absent record and a record with an empty `field_value`
/// both mean "no translation".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    /// Storage row id, `None` for records not yet persisted.
    pub id: Option<i64>,

    /// The registered identifier of the owning model type.
    pub identifier: String,

    /// Primary key of the owning row.
    pub object_id: i64,

    /// Supported language code.
    pub language: String,

    /// Base (unsuffixed) translatable field name, e.g. `"title"`.
    pub field_name: String,

    /// The translated content, `None` when cleared.
    pub field_value: Option<String>,

    /// RFC3339 timestamp of the last write, for auditing.
    pub updated_at: Option<String>,
}

impl TranslationRecord {
    /// The unique key identifying this record.
    pub fn key(&self) -> TranslationKey {
        TranslationKey {
            identifier: self.identifier.clone(),
            object_id: self.object_id,
            language: self.language.clone(),
            field_name: self.field_name.clone(),
        }
    }
}

/// The unique 4-tuple addressing one translation record.
///
/// Used for `get` and `update` calls; deliberately excludes `field_value`
/// and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
    pub identifier: String,
    pub object_id: i64,
    pub language: String,
    pub field_name: String,
}

impl std::fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.identifier, self.object_id, self.field_name, self.language
        )
    }
}
