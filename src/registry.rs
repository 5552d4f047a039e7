//! Process-wide registry of translatable model types.
//!
//! A model type opts in by registering once at startup, naming its
//! identifier and the fields whose values live in the translation store.
//! Registration is validated eagerly so misconfiguration surfaces at
//! startup rather than on first access.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::info;

use crate::error::{Result, TranslationError};
use crate::fields::{build_localized_name, FieldKind, LocalizedField, TranslatableField};
use crate::languages;

const MAX_IDENTIFIER_LENGTH: usize = 100;

/// Declarative input to [`register`].
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Stable name for the model type, shared by all its records.
    pub identifier: String,
    /// The translatable fields.
    pub fields: Vec<TranslatableField>,
    /// Every attribute the model type actually has. Translatable fields
    /// must be a subset of these.
    pub model_fields: Vec<String>,
    /// Fallback language for this type; the process default when `None`.
    pub default_language: Option<String>,
    /// Custom backing table; the shared default table when `None`.
    pub table: Option<String>,
}

impl RegistrationConfig {
    pub fn new(identifier: &str, fields: &[&str], model_fields: &[&str]) -> Self {
        Self {
            identifier: identifier.to_string(),
            fields: fields
                .iter()
                .map(|f| TranslatableField::text(f))
                .collect(),
            model_fields: model_fields.iter().map(|f| f.to_string()).collect(),
            default_language: None,
            table: None,
        }
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = Some(language.to_string());
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn with_file_field(mut self, field: &str) -> Self {
        self.fields.push(TranslatableField::file(field));
        self
    }
}

/// A validated registration. Immutable once created.
#[derive(Debug)]
pub struct Registration {
    identifier: String,
    fields: Vec<TranslatableField>,
    default_language: String,
    table: Option<String>,
    localized: Vec<LocalizedField>,
}

impl Registration {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn fields(&self) -> &[TranslatableField] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Per-language accessors, one for every (field, supported language)
    /// pair, keyed by suffixed attribute name such as `title_fr`.
    pub fn localized_fields(&self) -> &[LocalizedField] {
        &self.localized
    }

    pub fn localized_field(&self, attname: &str) -> Option<&LocalizedField> {
        self.localized.iter().find(|lf| lf.attname() == attname)
    }
}

struct ModelRegistry {
    inner: RwLock<HashMap<String, Arc<Registration>>>,
}

impl ModelRegistry {
    fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

static REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

fn global() -> &'static ModelRegistry {
    REGISTRY.get_or_init(ModelRegistry::new)
}

/// Validate and install a registration.
///
/// # Errors
///
/// - [`TranslationError::AlreadyRegistered`] if the identifier is taken
/// - [`TranslationError::InvalidRegistration`] for an empty or oversized
///   identifier, no fields, or a field the model type does not have
/// - [`TranslationError::UnsupportedLanguage`] for an unknown default
pub fn register(config: RegistrationConfig) -> Result<Arc<Registration>> {
    let registration = Arc::new(validate(config)?);

    let registry = global();
    let mut map = registry.inner.write().unwrap_or_else(|e| e.into_inner());
    if map.contains_key(registration.identifier()) {
        return Err(TranslationError::AlreadyRegistered(
            registration.identifier().to_string(),
        ));
    }
    map.insert(
        registration.identifier().to_string(),
        Arc::clone(&registration),
    );
    info!(
        identifier = registration.identifier(),
        fields = registration.fields.len(),
        "registered translatable model"
    );
    Ok(registration)
}

fn validate(config: RegistrationConfig) -> Result<Registration> {
    if config.identifier.is_empty() {
        return Err(TranslationError::InvalidRegistration(
            "identifier must not be empty".to_string(),
        ));
    }
    if config.identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TranslationError::InvalidRegistration(format!(
            "identifier '{}' exceeds {MAX_IDENTIFIER_LENGTH} characters",
            config.identifier
        )));
    }
    if config.fields.is_empty() {
        return Err(TranslationError::InvalidRegistration(format!(
            "'{}' declares no translatable fields",
            config.identifier
        )));
    }
    for field in &config.fields {
        if !config.model_fields.iter().any(|m| *m == field.name) {
            return Err(TranslationError::InvalidRegistration(format!(
                "'{}' has no field named '{}'",
                config.identifier, field.name
            )));
        }
    }

    let settings = languages::settings();
    let default_language = match config.default_language {
        Some(lang) => {
            if !settings.is_supported(&lang) {
                return Err(TranslationError::UnsupportedLanguage(lang));
            }
            lang
        }
        None => settings.default_language().to_string(),
    };

    let mut localized = Vec::new();
    for field in &config.fields {
        for code in settings.codes() {
            localized.push(LocalizedField::new(
                &field.name,
                &code,
                &build_localized_name(&field.name, &code),
                field.kind,
            ));
        }
    }

    Ok(Registration {
        identifier: config.identifier,
        fields: config.fields,
        default_language,
        table: config.table,
        localized,
    })
}

/// Remove a registration. A no-op for unknown identifiers.
pub fn unregister(identifier: &str) {
    let registry = global();
    let mut map = registry.inner.write().unwrap_or_else(|e| e.into_inner());
    map.remove(identifier);
}

/// Look up a registration by identifier.
pub fn get_registration(identifier: &str) -> Result<Arc<Registration>> {
    let registry = global();
    let map = registry.inner.read().unwrap_or_else(|e| e.into_inner());
    map.get(identifier)
        .cloned()
        .ok_or_else(|| TranslationError::Unregistered(identifier.to_string()))
}

pub fn is_registered(identifier: &str) -> bool {
    let registry = global();
    let map = registry.inner.read().unwrap_or_else(|e| e.into_inner());
    map.contains_key(identifier)
}

/// Identifiers of every current registration, ascending.
pub fn registered_identifiers() -> Vec<String> {
    let registry = global();
    let map = registry.inner.read().unwrap_or_else(|e| e.into_inner());
    let mut identifiers: Vec<String> = map.keys().cloned().collect();
    identifiers.sort();
    identifiers
}

/// Custom backing tables declared by current registrations, ascending
/// and deduplicated.
pub fn registered_tables() -> Vec<String> {
    let registry = global();
    let map = registry.inner.read().unwrap_or_else(|e| e.into_inner());
    let mut tables: Vec<String> = map
        .values()
        .filter_map(|reg| reg.table().map(str::to_string))
        .collect();
    tables.sort();
    tables.dedup();
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean(identifier: &str) {
        unregister(identifier);
    }

    // ==================== Registration Tests ====================

    #[test]
    #[serial]
    fn test_register_and_lookup() {
        clean("reg_article");
        let reg = register(RegistrationConfig::new(
            "reg_article",
            &["title", "body"],
            &["id", "title", "body", "created_at"],
        ))
        .expect("register");

        assert_eq!(reg.identifier(), "reg_article");
        assert_eq!(reg.field_names(), vec!["title", "body"]);
        assert!(reg.table().is_none());

        let looked_up = get_registration("reg_article").expect("lookup");
        assert_eq!(looked_up.identifier(), "reg_article");
        clean("reg_article");
    }

    #[test]
    #[serial]
    fn test_register_duplicate_identifier() {
        clean("reg_dup");
        register(RegistrationConfig::new("reg_dup", &["title"], &["title"]))
            .expect("first");
        let result = register(RegistrationConfig::new("reg_dup", &["title"], &["title"]));
        assert!(matches!(
            result,
            Err(TranslationError::AlreadyRegistered(id)) if id == "reg_dup"
        ));
        clean("reg_dup");
    }

    #[test]
    #[serial]
    fn test_register_empty_identifier() {
        let result = register(RegistrationConfig::new("", &["title"], &["title"]));
        assert!(matches!(
            result,
            Err(TranslationError::InvalidRegistration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_register_oversized_identifier() {
        let long = "x".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = register(RegistrationConfig::new(&long, &["title"], &["title"]));
        assert!(matches!(
            result,
            Err(TranslationError::InvalidRegistration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_register_no_fields() {
        let result = register(RegistrationConfig::new("reg_empty", &[], &["title"]));
        assert!(matches!(
            result,
            Err(TranslationError::InvalidRegistration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_register_unknown_model_field() {
        let result = register(RegistrationConfig::new(
            "reg_bad_field",
            &["missing"],
            &["title"],
        ));
        assert!(matches!(
            result,
            Err(TranslationError::InvalidRegistration(msg)) if msg.contains("missing")
        ));
    }

    #[test]
    #[serial]
    fn test_register_unsupported_default_language() {
        let result = register(
            RegistrationConfig::new("reg_bad_lang", &["title"], &["title"])
                .with_default_language("xx"),
        );
        assert!(matches!(
            result,
            Err(TranslationError::UnsupportedLanguage(lang)) if lang == "xx"
        ));
    }

    #[test]
    #[serial]
    fn test_register_custom_default_language_and_table() {
        clean("reg_custom");
        let reg = register(
            RegistrationConfig::new("reg_custom", &["title"], &["title"])
                .with_default_language("fr")
                .with_table("reg_custom_translations"),
        )
        .expect("register");

        assert_eq!(reg.default_language(), "fr");
        assert_eq!(reg.table(), Some("reg_custom_translations"));
        assert!(registered_tables().contains(&"reg_custom_translations".to_string()));
        clean("reg_custom");
    }

    // ==================== Lookup Tests ====================

    #[test]
    #[serial]
    fn test_unregistered_lookup_fails() {
        let result = get_registration("reg_nowhere");
        assert!(matches!(
            result,
            Err(TranslationError::Unregistered(id)) if id == "reg_nowhere"
        ));
        assert!(!is_registered("reg_nowhere"));
    }

    #[test]
    #[serial]
    fn test_unregister_is_idempotent() {
        clean("reg_gone");
        register(RegistrationConfig::new("reg_gone", &["title"], &["title"]))
            .expect("register");
        assert!(is_registered("reg_gone"));
        unregister("reg_gone");
        assert!(!is_registered("reg_gone"));
        unregister("reg_gone");
    }

    // ==================== Localized Field Tests ====================

    #[test]
    #[serial]
    fn test_localized_fields_cover_all_languages() {
        clean("reg_localized");
        let reg = register(RegistrationConfig::new(
            "reg_localized",
            &["title", "body"],
            &["title", "body"],
        ))
        .expect("register");

        let expected = 2 * crate::languages::supported_languages().len();
        assert_eq!(reg.localized_fields().len(), expected);

        let title_fr = reg.localized_field("title_fr").expect("title_fr");
        assert_eq!(title_fr.field_name(), "title");
        assert_eq!(title_fr.language(), "fr");
        assert!(reg.localized_field("title_xx").is_none());
        clean("reg_localized");
    }

    #[test]
    #[serial]
    fn test_file_field_kind() {
        clean("reg_file");
        let reg = register(
            RegistrationConfig::new("reg_file", &["title"], &["title", "attachment"])
                .with_file_field("attachment"),
        )
        .expect("register");

        assert_eq!(reg.field_kind("title"), Some(FieldKind::Text));
        assert_eq!(reg.field_kind("attachment"), Some(FieldKind::File));
        assert_eq!(reg.field_kind("nope"), None);
        clean("reg_file");
    }
}
