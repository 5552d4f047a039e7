//! Process-wide language configuration and the active-language slot.
//!
//! The supported-language enumeration and the default language are supplied
//! from outside the core (environment or explicit [`configure`] call) and are
//! treated as immutable for the duration of a process; tests may swap them
//! through the same `configure` entry point. The thread-local active language
//! models the "current request locale" of the host framework and can be
//! overridden for a scope with [`override_language`].

use std::cell::RefCell;
use std::sync::{Arc, RwLock};

use crate::error::{Result, TranslationError};

/// Configuration for a supported language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "fr")
    pub code: String,

    /// English name of the language (e.g., "English", "French")
    pub name: String,
}

/// The supported-language enumeration plus the process default.
#[derive(Debug, Clone)]
pub struct LanguageSettings {
    languages: Vec<LanguageConfig>,
    default_language: String,
}

/// Process-wide settings slot (initialized lazily with the defaults).
static SETTINGS: RwLock<Option<Arc<LanguageSettings>>> = RwLock::new(None);

thread_local! {
    /// Currently active language for this thread, if any.
    static ACTIVE: RefCell<Option<String>> = const { RefCell::new(None) };
}

impl LanguageSettings {
    /// Build settings from explicit codes and a default language.
    ///
    /// The default must be one of the supported codes and the code list must
    /// not be empty.
    pub fn new(languages: Vec<LanguageConfig>, default_language: &str) -> Result<Self> {
        if languages.is_empty() {
            return Err(TranslationError::Config(
                "supported language list must not be empty".into(),
            ));
        }
        if !languages.iter().any(|lang| lang.code == default_language) {
            return Err(TranslationError::UnsupportedLanguage(
                default_language.to_string(),
            ));
        }
        Ok(Self {
            languages,
            default_language: default_language.to_string(),
        })
    }

    /// Build settings from bare language codes.
    pub fn from_codes(codes: &[&str], default_language: &str) -> Result<Self> {
        let languages = codes
            .iter()
            .map(|code| LanguageConfig {
                code: (*code).to_string(),
                name: String::new(),
            })
            .collect();
        Self::new(languages, default_language)
    }

    /// Read settings from the environment.
    ///
    /// `MODEL_TRANSLATIONS_LANGUAGES` is a comma-separated code list and
    /// `MODEL_TRANSLATIONS_DEFAULT_LANGUAGE` selects the default (falls back
    /// to the first listed code when unset).
    pub fn from_env() -> Result<Self> {
        let codes = std::env::var("MODEL_TRANSLATIONS_LANGUAGES")
            .map_err(|_| TranslationError::Config("MODEL_TRANSLATIONS_LANGUAGES not set".into()))?;
        let codes: Vec<&str> = codes
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect();
        let default = std::env::var("MODEL_TRANSLATIONS_DEFAULT_LANGUAGE")
            .ok()
            .or_else(|| codes.first().map(|code| (*code).to_string()))
            .ok_or_else(|| {
                TranslationError::Config("MODEL_TRANSLATIONS_LANGUAGES is empty".into())
            })?;
        Self::from_codes(&codes, &default)
    }

    /// All supported language codes, in configuration order.
    pub fn codes(&self) -> Vec<&str> {
        self.languages.iter().map(|lang| lang.code.as_str()).collect()
    }

    /// All supported language configurations.
    pub fn list_all(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// The process default language code.
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Whether the given code is in the supported set.
    pub fn is_supported(&self, code: &str) -> bool {
        self.languages.iter().any(|lang| lang.code == code)
    }

    /// Resolve an arbitrary code against the supported set.
    ///
    /// Region subtags are stripped when the bare language is supported
    /// ("fr-ca" resolves to "fr"); anything else resolves to the default.
    pub fn resolve(&self, code: &str) -> &str {
        if let Some(lang) = self.languages.iter().find(|lang| lang.code == code) {
            return &lang.code;
        }
        if let Some((base, _region)) = code.split_once('-') {
            if let Some(lang) = self.languages.iter().find(|lang| lang.code == base) {
                return &lang.code;
            }
        }
        &self.default_language
    }
}

/// Default language configurations used when nothing was configured.
fn default_settings() -> LanguageSettings {
    let languages = [
        ("en", "English"),
        ("fr", "French"),
        ("es", "Spanish"),
        ("de", "German"),
        ("it", "Italian"),
        ("pt", "Portuguese"),
    ]
    .iter()
    .map(|(code, name)| LanguageConfig {
        code: (*code).to_string(),
        name: (*name).to_string(),
    })
    .collect();

    LanguageSettings {
        languages,
        default_language: "en".to_string(),
    }
}

/// Install process-wide language settings.
///
/// Intended to be called once at startup; tests use it to swap the
/// enumeration between cases.
pub fn configure(new_settings: LanguageSettings) {
    let mut slot = SETTINGS.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(Arc::new(new_settings));
}

/// The current process-wide language settings.
pub fn settings() -> Arc<LanguageSettings> {
    {
        let slot = SETTINGS.read().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = slot.as_ref() {
            return Arc::clone(current);
        }
    }
    let mut slot = SETTINGS.write().unwrap_or_else(|e| e.into_inner());
    let current = slot.get_or_insert_with(|| Arc::new(default_settings()));
    Arc::clone(current)
}

/// Supported language codes, in configuration order.
pub fn supported_languages() -> Vec<String> {
    settings().codes().iter().map(|c| (*c).to_string()).collect()
}

/// The configured default language code.
pub fn default_language() -> String {
    settings().default_language().to_string()
}

/// Whether the given code is currently supported.
pub fn is_supported(code: &str) -> bool {
    settings().is_supported(code)
}

/// Activate a language for the current thread.
pub fn activate(code: &str) -> Result<()> {
    if !is_supported(code) {
        return Err(TranslationError::UnsupportedLanguage(code.to_string()));
    }
    ACTIVE.with(|slot| *slot.borrow_mut() = Some(code.to_string()));
    Ok(())
}

/// Clear the current thread's active language.
pub fn deactivate() {
    ACTIVE.with(|slot| *slot.borrow_mut() = None);
}

/// The current thread's active language, if one was activated.
pub fn active() -> Option<String> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

/// Scoped override of the thread-active language.
///
/// Restores the previously active language when dropped, on all exit paths.
#[derive(Debug)]
pub struct LanguageOverride {
    previous: Option<String>,
}

impl Drop for LanguageOverride {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Activate `code` for the current scope, restoring the prior active
/// language when the returned guard is dropped.
pub fn override_language(code: &str) -> Result<LanguageOverride> {
    let previous = active();
    activate(code)?;
    Ok(LanguageOverride { previous })
}
