//! Error taxonomy for the translation layer.
//!
//! Configuration errors are raised at registration time and always propagate
//! (fail fast at startup). Usage errors indicate a programming mistake in the
//! calling code and propagate as-is. Uniqueness conflicts on the create path
//! are absorbed inside the synchronizer and never surface here. A missing
//! translation is not an error at all; it is represented as `None`.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TranslationError>;

/// All errors the translation layer can produce.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// An identifier was registered twice.
    #[error("identifier '{0}' is already registered")]
    AlreadyRegistered(String),

    /// An operation referenced an identifier that was never registered.
    #[error("identifier '{0}' has not been registered")]
    Unregistered(String),

    /// Malformed registration metadata (empty field list, unknown field
    /// name, oversized identifier, ...).
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    /// A language code outside the configured supported set.
    #[error("unsupported language code '{0}'")]
    UnsupportedLanguage(String),

    /// An attribute name that resolves to neither a translatable field nor
    /// a localized variant of one.
    #[error("'{0}' does not resolve to a translatable attribute")]
    UnknownAttribute(String),

    /// Translations were flushed for an owner that has no object id yet.
    #[error("owner has no object id; save the owner row before its translations")]
    UnsavedOwner,

    /// A prefetch batch mixed instances of different registered types.
    #[error("cannot prefetch across identifiers: '{0}' and '{1}'")]
    MixedIdentifiers(String, String),

    /// Malformed environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error bubbled up from the backing store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}
