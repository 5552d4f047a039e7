//! Model translations stored in a side table.
//!
//! Translatable model types keep their localized field values out of
//! their own table: each `(identifier, object_id, language, field_name)`
//! pair maps to one row in a shared translation store. Instances read
//! and write through a per-instance write-behind cache and flush pending
//! changes in a single transaction when saved.
//!
//! ```no_run
//! use model_translations::{
//!     RegistrationConfig, Translatable, TranslatableExt, TranslationCache, TranslationStore,
//! };
//!
//! struct Article {
//!     id: Option<i64>,
//!     translations: TranslationCache,
//! }
//!
//! impl Translatable for Article {
//!     fn translation_identifier(&self) -> &str {
//!         "article"
//!     }
//!     fn object_id(&self) -> Option<i64> {
//!         self.id
//!     }
//!     fn translations(&self) -> &TranslationCache {
//!         &self.translations
//!     }
//! }
//!
//! # fn main() -> model_translations::Result<()> {
//! model_translations::register(RegistrationConfig::new(
//!     "article",
//!     &["title"],
//!     &["id", "title"],
//! ))?;
//! let store = TranslationStore::open("translations.db")?;
//!
//! let article = Article {
//!     id: Some(1),
//!     translations: TranslationCache::for_identifier("article")?,
//! };
//! article.set_attr(&store, "title_fr", Some("Bonjour"))?;
//! article.save_translations(&store)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod fields;
pub mod languages;
pub mod metrics;
pub mod model;
pub mod query;
pub mod record;
pub mod registry;
pub mod store;
pub mod sync;

pub use cache::{CachedTranslation, TranslationCache};
pub use error::{Result, TranslationError};
pub use fields::{FieldKind, FileHandle, LocalizedField, TranslatableField};
pub use languages::{LanguageConfig, LanguageOverride, LanguageSettings};
pub use metrics::{MetricsReport, StoreMetrics};
pub use model::{Translatable, TranslatableExt};
pub use query::{
    activate_language, rewrite_filter, with_translations, Filter, LookupOp, PrefetchOptions,
    QueryPlan,
};
pub use record::{TranslationKey, TranslationRecord};
pub use registry::{register, unregister, Registration, RegistrationConfig};
pub use store::{TranslationStore, DEFAULT_TABLE};
pub use sync::{SyncReport, Synchronizer};
