//! Integration tests for the translation layer.
//!
//! These tests exercise the full stack the way a host application would:
//! registration at startup, a model type owning its cache, reads and
//! writes through the trait surface, bulk prefetching, filter rewriting
//! and concurrent writers sharing one store.

use serial_test::serial;
use tempfile::TempDir;

use model_translations::{
    register, unregister, with_translations, Filter, PrefetchOptions, QueryPlan,
    RegistrationConfig, Translatable, TranslatableExt, TranslationCache, TranslationError,
    TranslationStore,
};

// ==================== Test Helpers ====================

struct Article {
    id: Option<i64>,
    translations: TranslationCache,
}

impl Article {
    fn new(id: Option<i64>) -> Self {
        Self {
            id,
            translations: TranslationCache::new("it_article", &["title", "body"], "en"),
        }
    }
}

impl Translatable for Article {
    fn translation_identifier(&self) -> &str {
        "it_article"
    }

    fn object_id(&self) -> Option<i64> {
        self.id
    }

    fn translations(&self) -> &TranslationCache {
        &self.translations
    }
}

fn create_test_store() -> (TranslationStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("integration_test.db");
    let store = TranslationStore::open(db_path.to_str().unwrap()).expect("Failed to open store");
    (store, temp_dir)
}

fn register_article() {
    unregister("it_article");
    register(RegistrationConfig::new(
        "it_article",
        &["title", "body"],
        &["id", "title", "body", "published"],
    ))
    .expect("Failed to register");
}

// ==================== End-to-End Lifecycle Tests ====================

#[test]
#[serial]
fn test_full_lifecycle_stage_save_reload() {
    register_article();
    let (store, _dir) = create_test_store();

    let article = Article::new(Some(1));
    article
        .set_attr(&store, "title_fr", Some("Bonjour"))
        .expect("set fr");
    article
        .set_attr(&store, "title_de", Some("Hallo"))
        .expect("set de");
    article
        .set_attr(&store, "body_fr", Some("Le corps"))
        .expect("set body");

    let report = article.save_translations(&store).expect("save");
    assert_eq!(report.created, 3);

    let reloaded = Article::new(Some(1));
    assert_eq!(
        reloaded.get_attr(&store, "title_fr").expect("get").as_deref(),
        Some("Bonjour")
    );
    assert_eq!(
        reloaded.available_languages(&store).expect("langs"),
        vec!["de", "fr"]
    );
    assert_eq!(reloaded.get_translations(&store, None).expect("all").len(), 3);
    unregister("it_article");
}

#[test]
#[serial]
fn test_unsaved_owner_stages_then_persists_after_id_assignment() {
    register_article();
    let (store, _dir) = create_test_store();

    let mut article = Article::new(None);
    article
        .set_attr(&store, "title_fr", Some("Brouillon"))
        .expect("set");
    // Staging against an unsaved owner never touches the store.
    assert_eq!(store.metrics().queries(), 0);
    assert!(matches!(
        article.save_translations(&store),
        Err(TranslationError::UnsavedOwner)
    ));

    article.id = Some(99);
    let report = article.save_translations(&store).expect("save");
    assert_eq!(report.created, 1);

    let fresh = Article::new(Some(99));
    assert_eq!(
        fresh.get_attr(&store, "title_fr").expect("get").as_deref(),
        Some("Brouillon")
    );
    unregister("it_article");
}

#[test]
#[serial]
fn test_clearing_and_rewriting_values_across_saves() {
    register_article();
    let (store, _dir) = create_test_store();

    let article = Article::new(Some(1));
    article
        .set_attr(&store, "title_fr", Some("Premier"))
        .expect("set");
    article.save_translations(&store).expect("save");

    // Clear, rewrite, clear again within one staging window.
    article.set_attr(&store, "title_fr", None).expect("clear");
    article
        .set_attr(&store, "title_fr", Some("Deuxième"))
        .expect("rewrite");
    let report = article.save_translations(&store).expect("save");
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 0);

    article.set_attr(&store, "title_fr", Some("")).expect("clear");
    let report = article.save_translations(&store).expect("save");
    assert_eq!(report.deleted, 1);
    assert!(article.get_translations(&store, None).expect("all").is_empty());
    unregister("it_article");
}

// ==================== Language Resolution Tests ====================

#[test]
#[serial]
fn test_language_precedence_chain() {
    model_translations::languages::deactivate();
    register_article();
    let (store, _dir) = create_test_store();

    let article = Article::new(Some(1));
    article
        .set_attr(&store, "title_en", Some("Hello"))
        .expect("set en");
    article
        .set_attr(&store, "title_fr", Some("Bonjour"))
        .expect("set fr");
    article
        .set_attr(&store, "title_de", Some("Hallo"))
        .expect("set de");

    // Registered default with nothing active.
    assert_eq!(
        article.get_field(&store, "title").expect("get").as_deref(),
        Some("Hello")
    );

    // Thread-active language.
    {
        let _guard = model_translations::languages::override_language("de").expect("override");
        assert_eq!(
            article.get_field(&store, "title").expect("get").as_deref(),
            Some("Hallo")
        );

        // Instance override beats the thread-active language.
        article.activate_language("fr").expect("activate");
        assert_eq!(
            article.get_field(&store, "title").expect("get").as_deref(),
            Some("Bonjour")
        );
    }

    article.deactivate_language();
    assert_eq!(article.active_language(), "en");
    unregister("it_article");
}

#[test]
#[serial]
fn test_reads_fall_back_to_default_language() {
    register_article();
    let (store, _dir) = create_test_store();

    let article = Article::new(Some(1));
    article
        .set_attr(&store, "title_en", Some("Hello"))
        .expect("set");
    article.save_translations(&store).expect("save");

    let fresh = Article::new(Some(1));
    fresh.activate_language("es").expect("activate");
    assert_eq!(
        fresh.get_field(&store, "title").expect("get").as_deref(),
        Some("Hello")
    );
    // The suffixed accessor stays exact.
    assert!(fresh.get_attr(&store, "title_es").expect("get").is_none());
    unregister("it_article");
}

// ==================== Prefetch Tests ====================

#[test]
#[serial]
fn test_prefetch_then_read_everything_from_cache() {
    register_article();
    let (store, _dir) = create_test_store();

    for id in 1..=20 {
        let article = Article::new(Some(id));
        article
            .set_attr(&store, "title_fr", Some(&format!("Titre {id}")))
            .expect("set");
        article.save_translations(&store).expect("save");
    }

    let articles: Vec<Article> = (1..=20).map(|id| Article::new(Some(id))).collect();
    store.metrics().reset();

    with_translations(&store, &articles, &PrefetchOptions::default()).expect("prefetch");
    assert_eq!(store.metrics().queries(), 1);

    for (index, article) in articles.iter().enumerate() {
        let expected = format!("Titre {}", index + 1);
        assert_eq!(
            article.get_attr(&store, "title_fr").expect("get").as_deref(),
            Some(expected.as_str())
        );
        // Absent pairs are cached as absent.
        assert!(article.get_attr(&store, "body_de").expect("get").is_none());
    }
    assert_eq!(store.metrics().queries(), 1);
    unregister("it_article");
}

#[test]
#[serial]
fn test_prefetch_chunking_bounds_query_count() {
    register_article();
    let (store, _dir) = create_test_store();

    for id in 1..=10 {
        let article = Article::new(Some(id));
        article
            .set_attr(&store, "title_fr", Some("Titre"))
            .expect("set");
        article.save_translations(&store).expect("save");
    }

    let articles: Vec<Article> = (1..=10).map(|id| Article::new(Some(id))).collect();
    store.metrics().reset();

    let options = PrefetchOptions {
        chunk_size: Some(3),
        ..PrefetchOptions::default()
    };
    with_translations(&store, &articles, &options).expect("prefetch");
    assert_eq!(store.metrics().queries(), 4);
    unregister("it_article");
}

// ==================== Filter Rewriting Tests ====================

#[test]
#[serial]
fn test_filter_rewriting_end_to_end() {
    register_article();
    let (store, _dir) = create_test_store();

    for (id, title) in [(1, "Bonjour"), (2, "Salut"), (3, "Bonjour")] {
        let article = Article::new(Some(id));
        article.set_attr(&store, "title_fr", Some(title)).expect("set");
        article.save_translations(&store).expect("save");
    }

    let plan = model_translations::rewrite_filter(
        &store,
        "it_article",
        &Filter::eq("title_fr", "Bonjour"),
    )
    .expect("rewrite");
    assert_eq!(plan, QueryPlan::IdIn(vec![1, 3]));

    // No matching translations must never mean "all rows".
    let plan = model_translations::rewrite_filter(
        &store,
        "it_article",
        &Filter::eq("title_fr", "Inexistant"),
    )
    .expect("rewrite");
    let (sql, params) = plan.to_sql("id");
    assert_eq!(sql, "0 = 1");
    assert!(params.is_empty());
    unregister("it_article");
}

// ==================== Custom Table Tests ====================

#[test]
#[serial]
fn test_registration_with_custom_backing_table() {
    unregister("it_press");
    register(
        RegistrationConfig::new("it_press", &["headline"], &["id", "headline"])
            .with_table("press_translations"),
    )
    .expect("register");

    let (store, _dir) = create_test_store();
    store.ensure_table("press_translations").expect("table");

    struct Press {
        translations: TranslationCache,
    }
    impl Translatable for Press {
        fn translation_identifier(&self) -> &str {
            "it_press"
        }
        fn object_id(&self) -> Option<i64> {
            Some(1)
        }
        fn translations(&self) -> &TranslationCache {
            &self.translations
        }
    }

    let press = Press {
        translations: TranslationCache::for_identifier("it_press").expect("cache"),
    };
    press
        .set_attr(&store, "headline_fr", Some("Gros titre"))
        .expect("set");
    press.save_translations(&store).expect("save");

    // The default table stays untouched.
    assert!(store
        .get_translations("it_article", 1, None)
        .expect("query")
        .is_empty());
    assert_eq!(
        press.get_translations(&store, None).expect("query").len(),
        1
    );
    assert_eq!(store.get_languages().expect("langs"), vec!["fr"]);
    unregister("it_press");
}

// ==================== Concurrency Tests ====================

#[test]
#[serial]
fn test_concurrent_writers_converge_to_unique_rows() {
    register_article();
    let (store, _dir) = create_test_store();
    let languages = ["en", "fr", "es", "de", "it"];

    let handles: Vec<_> = (0..10)
        .map(|worker| {
            let store = store.clone();
            let language = languages[worker % languages.len()];
            std::thread::spawn(move || {
                let article = Article::new(Some(1));
                article
                    .set_attr(&store, &format!("title_{language}"), Some("Concurrent"))
                    .expect("set");
                article.save_translations(&store).expect("save");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    // Uniqueness holds no matter how the writers interleaved: at most one
    // row per (language, field) pair.
    let rows = store.get_translations("it_article", 1, None).expect("query");
    assert!(rows.len() <= languages.len());
    assert_eq!(
        store.available_languages("it_article", 1).expect("langs").len(),
        rows.len()
    );
    unregister("it_article");
}

// ==================== Cache Introspection Tests ====================

#[test]
#[serial]
fn test_cache_introspection_and_clearing() {
    register_article();
    let (store, _dir) = create_test_store();

    let article = Article::new(Some(1));
    article
        .set_attr(&store, "title_fr", Some("Titre"))
        .expect("set");
    article
        .set_attr(&store, "body_en", Some("Body"))
        .expect("set");

    assert_eq!(article.cached_translations_count(), 2);
    assert_eq!(article.translations().cached_fields(), vec!["body", "title"]);
    assert_eq!(article.translations().cached_languages(), vec!["en", "fr"]);

    article.clear_translations_cache();
    assert_eq!(article.cached_translations_count(), 0);
    unregister("it_article");
}
