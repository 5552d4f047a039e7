//! Collection-level operations: batched prefetch and filter rewriting.
//!
//! Prefetching loads the translations of a whole collection with one
//! store query (or a handful of chunked ones) instead of one per access.
//! Filter rewriting turns predicates on virtual translated fields into
//! `id IN (...)` predicates the host's own queries can consume.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, TranslationError};
use crate::languages;
use crate::model::{resolve_localized_name, Translatable};
use crate::registry;
use crate::store::TranslationStore;

/// Tuning knobs for [`with_translations`].
#[derive(Debug, Clone, Default)]
pub struct PrefetchOptions {
    /// Restrict to these fields; all registered fields when `None`.
    pub field_names: Option<Vec<String>>,
    /// Restrict to these languages; all supported languages when `None`.
    pub languages: Option<Vec<String>>,
    /// Split the owner-id predicate into batches of this size.
    pub chunk_size: Option<usize>,
    /// Re-fetch instances already marked prefetched.
    pub force: bool,
}

/// Load translations for a whole collection in bulk and distribute them
/// into each instance's cache.
///
/// Every requested `(field, language)` pair ends up cached afterwards,
/// present or not, so later reads never touch the store. Instances
/// already prefetched are skipped unless `force` is set; unsaved
/// instances are always skipped. Returns the number of fetched records.
///
/// # Errors
///
/// [`TranslationError::MixedIdentifiers`] when the collection spans more
/// than one registered type.
pub fn with_translations<T: Translatable>(
    store: &TranslationStore,
    instances: &[T],
    options: &PrefetchOptions,
) -> Result<usize> {
    let Some(first) = instances.first() else {
        return Ok(0);
    };
    let identifier = first.translation_identifier().to_string();
    for instance in instances {
        if instance.translation_identifier() != identifier {
            return Err(TranslationError::MixedIdentifiers(
                identifier,
                instance.translation_identifier().to_string(),
            ));
        }
    }

    let targets: Vec<&T> = instances
        .iter()
        .filter(|i| i.object_id().is_some())
        .filter(|i| options.force || !i.translations().is_prefetched())
        .collect();
    if targets.is_empty() {
        return Ok(0);
    }

    let mut object_ids: Vec<i64> = targets.iter().filter_map(|i| i.object_id()).collect();
    object_ids.sort_unstable();
    object_ids.dedup();

    let records = store.get_for_objects(
        &identifier,
        &object_ids,
        options.field_names.as_deref(),
        options.languages.as_deref(),
        options.chunk_size,
    )?;

    let mut grouped: HashMap<i64, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        grouped.entry(record.object_id).or_default().push(index);
    }

    let lang_list = match &options.languages {
        Some(langs) => langs.clone(),
        None => languages::supported_languages(),
    };
    for target in &targets {
        let cache = target.translations();
        let object_id = target.object_id();
        if let Some(indexes) = object_id.and_then(|id| grouped.get(&id)) {
            for index in indexes {
                cache.insert_record(&records[*index]);
            }
        }
        let field_list = match &options.field_names {
            Some(fields) => fields.clone(),
            None => cache.fields().to_vec(),
        };
        cache.populate_missing(&field_list, &lang_list, object_id);
        cache.mark_prefetched();
    }

    debug!(
        identifier,
        instances = targets.len(),
        records = records.len(),
        "distributed prefetched translations"
    );
    Ok(records.len())
}

/// Pin every instance in a collection to one language.
///
/// An unsupported code falls back to the process default rather than
/// failing the whole collection.
pub fn activate_language<T: Translatable>(instances: &[T], language: &str) {
    let resolved = if languages::is_supported(language) {
        language.to_string()
    } else {
        languages::default_language()
    };
    for instance in instances {
        instance
            .translations()
            .set_language_override(Some(&resolved));
    }
}

/// String comparison applied to stored field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    Eq,
    Contains,
    StartsWith,
    EndsWith,
}

impl LookupOp {
    /// SQL fragment with one bare placeholder for [`LookupOp::param`].
    pub(crate) fn sql_condition(&self, column: &str) -> String {
        match self {
            LookupOp::Eq => format!("{column} = ?"),
            _ => format!("{column} LIKE ? ESCAPE '\\'"),
        }
    }

    pub(crate) fn param(&self, value: &str) -> String {
        match self {
            LookupOp::Eq => value.to_string(),
            LookupOp::Contains => format!("%{}%", escape_like(value)),
            LookupOp::StartsWith => format!("{}%", escape_like(value)),
            LookupOp::EndsWith => format!("%{}", escape_like(value)),
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A predicate over a registered type's attributes, virtual or concrete.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `name` is a base translatable field (`title`), a suffixed one
    /// (`title_fr`), or a concrete column of the host table.
    Field {
        name: String,
        op: LookupOp,
        value: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(name: &str, value: &str) -> Self {
        Filter::Field {
            name: name.to_string(),
            op: LookupOp::Eq,
            value: value.to_string(),
        }
    }

    pub fn contains(name: &str, value: &str) -> Self {
        Filter::Field {
            name: name.to_string(),
            op: LookupOp::Contains,
            value: value.to_string(),
        }
    }
}

/// A [`Filter`] with every virtual-field predicate resolved against the
/// store, ready to render into the host's own SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Untouched predicate on a concrete host column.
    Column {
        name: String,
        op: LookupOp,
        value: String,
    },
    /// Owner ids whose translations matched. Empty means match nothing.
    IdIn(Vec<i64>),
    And(Vec<QueryPlan>),
    Or(Vec<QueryPlan>),
}

impl QueryPlan {
    /// Render as a WHERE fragment plus its bind parameters. `id_column`
    /// names the host table's id column.
    pub fn to_sql(&self, id_column: &str) -> (String, Vec<String>) {
        match self {
            QueryPlan::Column { name, op, value } => {
                (op.sql_condition(name), vec![op.param(value)])
            }
            QueryPlan::IdIn(ids) => {
                if ids.is_empty() {
                    ("0 = 1".to_string(), Vec::new())
                } else {
                    let list = ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    (format!("{id_column} IN ({list})"), Vec::new())
                }
            }
            QueryPlan::And(plans) => Self::join(plans, " AND ", "1 = 1", id_column),
            QueryPlan::Or(plans) => Self::join(plans, " OR ", "0 = 1", id_column),
        }
    }

    fn join(
        plans: &[QueryPlan],
        separator: &str,
        empty: &str,
        id_column: &str,
    ) -> (String, Vec<String>) {
        if plans.is_empty() {
            return (empty.to_string(), Vec::new());
        }
        let mut fragments = Vec::with_capacity(plans.len());
        let mut params = Vec::new();
        for plan in plans {
            let (sql, mut p) = plan.to_sql(id_column);
            fragments.push(format!("({sql})"));
            params.append(&mut p);
        }
        (fragments.join(separator), params)
    }
}

/// Rewrite a filter for one registered type.
///
/// Predicates on translatable fields resolve to owner-id sets through
/// the store; a base name always targets the registration's default
/// language (the active language plays no part here), a suffixed name
/// targets its exact language. Anything else passes through as a
/// concrete column predicate.
pub fn rewrite_filter(
    store: &TranslationStore,
    identifier: &str,
    filter: &Filter,
) -> Result<QueryPlan> {
    let registration = registry::get_registration(identifier)?;
    let fields = registration.field_names();

    rewrite_inner(store, identifier, &fields, registration.default_language(), filter)
}

fn rewrite_inner(
    store: &TranslationStore,
    identifier: &str,
    fields: &[String],
    default_language: &str,
    filter: &Filter,
) -> Result<QueryPlan> {
    match filter {
        Filter::Field { name, op, value } => {
            let target = if fields.iter().any(|f| f == name) {
                Some((name.clone(), default_language.to_string()))
            } else {
                resolve_localized_name(fields, name)
            };

            match target {
                Some((field, language)) => {
                    let ids =
                        store.matching_object_ids(identifier, &field, &language, *op, value)?;
                    Ok(QueryPlan::IdIn(ids))
                }
                None => Ok(QueryPlan::Column {
                    name: name.clone(),
                    op: *op,
                    value: value.clone(),
                }),
            }
        }
        Filter::And(filters) => Ok(QueryPlan::And(
            filters
                .iter()
                .map(|f| rewrite_inner(store, identifier, fields, default_language, f))
                .collect::<Result<Vec<_>>>()?,
        )),
        Filter::Or(filters) => Ok(QueryPlan::Or(
            filters
                .iter()
                .map(|f| rewrite_inner(store, identifier, fields, default_language, f))
                .collect::<Result<Vec<_>>>()?,
        )),
    }
}
