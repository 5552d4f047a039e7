//! The rusqlite-backed translation record store.
//!
//! All shared mutable state lives here; instance caches coordinate only
//! through this store, under SQLite's own row-level uniqueness enforcement.
//! Every operation is a synchronous blocking call and every query or
//! record mutation is counted in [`StoreMetrics`]; only schema creation
//! and transaction control statements go uncounted.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{Result, TranslationError};
use crate::metrics::StoreMetrics;
use crate::query::LookupOp;
use crate::record::{TranslationKey, TranslationRecord};
use crate::registry;
use crate::sync::{Batch, SyncReport};

/// Table used for registrations without a custom backing table.
pub const DEFAULT_TABLE: &str = "translations";

const RECORD_COLUMNS: &str =
    "id, identifier, object_id, language, field_name, field_value, updated_at";

/// Handle to the translation side table(s).
///
/// Cloning shares the underlying connection and metrics.
#[derive(Clone)]
pub struct TranslationStore {
    conn: Arc<Mutex<Connection>>,
    metrics: Arc<StoreMetrics>,
}

impl TranslationStore {
    /// Open (or create) the store at the given path and ensure the default
    /// table's schema exists.
    pub fn open(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)?;
        Self::create_schema(&conn, DEFAULT_TABLE)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            metrics: Arc::new(StoreMetrics::default()),
        })
    }

    /// Ensure the schema exists for a custom backing table declared by a
    /// registration.
    pub fn ensure_table(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        let conn = self.lock_conn();
        Self::create_schema(&conn, table)
    }

    /// Operation counters for this store.
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn create_schema(conn: &Connection, table: &str) -> Result<()> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    identifier TEXT NOT NULL,
                    object_id INTEGER NOT NULL,
                    language TEXT NOT NULL,
                    field_name TEXT NOT NULL,
                    field_value TEXT,
                    updated_at TEXT NOT NULL,
                    UNIQUE (identifier, object_id, language, field_name)
                )"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table} (identifier, object_id)"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_object_id ON {table} (object_id)"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_language ON {table} (language)"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_field_name ON {table} (field_name)"
            ),
            [],
        )?;
        Ok(())
    }

    /// Resolve the backing table for an identifier (the registration's
    /// custom table, or the default).
    pub fn table_for(&self, identifier: &str) -> String {
        registry::get_registration(identifier)
            .ok()
            .and_then(|reg| reg.table().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TABLE.to_string())
    }

    /// Fetch the single record for a unique key, if present.
    ///
    /// Absence is a normal state ("no translation yet"), not an error.
    pub fn get(&self, key: &TranslationKey) -> Result<Option<TranslationRecord>> {
        let table = self.table_for(&key.identifier);
        let conn = self.lock_conn();
        self.metrics.record_query();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM {table}
                     WHERE identifier = ?1 AND object_id = ?2
                       AND language = ?3 AND field_name = ?4"
                ),
                params![key.identifier, key.object_id, key.language, key.field_name],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records for one owner, optionally restricted to one language.
    pub fn get_translations(
        &self,
        identifier: &str,
        object_id: i64,
        language: Option<&str>,
    ) -> Result<Vec<TranslationRecord>> {
        let table = self.table_for(identifier);
        let conn = self.lock_conn();
        self.metrics.record_query();

        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {table} WHERE identifier = ?1 AND object_id = ?2"
        );
        let mut args: Vec<Value> = vec![
            Value::from(identifier.to_string()),
            Value::from(object_id),
        ];
        if let Some(lang) = language {
            sql.push_str(" AND language = ?3");
            args.push(Value::from(lang.to_string()));
        }
        sql.push_str(" ORDER BY field_name, language");

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Batched fetch across many owners, for prefetching.
    ///
    /// `chunk_size` splits the `object_id IN (...)` predicate to bound
    /// parameter-count growth on very large collections.
    pub fn get_for_objects(
        &self,
        identifier: &str,
        object_ids: &[i64],
        field_names: Option<&[String]>,
        languages: Option<&[String]>,
        chunk_size: Option<usize>,
    ) -> Result<Vec<TranslationRecord>> {
        if object_ids.is_empty() {
            return Ok(Vec::new());
        }
        let chunk = chunk_size.unwrap_or(object_ids.len()).max(1);
        let mut records = Vec::new();
        for ids in object_ids.chunks(chunk) {
            records.extend(self.fetch_chunk(identifier, ids, field_names, languages)?);
        }
        debug!(
            identifier,
            owners = object_ids.len(),
            records = records.len(),
            "prefetched translations"
        );
        Ok(records)
    }

    fn fetch_chunk(
        &self,
        identifier: &str,
        object_ids: &[i64],
        field_names: Option<&[String]>,
        languages: Option<&[String]>,
    ) -> Result<Vec<TranslationRecord>> {
        let table = self.table_for(identifier);
        let conn = self.lock_conn();
        self.metrics.record_query();

        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {table} WHERE identifier = ? AND object_id IN ({})",
            placeholders(object_ids.len())
        );
        let mut args: Vec<Value> = Vec::with_capacity(object_ids.len() + 1);
        args.push(Value::from(identifier.to_string()));
        args.extend(object_ids.iter().map(|id| Value::from(*id)));

        if let Some(fields) = field_names {
            sql.push_str(&format!(" AND field_name IN ({})", placeholders(fields.len())));
            args.extend(fields.iter().map(|f| Value::from(f.clone())));
        }
        if let Some(langs) = languages {
            sql.push_str(&format!(" AND language IN ({})", placeholders(langs.len())));
            args.extend(langs.iter().map(|l| Value::from(l.clone())));
        }
        sql.push_str(" ORDER BY object_id, field_name, language");

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete an owner's records, optionally for one language only.
    ///
    /// Returns the number of deleted rows. Also the entry point for the
    /// host's post-delete hook when the owner itself is removed.
    pub fn delete_translations(
        &self,
        identifier: &str,
        object_id: i64,
        language: Option<&str>,
    ) -> Result<usize> {
        let table = self.table_for(identifier);
        let conn = self.lock_conn();
        self.metrics.record_delete();

        let deleted = match language {
            Some(lang) => conn.execute(
                &format!(
                    "DELETE FROM {table}
                     WHERE identifier = ?1 AND object_id = ?2 AND language = ?3"
                ),
                params![identifier, object_id, lang],
            )?,
            None => conn.execute(
                &format!("DELETE FROM {table} WHERE identifier = ?1 AND object_id = ?2"),
                params![identifier, object_id],
            )?,
        };
        debug!(identifier, object_id, deleted, "deleted translations");
        Ok(deleted)
    }

    /// Distinct languages present in the store, ascending. Spans the
    /// default table and every registered custom table.
    pub fn get_languages(&self) -> Result<Vec<String>> {
        let mut tables = vec![DEFAULT_TABLE.to_string()];
        tables.extend(registry::registered_tables());
        tables.dedup();

        let conn = self.lock_conn();
        let mut languages = std::collections::BTreeSet::new();
        for table in tables {
            if !self.table_exists(&conn, &table)? {
                continue;
            }
            self.metrics.record_query();
            let mut stmt =
                conn.prepare(&format!("SELECT DISTINCT language FROM {table}"))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for language in rows {
                languages.insert(language?);
            }
        }
        Ok(languages.into_iter().collect())
    }

    /// Distinct languages with at least one stored translation for the
    /// given owner, ascending.
    pub fn available_languages(&self, identifier: &str, object_id: i64) -> Result<Vec<String>> {
        let table = self.table_for(identifier);
        let conn = self.lock_conn();
        self.metrics.record_query();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT language FROM {table}
             WHERE identifier = ?1 AND object_id = ?2 ORDER BY language"
        ))?;
        let languages = stmt
            .query_map(params![identifier, object_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(languages)
    }

    /// Owner ids whose stored value for `(field_name, language)` matches
    /// the lookup. Used by the query rewriter.
    pub fn matching_object_ids(
        &self,
        identifier: &str,
        field_name: &str,
        language: &str,
        op: LookupOp,
        value: &str,
    ) -> Result<Vec<i64>> {
        let table = self.table_for(identifier);
        let conn = self.lock_conn();
        self.metrics.record_query();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT object_id FROM {table}
             WHERE identifier = ? AND field_name = ? AND language = ?
               AND {} ORDER BY object_id",
            op.sql_condition("field_value")
        ))?;
        let ids = stmt
            .query_map(
                params![identifier, field_name, language, op.param(value)],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn table_exists(&self, conn: &Connection, table: &str) -> Result<bool> {
        self.metrics.record_query();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Apply one owner's partitioned changes inside a single transaction.
    ///
    /// A uniqueness violation on the create path means a concurrent writer
    /// won the race; the colliding row falls back to an update instead of
    /// failing the batch.
    pub(crate) fn apply_batch(&self, batch: &Batch) -> Result<SyncReport> {
        let conn = self.lock_conn();

        conn.execute("BEGIN IMMEDIATE", [])?;
        match self.apply_batch_inner(&conn, batch) {
            Ok(report) => {
                conn.execute("COMMIT", [])?;
                Ok(report)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    fn apply_batch_inner(&self, conn: &Connection, batch: &Batch) -> Result<SyncReport> {
        let table = &batch.table;
        let mut report = SyncReport::default();
        let now = Utc::now().to_rfc3339();

        {
            let mut insert = conn.prepare(&format!(
                "INSERT INTO {table}
                 (identifier, object_id, language, field_name, field_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            let mut fallback = conn.prepare(&format!(
                "UPDATE {table} SET field_value = ?1, updated_at = ?2
                 WHERE identifier = ?3 AND object_id = ?4
                   AND language = ?5 AND field_name = ?6"
            ))?;

            for record in &batch.creates {
                let result = insert.execute(params![
                    record.identifier,
                    record.object_id,
                    record.language,
                    record.field_name,
                    record.field_value,
                    now,
                ]);
                match result {
                    Ok(_) => {
                        self.metrics.record_insert();
                        report.created += 1;
                    }
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        warn!(
                            key = %record.key(),
                            "create raced a concurrent writer, converting to update"
                        );
                        self.metrics.record_conflict();
                        fallback.execute(params![
                            record.field_value,
                            now,
                            record.identifier,
                            record.object_id,
                            record.language,
                            record.field_name,
                        ])?;
                        self.metrics.record_update();
                        report.updated += 1;
                    }
                    Err(e) => return Err(TranslationError::Storage(e)),
                }
            }
        }

        {
            let mut update = conn.prepare(&format!(
                "UPDATE {table} SET field_value = ?1, updated_at = ?2
                 WHERE identifier = ?3 AND object_id = ?4
                   AND language = ?5 AND field_name = ?6"
            ))?;
            for (key, value) in &batch.updates {
                update.execute(params![
                    value,
                    now,
                    key.identifier,
                    key.object_id,
                    key.language,
                    key.field_name,
                ])?;
                self.metrics.record_update();
                report.updated += 1;
            }
        }

        {
            let mut delete = conn.prepare(&format!(
                "DELETE FROM {table}
                 WHERE identifier = ?1 AND object_id = ?2
                   AND language = ?3 AND field_name = ?4"
            ))?;
            for key in &batch.deletes {
                delete.execute(params![
                    key.identifier,
                    key.object_id,
                    key.language,
                    key.field_name,
                ])?;
                self.metrics.record_delete();
                report.deleted += 1;
            }
        }

        Ok(report)
    }

    #[cfg(test)]
    pub(crate) fn insert_for_tests(&self, record: &TranslationRecord) {
        let table = self.table_for(&record.identifier);
        let conn = self.lock_conn();
        conn.execute(
            &format!(
                "INSERT INTO {table}
                 (identifier, object_id, language, field_name, field_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                record.identifier,
                record.object_id,
                record.language,
                record.field_name,
                record.field_value,
                Utc::now().to_rfc3339(),
            ],
        )
        .expect("test insert");
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranslationRecord> {
    Ok(TranslationRecord {
        id: row.get(0)?,
        identifier: row.get(1)?,
        object_id: row.get(2)?,
        language: row.get(3)?,
        field_name: row.get(4)?,
        field_value: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn placeholders(count: usize) -> String {
    let mut s = String::with_capacity(count * 2);
    for i in 0..count {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(TranslationError::Config(format!(
            "invalid table name '{table}'"
        )));
    }
    Ok(())
}
