//! Dependency-ordered batch import with per-record fallback.
//!
//! The central control flow: collections are imported in topological order,
//! each collection in fixed-size batches. A batch is first attempted as one
//! transaction (optimistic, fast on clean data); if the transaction fails the
//! whole batch rolls back and every record is retried in its own transaction,
//! so one malformed record cannot sink its batch-mates. Only a failure to
//! reach the store at all is fatal; everything else becomes a recorded
//! outcome and the run continues.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::idmap::IdMapper;
use crate::import::dedupe;
use crate::import::stats::{BatchResult, CollectionStats, ImportStats, RecordError, SkipReason};
use crate::import::validator::RecordValidator;
use crate::registry::{collections, dependency_order, CollectionSpec, RegistryError};
use crate::schema::{self, SchemaError};
use crate::source::{self, SourceError, SourceRecord};
use crate::sql::{bind_value, quote_ident};

/// Cooperative stop flag, observed between batches so a partially applied
/// batch is never left outside the database's own transactional guarantee.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Destination ids committed (or confirmed present) during this run, keyed
/// by collection. Later collections validate their foreign keys against it.
#[derive(Debug, Clone, Default)]
pub struct ImportedIdSet {
    ids: HashMap<String, HashSet<String>>,
}

impl ImportedIdSet {
    pub fn insert(&mut self, collection: &str, id: &str) {
        self.ids
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.ids
            .get(collection)
            .map_or(false, |set| set.contains(id))
    }

    pub fn count(&self, collection: &str) -> usize {
        self.ids.get(collection).map_or(0, HashSet::len)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("destination table {table} already holds {rows} row(s); pass --force-rerun to import anyway")]
    DestinationNotEmpty { table: String, rows: i64 },
}

pub struct BatchImporter<'a> {
    pool: &'a SqlitePool,
    config: &'a MigrationConfig,
    mapper: &'a dyn IdMapper,
    cancel: CancelToken,
    dry_run: bool,
    imported: ImportedIdSet,
    completed: HashSet<&'static str>,
}

impl<'a> BatchImporter<'a> {
    pub fn new(pool: &'a SqlitePool, config: &'a MigrationConfig, mapper: &'a dyn IdMapper) -> Self {
        Self {
            pool,
            config,
            mapper,
            cancel: CancelToken::default(),
            dry_run: false,
            imported: ImportedIdSet::default(),
            completed: HashSet::new(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn imported_ids(&self) -> &ImportedIdSet {
        &self.imported
    }

    /// Import every registered collection in dependency order.
    pub async fn run(
        &mut self,
        source_dir: &Path,
        force_rerun: bool,
    ) -> Result<ImportStats, EngineError> {
        let order = dependency_order(collections())?;
        if !force_rerun && !self.dry_run {
            self.ensure_destination_empty(&order).await?;
        }

        let mut stats = ImportStats::new(self.dry_run);
        for spec in order {
            if self.cancel.is_cancelled() {
                warn!(target: "ledgerlift", collection = spec.name, "import cancelled before collection");
                break;
            }
            let collection_stats = self.import_collection(spec, source_dir).await?;
            if collection_stats.skipped.is_none() {
                self.completed.insert(spec.name);
            }
            stats.record_collection(spec.name, collection_stats);
        }
        stats.finalize();
        Ok(stats)
    }

    async fn ensure_destination_empty(
        &self,
        order: &[&'static CollectionSpec],
    ) -> Result<(), EngineError> {
        for spec in order {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(spec.table));
            let rows: i64 = match sqlx::query_scalar(&sql).fetch_one(self.pool).await {
                Ok(rows) => rows,
                // A table the schema does not have yet is caught later, per
                // collection, by the introspection step.
                Err(_) => continue,
            };
            if rows > 0 {
                return Err(EngineError::DestinationNotEmpty {
                    table: spec.table.to_string(),
                    rows,
                });
            }
        }
        Ok(())
    }

    /// Import one collection. Preconditions: every dependency has completed
    /// this run; otherwise the collection is skipped and recorded as such,
    /// a partial-success outcome rather than a failure.
    pub async fn import_collection(
        &mut self,
        spec: &'static CollectionSpec,
        source_dir: &Path,
    ) -> Result<CollectionStats, EngineError> {
        if let Some(dep) = spec
            .dependencies
            .iter()
            .find(|dep| !self.completed.contains(**dep))
        {
            warn!(
                target: "ledgerlift",
                collection = spec.name,
                dependency = *dep,
                "dependency not imported this run; skipping collection"
            );
            return Ok(CollectionStats::skipped(SkipReason::DependencyUnsatisfied(
                (*dep).to_string(),
            )));
        }

        let records = match source::load_collection(source_dir, spec) {
            Ok(records) => records,
            Err(SourceError::Missing { path }) => {
                warn!(
                    target: "ledgerlift",
                    collection = spec.name,
                    path = %path.display(),
                    "source file missing; skipping collection"
                );
                return Ok(CollectionStats::skipped(SkipReason::MissingSource(
                    path.display().to_string(),
                )));
            }
            Err(err) => {
                warn!(
                    target: "ledgerlift",
                    collection = spec.name,
                    error = %err,
                    "source file unreadable; skipping collection"
                );
                return Ok(CollectionStats::skipped(SkipReason::UnreadableSource(
                    err.to_string(),
                )));
            }
        };

        let start = Instant::now();
        let columns = self.insert_columns(spec, &records).await?;
        let sql = upsert_sql(spec.table, &columns);
        let validator = RecordValidator::new(self.config);
        let total = records.len();

        let mut collection_stats = CollectionStats {
            source_records: total as u64,
            ..CollectionStats::default()
        };

        let mut processed = 0usize;
        for (batch_index, batch) in records.chunks(self.config.batch_size.max(1)).enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    target: "ledgerlift",
                    collection = spec.name,
                    processed,
                    total,
                    "import cancelled between batches"
                );
                break;
            }

            let mut outcome = BatchResult::default();
            let mut ready: Vec<PreparedRecord> = Vec::new();

            for record in batch {
                let record_id = self.mapper.destination_id(spec, record);

                let errors = validator.validate(record, spec, &self.imported);
                if !errors.is_empty() {
                    outcome.failed += 1;
                    outcome.errors.extend(
                        errors
                            .into_iter()
                            .map(|e| RecordError::from_validation(record_id.clone(), e)),
                    );
                    continue;
                }

                if dedupe::is_duplicate(self.pool, spec, record).await? {
                    outcome.duplicates += 1;
                    // The row already exists in the destination; register it
                    // so later collections' foreign keys still resolve on a
                    // re-run.
                    if let Some(id) = record_id {
                        self.imported.insert(spec.name, &id);
                    }
                    continue;
                }

                match record_id {
                    Some(id) => ready.push(PreparedRecord::project(record, id, &columns)),
                    None => {
                        outcome.failed += 1;
                        outcome.errors.push(RecordError::insert_failure(
                            None,
                            "unable to derive a destination id",
                        ));
                    }
                }
            }

            if !ready.is_empty() {
                match self.try_batch(&sql, &ready).await? {
                    BatchAttempt::Committed => {
                        outcome.successful += ready.len() as u64;
                        for rec in &ready {
                            self.imported.insert(spec.name, &rec.id);
                        }
                    }
                    BatchAttempt::Degraded(cause) => {
                        collection_stats.degraded_batches += 1;
                        warn!(
                            target: "ledgerlift",
                            collection = spec.name,
                            batch = batch_index,
                            error = %cause,
                            "batch transaction failed; retrying records individually"
                        );
                        for (rec, result) in self.retry_individually(&sql, &ready).await? {
                            match result {
                                Ok(()) => {
                                    outcome.successful += 1;
                                    self.imported.insert(spec.name, &rec.id);
                                }
                                Err(message) => {
                                    outcome.failed += 1;
                                    outcome.errors.push(RecordError::insert_failure(
                                        Some(rec.id.clone()),
                                        message,
                                    ));
                                }
                            }
                        }
                    }
                }
            }

            processed += batch.len();
            collection_stats.absorb(outcome);

            if (batch_index + 1) % self.config.progress_batches.max(1) == 0 {
                info!(
                    target: "ledgerlift",
                    collection = spec.name,
                    processed,
                    total,
                    percentage = (processed as f64 / total.max(1) as f64 * 100.0) as u64,
                    "import progress"
                );
            }
        }

        collection_stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            target: "ledgerlift",
            collection = spec.name,
            successful = collection_stats.successful,
            failed = collection_stats.failed,
            duplicates = collection_stats.duplicates,
            batches = collection_stats.batches,
            duration_ms = collection_stats.duration_ms,
            "collection import finished"
        );
        Ok(collection_stats)
    }

    /// Optimistic phase: one transaction for the whole batch. A statement
    /// failure rolls the batch back and reports the cause for the fallback;
    /// only failing to open the transaction is fatal.
    async fn try_batch(
        &self,
        sql: &str,
        records: &[PreparedRecord],
    ) -> Result<BatchAttempt, EngineError> {
        let mut tx = self.pool.begin().await?;
        for rec in records {
            if let Err(err) = insert_record(&mut tx, sql, rec).await {
                tx.rollback().await.ok();
                return Ok(BatchAttempt::Degraded(err));
            }
        }
        self.finish_tx(tx).await?;
        Ok(BatchAttempt::Committed)
    }

    /// Pessimistic phase: each record in its own transaction, guaranteeing
    /// forward progress on dirty data.
    async fn retry_individually<'r>(
        &self,
        sql: &str,
        records: &'r [PreparedRecord],
    ) -> Result<Vec<(&'r PreparedRecord, Result<(), String>)>, EngineError> {
        let mut results = Vec::with_capacity(records.len());
        for rec in records {
            let mut tx = self.pool.begin().await?;
            match insert_record(&mut tx, sql, rec).await {
                Ok(()) => {
                    self.finish_tx(tx).await?;
                    results.push((rec, Ok(())));
                }
                Err(err) => {
                    tx.rollback().await.ok();
                    results.push((rec, Err(err.to_string())));
                }
            }
        }
        Ok(results)
    }

    async fn finish_tx(&self, tx: Transaction<'_, Sqlite>) -> Result<(), sqlx::Error> {
        if self.dry_run {
            tx.rollback().await
        } else {
            tx.commit().await
        }
    }

    /// Destination columns the collection will write: the schema's column
    /// set, restricted to fields the source actually provides, plus the id.
    /// Columns the source never mentions keep their database defaults.
    async fn insert_columns(
        &self,
        spec: &CollectionSpec,
        records: &[SourceRecord],
    ) -> Result<Vec<String>, EngineError> {
        let schema_columns = schema::table_columns(self.pool, spec.table).await?;
        let mut columns = vec!["id".to_string()];
        for column in schema_columns {
            if column.name == "id" {
                continue;
            }
            if records.iter().any(|r| r.field(&column.name).is_some()) {
                columns.push(column.name);
            }
        }
        Ok(columns)
    }
}

enum BatchAttempt {
    Committed,
    Degraded(sqlx::Error),
}

/// A validated record projected onto the destination columns, values aligned
/// with the column list (id first).
#[derive(Debug, Clone)]
struct PreparedRecord {
    id: String,
    values: Vec<Value>,
}

impl PreparedRecord {
    fn project(record: &SourceRecord, id: String, columns: &[String]) -> Self {
        let values = columns
            .iter()
            .map(|column| {
                if column == "id" {
                    Value::String(id.clone())
                } else {
                    record.field(column).cloned().unwrap_or(Value::Null)
                }
            })
            .collect();
        Self { id, values }
    }
}

async fn insert_record(
    tx: &mut Transaction<'_, Sqlite>,
    sql: &str,
    rec: &PreparedRecord,
) -> Result<(), sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in &rec.values {
        query = bind_value(query, value);
    }
    query.execute(tx.as_mut()).await?;
    Ok(())
}

/// Upsert keyed by primary key so re-running the importer is idempotent for
/// records with a source-provided identifier.
fn upsert_sql(table: &str, columns: &[String]) -> String {
    let idents: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != "id")
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();

    if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO NOTHING",
            quote_ident(table),
            idents.join(", "),
            placeholders.join(", ")
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
            quote_ident(table),
            idents.join(", "),
            placeholders.join(", "),
            updates.join(", ")
        )
    }
}
