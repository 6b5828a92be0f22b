//! Accumulated import outcomes: per batch, per collection, per run.
//!
//! Report *data* lives here; rendering is in `import::report`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::import::validator::ValidationError;

/// A validation or insert failure attached to the record it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub record_id: Option<String>,
    pub field: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl RecordError {
    pub fn from_validation(record_id: Option<String>, error: ValidationError) -> Self {
        Self {
            record_id,
            field: error.field,
            error: error.error,
            value: error.value,
            expected: error.expected,
        }
    }

    pub fn insert_failure(record_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            record_id,
            field: "_row".to_string(),
            error: message.into(),
            value: None,
            expected: None,
        }
    }
}

/// Outcome of one batch. Validation failures and duplicate skips are
/// recorded outcomes, not errors; the run always continues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub successful: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub errors: Vec<RecordError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "reason", content = "detail")]
pub enum SkipReason {
    MissingSource(String),
    UnreadableSource(String),
    DependencyUnsatisfied(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub source_records: u64,
    pub successful: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub batches: u64,
    /// Batches that fell back to per-record transactions.
    pub degraded_batches: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    pub duration_ms: u64,
    pub errors: Vec<RecordError>,
}

impl CollectionStats {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, batch: BatchResult) {
        self.successful += batch.successful;
        self.failed += batch.failed;
        self.duplicates += batch.duplicates;
        self.batches += 1;
        self.errors.extend(batch.errors);
    }
}

/// Run-wide statistics. Lives for exactly one run; persisted only through
/// the written report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub collections: BTreeMap<String, CollectionStats>,
}

impl ImportStats {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            collections: BTreeMap::new(),
        }
    }

    pub fn record_collection(&mut self, name: &str, stats: CollectionStats) {
        self.collections.insert(name.to_string(), stats);
    }

    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_records(&self) -> u64 {
        self.collections.values().map(|c| c.source_records).sum()
    }

    pub fn successful_imports(&self) -> u64 {
        self.collections.values().map(|c| c.successful).sum()
    }

    pub fn failed_imports(&self) -> u64 {
        self.collections.values().map(|c| c.failed).sum()
    }

    pub fn duplicates_skipped(&self) -> u64 {
        self.collections.values().map(|c| c.duplicates).sum()
    }
}
