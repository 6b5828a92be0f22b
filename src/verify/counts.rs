//! Record-count parity between source files and destination tables, plus
//! duplicate-primary-key detection (a non-zero count indicates a faulty
//! re-run rather than bad source data).

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::json;
use sqlx::SqlitePool;

use crate::registry::collections;
use crate::source;
use crate::sql::quote_ident;
use crate::verify::report::{CountCheck, Issue, Severity};

pub async fn run(
    pool: &SqlitePool,
    source_dir: &Path,
) -> Result<(BTreeMap<String, CountCheck>, Vec<Issue>), sqlx::Error> {
    let mut checks = BTreeMap::new();
    let mut issues = Vec::new();

    for spec in collections() {
        let source_count = match source::load_collection(source_dir, spec) {
            Ok(records) => Some(records.len() as u64),
            Err(_) => None,
        };

        let table = quote_ident(spec.table);
        let destination: i64 = match sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                issues.push(Issue {
                    kind: "missing_table".to_string(),
                    message: format!("destination table {} is not queryable: {err}", spec.table),
                    severity: Severity::High,
                    details: None,
                });
                continue;
            }
        };

        let distinct: i64 = sqlx::query_scalar(&format!("SELECT COUNT(DISTINCT id) FROM {table}"))
            .fetch_one(pool)
            .await?;
        let duplicate_ids = (destination - distinct).max(0) as u64;

        let matched = source_count.map_or(true, |s| s == destination as u64);
        if !matched {
            issues.push(Issue {
                kind: "count_mismatch".to_string(),
                message: format!(
                    "{}: source has {} record(s) but destination holds {}",
                    spec.name,
                    source_count.unwrap_or(0),
                    destination
                ),
                severity: Severity::Critical,
                details: Some(json!({
                    "collection": spec.name,
                    "source": source_count,
                    "destination": destination,
                })),
            });
        }
        if duplicate_ids > 0 {
            issues.push(Issue {
                kind: "duplicate_primary_keys".to_string(),
                message: format!(
                    "{}: {} duplicated primary key value(s) in destination",
                    spec.name, duplicate_ids
                ),
                severity: Severity::Critical,
                details: None,
            });
        }
        if source_count.is_none() {
            issues.push(Issue {
                kind: "source_unavailable".to_string(),
                message: format!("{}: source file unavailable; parity not checked", spec.name),
                severity: Severity::Info,
                details: None,
            });
        }

        checks.insert(
            spec.name.to_string(),
            CountCheck {
                source: source_count,
                destination: destination as u64,
                duplicate_ids,
                matched,
            },
        );
    }

    Ok((checks, issues))
}
