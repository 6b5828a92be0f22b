//! Sampled field-level comparison: a bounded random sample of source
//! records per collection, resolved to destination rows through the id
//! mapper and compared field by field. Amount-typed fields tolerate the
//! configured numeric drift; mismatches are recorded, never fatal.

use std::path::Path;

use rand::seq::SliceRandom;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::MigrationConfig;
use crate::idmap::IdMapper;
use crate::registry::collections;
use crate::source::{self, SourceRecord};
use crate::sql::quote_ident;
use crate::verify::report::{FieldDiff, Issue, Severity};

pub async fn run(
    pool: &SqlitePool,
    source_dir: &Path,
    config: &MigrationConfig,
    mapper: &dyn IdMapper,
) -> Result<(Vec<FieldDiff>, Vec<Issue>), sqlx::Error> {
    let mut diffs = Vec::new();
    let mut issues = Vec::new();

    for spec in collections() {
        if spec.compare_fields.is_empty() {
            continue;
        }
        let records = match source::load_collection(source_dir, spec) {
            Ok(records) => records,
            Err(_) => continue,
        };
        if records.is_empty() {
            continue;
        }

        let sample: Vec<&SourceRecord> = {
            let mut rng = rand::thread_rng();
            records
                .choose_multiple(&mut rng, config.sample_size.min(records.len()))
                .collect()
        };

        let select_cols: Vec<String> = spec
            .compare_fields
            .iter()
            .map(|f| quote_ident(f))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            select_cols.join(", "),
            quote_ident(spec.table)
        );

        let before = diffs.len();
        for record in sample {
            let Some(id) = mapper.destination_id(spec, record) else {
                continue;
            };
            let row = match sqlx::query(&sql).bind(&id).fetch_optional(pool).await {
                Ok(row) => row,
                Err(err) => {
                    issues.push(Issue {
                        kind: "sample_unqueryable".to_string(),
                        message: format!("{}: sample lookup failed: {err}", spec.name),
                        severity: Severity::High,
                        details: None,
                    });
                    break;
                }
            };
            let Some(row) = row else {
                diffs.push(FieldDiff {
                    collection: spec.name.to_string(),
                    record_id: id,
                    field: "_row".to_string(),
                    source: Some("present".to_string()),
                    destination: None,
                });
                continue;
            };

            for field in spec.compare_fields {
                let tolerance = if spec.amount_fields.contains(field) {
                    config.amount_tolerance
                } else {
                    1e-9
                };
                compare_field(spec.name, &id, field, record, &row, tolerance, &mut diffs);
            }
        }

        let collection_diffs = diffs.len() - before;
        if collection_diffs > 0 {
            issues.push(Issue {
                kind: "sample_mismatch".to_string(),
                message: format!(
                    "{}: {collection_diffs} sampled field difference(s)",
                    spec.name
                ),
                severity: Severity::Medium,
                details: None,
            });
        }
    }

    Ok((diffs, issues))
}

fn compare_field(
    collection: &str,
    id: &str,
    field: &str,
    record: &SourceRecord,
    row: &SqliteRow,
    tolerance: f64,
    diffs: &mut Vec<FieldDiff>,
) {
    let src_text = record.scalar_string(field);
    let dst_text = column_text(row, field);
    let src_num = record.number(field);
    let dst_num = column_f64(row, field);

    let equal = match (src_num, dst_num) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        (None, None) => src_text == dst_text,
        _ => {
            // One side numeric, the other not; fall back to text so "42"
            // still matches 42.
            src_text == dst_text
        }
    };

    if !equal {
        diffs.push(FieldDiff {
            collection: collection.to_string(),
            record_id: id.to_string(),
            field: field.to_string(),
            source: src_text,
            destination: dst_text,
        });
    }
}

fn column_text(row: &SqliteRow, column: &str) -> Option<String> {
    if let Ok(value) = row.try_get::<Option<String>, _>(column) {
        return value;
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
        return value.map(|n| n.to_string());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(column) {
        return value.map(|n| n.to_string());
    }
    None
}

fn column_f64(row: &SqliteRow, column: &str) -> Option<f64> {
    if let Ok(value) = row.try_get::<Option<f64>, _>(column) {
        return value;
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
        return value.map(|n| n as f64);
    }
    if let Ok(Some(text)) = row.try_get::<Option<String>, _>(column) {
        return text.parse().ok();
    }
    None
}
