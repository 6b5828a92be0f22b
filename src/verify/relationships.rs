//! Orphan detection for every declared foreign-key edge: destination rows
//! whose non-null reference does not resolve to a parent row.

use std::collections::BTreeMap;

use serde_json::json;
use sqlx::SqlitePool;

use crate::registry::{collections, find};
use crate::sql::quote_ident;
use crate::verify::report::{Issue, RelationshipCheck, Severity};

pub async fn run(
    pool: &SqlitePool,
) -> Result<(BTreeMap<String, RelationshipCheck>, Vec<Issue>), sqlx::Error> {
    let mut checks = BTreeMap::new();
    let mut issues = Vec::new();

    for spec in collections() {
        for fk in spec.foreign_keys {
            let Some(parent) = find(fk.references) else {
                continue;
            };
            let name = format!("{}.{} -> {}", spec.name, fk.field, parent.name);
            let sql = format!(
                "SELECT COUNT(*) FROM {child} c LEFT JOIN {parent} p ON c.{field} = p.id \
                 WHERE c.{field} IS NOT NULL AND p.id IS NULL",
                child = quote_ident(spec.table),
                parent = quote_ident(parent.table),
                field = quote_ident(fk.field),
            );

            let orphaned: i64 = match sqlx::query_scalar(&sql).fetch_one(pool).await {
                Ok(count) => count,
                Err(err) => {
                    issues.push(Issue {
                        kind: "relationship_unqueryable".to_string(),
                        message: format!("{name}: orphan query failed: {err}"),
                        severity: Severity::High,
                        details: None,
                    });
                    continue;
                }
            };

            let valid = orphaned == 0;
            if !valid {
                issues.push(Issue {
                    kind: "orphaned_rows".to_string(),
                    message: format!("{name}: {orphaned} orphaned row(s)"),
                    severity: Severity::High,
                    details: Some(json!({
                        "relationship": name,
                        "orphaned": orphaned,
                    })),
                });
            }
            checks.insert(
                name,
                RelationshipCheck {
                    orphaned: orphaned as u64,
                    valid,
                },
            );
        }
    }

    Ok((checks, issues))
}
