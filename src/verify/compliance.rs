//! Named domain-compliance queries: each returns a count of rows violating a
//! data-shape rule the importer should have enforced. Non-zero counts are
//! medium severity; the data is queryable but malformed.

use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::config::MigrationConfig;
use crate::verify::report::{ComplianceCheck, Issue, Severity};

pub async fn run(
    pool: &SqlitePool,
    config: &MigrationConfig,
) -> Result<(BTreeMap<String, ComplianceCheck>, Vec<Issue>), sqlx::Error> {
    let mut checks = BTreeMap::new();
    let mut issues = Vec::new();

    let fixed: [(&str, &str); 3] = [
        (
            "accounts_bsb_format",
            "SELECT COUNT(*) FROM accounts WHERE bsb IS NOT NULL \
             AND bsb NOT GLOB '[0-9][0-9][0-9]-[0-9][0-9][0-9]'",
        ),
        (
            "categories_kind_values",
            "SELECT COUNT(*) FROM categories \
             WHERE kind NOT IN ('expense', 'income', 'transfer')",
        ),
        (
            "budgets_period_format",
            "SELECT COUNT(*) FROM budgets \
             WHERE period NOT GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]'",
        ),
    ];

    for (name, sql) in fixed {
        record_check(pool, name, sqlx::query_scalar(sql), &mut checks, &mut issues).await;
    }

    let gst_sql = "SELECT COUNT(*) FROM transactions \
                   WHERE gst_amount IS NOT NULL AND ABS(gst_amount - amount / ?) > ?";
    record_check(
        pool,
        "transactions_gst_precision",
        sqlx::query_scalar(gst_sql)
            .bind(config.gst_divisor)
            .bind(config.gst_tolerance),
        &mut checks,
        &mut issues,
    )
    .await;

    Ok((checks, issues))
}

async fn record_check<'q>(
    pool: &SqlitePool,
    name: &str,
    query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, sqlx::sqlite::SqliteArguments<'q>>,
    checks: &mut BTreeMap<String, ComplianceCheck>,
    issues: &mut Vec<Issue>,
) {
    match query.fetch_one(pool).await {
        Ok(invalid_rows) => {
            let valid = invalid_rows == 0;
            if !valid {
                issues.push(Issue {
                    kind: "compliance".to_string(),
                    message: format!("{name}: {invalid_rows} non-compliant row(s)"),
                    severity: Severity::Medium,
                    details: None,
                });
            }
            checks.insert(
                name.to_string(),
                ComplianceCheck {
                    invalid_rows: invalid_rows.max(0) as u64,
                    valid,
                },
            );
        }
        Err(err) => {
            issues.push(Issue {
                kind: "compliance_unqueryable".to_string(),
                message: format!("{name}: query failed: {err}"),
                severity: Severity::High,
                details: None,
            });
        }
    }
}
