//! Performance probes over the migrated store: three representative read
//! queries, each timed individually, plus a concurrency smoke test that
//! issues a burst of simultaneous reads through the shared pool.

use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::join_all;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::MigrationConfig;
use crate::verify::report::{Issue, Severity};

pub async fn run(
    pool: &SqlitePool,
    config: &MigrationConfig,
) -> Result<(BTreeMap<String, u64>, Vec<Issue>), sqlx::Error> {
    let mut timings = BTreeMap::new();
    let mut issues = Vec::new();

    let probes: [(&str, &str); 3] = [
        (
            "point_lookup",
            "SELECT * FROM transactions WHERE id = (SELECT id FROM transactions LIMIT 1)",
        ),
        (
            "range_aggregation",
            "SELECT account_id, COUNT(*), SUM(amount) FROM transactions GROUP BY account_id",
        ),
        (
            "joined_filter",
            "SELECT t.id FROM transactions t \
             JOIN accounts a ON a.id = t.account_id \
             JOIN categories c ON c.id = t.category_id \
             WHERE c.kind = 'expense'",
        ),
    ];

    for (name, sql) in probes {
        let started = Instant::now();
        sqlx::query(sql).fetch_all(pool).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(target: "ledgerlift::verify", probe = name, elapsed_ms, "performance probe");
        if elapsed_ms > config.query_timeout_ms {
            issues.push(Issue {
                kind: "slow_query".to_string(),
                message: format!(
                    "{name} took {elapsed_ms} ms (limit {} ms)",
                    config.query_timeout_ms
                ),
                severity: Severity::Info,
                details: None,
            });
        }
        timings.insert(name.to_string(), elapsed_ms);
    }

    let started = Instant::now();
    let reads = (0..config.concurrency_probes).map(|_| {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions").fetch_one(pool)
    });
    for result in join_all(reads).await {
        result?;
    }
    let elapsed_ms = started.elapsed().as_millis() as u64;
    timings.insert("concurrent_reads".to_string(), elapsed_ms);
    if elapsed_ms > config.concurrency_budget_ms {
        issues.push(Issue {
            kind: "slow_concurrency".to_string(),
            message: format!(
                "{} concurrent reads took {elapsed_ms} ms (budget {} ms)",
                config.concurrency_probes, config.concurrency_budget_ms
            ),
            severity: Severity::Info,
            details: None,
        });
    }

    Ok((timings, issues))
}
