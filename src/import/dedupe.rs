//! Duplicate detection against the destination table.
//!
//! One existence probe per declared unique-field tuple; the first hit
//! short-circuits. Collections that declare no tuples never have duplicates;
//! repeated rows are legal there by explicit opt-in.

use serde_json::Value;
use sqlx::SqlitePool;

use crate::registry::CollectionSpec;
use crate::source::SourceRecord;
use crate::sql::{bind_value, quote_ident};

pub async fn is_duplicate(
    pool: &SqlitePool,
    spec: &CollectionSpec,
    record: &SourceRecord,
) -> Result<bool, sqlx::Error> {
    for tuple in spec.unique_tuples {
        // A tuple with an absent or null field cannot collide.
        let values: Vec<&Value> = match tuple
            .iter()
            .map(|field| record.field(field).filter(|v| !v.is_null()))
            .collect::<Option<Vec<_>>>()
        {
            Some(values) => values,
            None => continue,
        };

        let clauses: Vec<String> = tuple
            .iter()
            .map(|field| format!("{} = ?", quote_ident(field)))
            .collect();
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            quote_ident(spec.table),
            clauses.join(" AND ")
        );

        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        if query.fetch_optional(pool).await?.is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}
