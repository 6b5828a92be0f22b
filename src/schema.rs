//! Destination schema introspection.
//!
//! The importer projects source records onto the columns the destination
//! actually has, so a renamed or dropped column degrades to a skipped field
//! instead of a failed insert.

use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::sql::quote_ident;

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("destination table {0} does not exist or has no columns")]
    MissingTable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Column set for one table, fetched once per collection.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
    // PRAGMA arguments cannot be bound; the identifier is quoted instead.
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name")?;
        let not_null: i64 = row.try_get("notnull")?;
        let pk: i64 = row.try_get("pk")?;
        columns.push(ColumnInfo {
            name,
            not_null: not_null != 0,
            primary_key: pk != 0,
        });
    }

    if columns.is_empty() {
        return Err(SchemaError::MissingTable(table.to_string()));
    }
    Ok(columns)
}
