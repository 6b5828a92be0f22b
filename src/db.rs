use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

/// Open the bounded pool every database access goes through. A failure here
/// is the one fatal error class of the pipeline: there is nothing useful to
/// report against a store we cannot reach.
pub async fn open_pool(
    db_path: &Path,
    pool_size: u32,
    create_if_missing: bool,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_millis(5_000))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await
}
