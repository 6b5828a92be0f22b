use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

/// Snapshot the database file before the importer touches it. Best effort by
/// design: a database that does not exist yet has nothing to protect.
pub fn snapshot_database(db_path: &Path, out_dir: &Path) -> Result<Option<PathBuf>> {
    if !db_path.exists() {
        return Ok(None);
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("create backup directory {}", out_dir.display()))?;

    let name = Utc::now().format("backup-%Y%m%d-%H%M%S.sqlite3").to_string();
    let dest = out_dir.join(name);
    fs::copy(db_path, &dest).with_context(|| {
        format!(
            "copy database {} to backup {}",
            db_path.display(),
            dest.display()
        )
    })?;
    tracing::info!(target: "ledgerlift", backup = %dest.display(), "database snapshot written");
    Ok(Some(dest))
}
