//! Import report rendering: a machine-readable JSON file and a bounded
//! human-readable Markdown summary. Accumulation lives in `import::stats`;
//! nothing here mutates the data.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::config::MigrationConfig;
use crate::import::stats::{ImportStats, SkipReason};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportReportFile<'a> {
    generated_at: String,
    config: &'a MigrationConfig,
    stats: &'a ImportStats,
}

/// Write both renderings into `out_dir`; returns (json, markdown) paths.
pub fn write_import_report(
    out_dir: &Path,
    stats: &ImportStats,
    config: &MigrationConfig,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create report directory {}", out_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let json_path = out_dir.join(format!("import-{stamp}.json"));
    let md_path = out_dir.join(format!("import-{stamp}.md"));

    let payload = ImportReportFile {
        generated_at: Utc::now().to_rfc3339(),
        config,
        stats,
    };
    let json = serde_json::to_string_pretty(&payload).context("serialize import report")?;
    fs::write(&json_path, json)
        .with_context(|| format!("write import report {}", json_path.display()))?;

    let markdown = render_markdown(stats, config.error_appendix_cap);
    fs::write(&md_path, markdown)
        .with_context(|| format!("write import summary {}", md_path.display()))?;

    Ok((json_path, md_path))
}

/// Markdown summary with a per-collection table and a truncated error
/// appendix, bounded regardless of failure volume.
pub fn render_markdown(stats: &ImportStats, error_cap: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Import summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Started: {}", stats.started_at.to_rfc3339());
    if let Some(finished) = stats.finished_at {
        let _ = writeln!(out, "- Finished: {}", finished.to_rfc3339());
    }
    if stats.dry_run {
        let _ = writeln!(out, "- Mode: **dry run** (no rows committed)");
    }
    let _ = writeln!(
        out,
        "- Totals: {} records, {} imported, {} failed, {} duplicates skipped",
        stats.total_records(),
        stats.successful_imports(),
        stats.failed_imports(),
        stats.duplicates_skipped(),
    );
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "| Collection | Source | Imported | Failed | Duplicates | Batches |"
    );
    let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|");
    for (name, c) in &stats.collections {
        if let Some(reason) = &c.skipped {
            let detail = match reason {
                SkipReason::MissingSource(path) => format!("skipped: source missing ({path})"),
                SkipReason::UnreadableSource(err) => format!("skipped: unreadable ({err})"),
                SkipReason::DependencyUnsatisfied(dep) => {
                    format!("skipped: dependency {dep} unsatisfied")
                }
            };
            let _ = writeln!(out, "| {name} | — | — | — | — | {detail} |");
        } else {
            let _ = writeln!(
                out,
                "| {name} | {} | {} | {} | {} | {} |",
                c.source_records, c.successful, c.failed, c.duplicates, c.batches
            );
        }
    }

    let any_errors = stats.collections.values().any(|c| !c.errors.is_empty());
    if any_errors {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Errors");
        for (name, c) in &stats.collections {
            if c.errors.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "### {name}");
            for err in c.errors.iter().take(error_cap) {
                let id = err.record_id.as_deref().unwrap_or("<no id>");
                let _ = write!(out, "- `{id}` · {}: {}", err.field, err.error);
                if let Some(value) = &err.value {
                    let _ = write!(out, " (got `{value}`");
                    if let Some(expected) = &err.expected {
                        let _ = write!(out, ", expected `{expected}`");
                    }
                    let _ = write!(out, ")");
                } else if let Some(expected) = &err.expected {
                    let _ = write!(out, " (expected `{expected}`)");
                }
                let _ = writeln!(out);
            }
            if c.errors.len() > error_cap {
                let _ = writeln!(out, "- … and {} more", c.errors.len() - error_cap);
            }
        }
    }

    out
}
