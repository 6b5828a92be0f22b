//! Rollback script generation. A script is only produced when verification
//! found critical issues; it deletes rows stamped by the failed run in
//! reverse dependency order and deliberately ends in ROLLBACK so an operator
//! must review it and uncomment COMMIT before it takes effect.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::registry::{self, RegistryError};
use crate::sql::quote_ident;
use crate::verify::report::VerifyReport;

pub fn generate_rollback_script(
    report: &VerifyReport,
    run_started_at: DateTime<Utc>,
) -> Result<Option<String>, RegistryError> {
    if report.critical_issues() == 0 {
        return Ok(None);
    }

    let cutoff = run_started_at.format("%Y-%m-%d %H:%M:%S");
    let mut script = String::new();
    let _ = writeln!(script, "-- Rollback for migration run started {cutoff} UTC");
    let _ = writeln!(
        script,
        "-- Generated {} after verification found {} critical issue(s).",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        report.critical_issues()
    );
    let _ = writeln!(
        script,
        "-- Review the deletes below, then replace ROLLBACK with COMMIT to apply."
    );
    let _ = writeln!(script);
    let _ = writeln!(script, "BEGIN;");
    let _ = writeln!(script);

    let mut order = registry::dependency_order(registry::collections())?;
    order.reverse();
    for spec in order {
        let _ = writeln!(
            script,
            "DELETE FROM {} WHERE migrated_at >= '{cutoff}';",
            quote_ident(spec.table)
        );
    }

    let _ = writeln!(script);
    let _ = writeln!(script, "-- COMMIT;");
    let _ = writeln!(script, "ROLLBACK;");

    Ok(Some(script))
}

pub fn write_rollback_script(out_dir: &Path, script: &str) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create report directory {}", out_dir.display()))?;
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let path = out_dir.join(format!("rollback-{stamp}.sql"));
    fs::write(&path, script)
        .with_context(|| format!("write rollback script {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::report::Severity;

    #[test]
    fn no_script_without_critical_issues() {
        let mut report = VerifyReport::new();
        report.push_issue("slow_query", Severity::Info, "slow", None);
        let script = generate_rollback_script(&report, Utc::now()).unwrap();
        assert!(script.is_none());
    }

    #[test]
    fn deletes_run_in_reverse_dependency_order() {
        let mut report = VerifyReport::new();
        report.push_issue("count_mismatch", Severity::Critical, "rows missing", None);
        let script = generate_rollback_script(&report, Utc::now())
            .unwrap()
            .unwrap();

        let pos = |table: &str| {
            script
                .find(&format!("DELETE FROM \"{table}\""))
                .unwrap_or_else(|| panic!("no delete for {table}"))
        };
        assert!(pos("transactions") < pos("accounts"));
        assert!(pos("budgets") < pos("categories"));
        assert!(pos("accounts") < pos("users"));

        assert!(script.contains("-- COMMIT;"));
        assert!(script.trim_end().ends_with("ROLLBACK;"));
    }
}
