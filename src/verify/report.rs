//! Verification report data and rendering.
//!
//! The report is rebuilt from live queries on every run; it carries no state
//! from the import phase. Status policy: `Passed` only when there are zero
//! critical issues and the total stays under the configured threshold. A
//! handful of minor findings should not block a migration; an accumulation
//! should.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCheck {
    pub source: Option<u64>,
    pub destination: u64,
    pub duplicate_ids: u64,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipCheck {
    pub orphaned: u64,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub collection: String,
    pub record_id: String,
    pub field: String,
    pub source: Option<String>,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub invalid_rows: u64,
    pub valid: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub info: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifyStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub generated_at: DateTime<Utc>,
    pub record_counts: BTreeMap<String, CountCheck>,
    pub relationship_checks: BTreeMap<String, RelationshipCheck>,
    pub sampled_field_diffs: Vec<FieldDiff>,
    pub compliance_checks: BTreeMap<String, ComplianceCheck>,
    pub performance_timings_ms: BTreeMap<String, u64>,
    pub issues: Vec<Issue>,
    pub summary: IssueSummary,
    pub status: VerifyStatus,
}

impl VerifyReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            record_counts: BTreeMap::new(),
            relationship_checks: BTreeMap::new(),
            sampled_field_diffs: Vec::new(),
            compliance_checks: BTreeMap::new(),
            performance_timings_ms: BTreeMap::new(),
            issues: Vec::new(),
            summary: IssueSummary::default(),
            status: VerifyStatus::Failed,
        }
    }

    pub fn push_issue(
        &mut self,
        kind: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        self.issues.push(Issue {
            kind: kind.into(),
            message: message.into(),
            severity,
            details,
        });
    }

    pub fn critical_issues(&self) -> u64 {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count() as u64
    }

    /// Tally issue counts and settle the overall status.
    pub fn finalize(&mut self, issue_threshold: usize) {
        let mut summary = IssueSummary::default();
        for issue in &self.issues {
            match issue.severity {
                Severity::Info => summary.info += 1,
                Severity::Medium => summary.medium += 1,
                Severity::High => summary.high += 1,
                Severity::Critical => summary.critical += 1,
            }
            summary.total += 1;
        }
        self.status = if summary.critical == 0 && (summary.total as usize) < issue_threshold {
            VerifyStatus::Passed
        } else {
            VerifyStatus::Failed
        };
        self.summary = summary;
    }
}

impl Default for VerifyReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Write both renderings into `out_dir`; returns (json, markdown) paths.
pub fn write_verify_report(out_dir: &Path, report: &VerifyReport) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create report directory {}", out_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let json_path = out_dir.join(format!("verify-{stamp}.json"));
    let md_path = out_dir.join(format!("verify-{stamp}.md"));

    let json = serde_json::to_string_pretty(report).context("serialize verification report")?;
    fs::write(&json_path, json)
        .with_context(|| format!("write verification report {}", json_path.display()))?;
    fs::write(&md_path, render_markdown(report))
        .with_context(|| format!("write verification summary {}", md_path.display()))?;

    Ok((json_path, md_path))
}

pub fn render_markdown(report: &VerifyReport) -> String {
    let mut out = String::new();
    let status = match report.status {
        VerifyStatus::Passed => "PASSED",
        VerifyStatus::Failed => "FAILED",
    };
    let _ = writeln!(out, "# Verification report — {status}");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(
        out,
        "- Issues: {} total ({} critical, {} high, {} medium, {} info)",
        report.summary.total,
        report.summary.critical,
        report.summary.high,
        report.summary.medium,
        report.summary.info,
    );

    if !report.record_counts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Record counts");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Collection | Source | Destination | Duplicate ids | Match |");
        let _ = writeln!(out, "|---|---:|---:|---:|---|");
        for (name, check) in &report.record_counts {
            let source = check
                .source
                .map(|n| n.to_string())
                .unwrap_or_else(|| "—".to_string());
            let _ = writeln!(
                out,
                "| {name} | {source} | {} | {} | {} |",
                check.destination,
                check.duplicate_ids,
                if check.matched { "yes" } else { "**no**" }
            );
        }
    }

    if !report.relationship_checks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Relationship integrity");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Relationship | Orphans | Valid |");
        let _ = writeln!(out, "|---|---:|---|");
        for (name, check) in &report.relationship_checks {
            let _ = writeln!(
                out,
                "| {name} | {} | {} |",
                check.orphaned,
                if check.valid { "yes" } else { "**no**" }
            );
        }
    }

    if !report.sampled_field_diffs.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Sampled field differences");
        let _ = writeln!(out);
        for diff in &report.sampled_field_diffs {
            let _ = writeln!(
                out,
                "- {}/{} `{}`: source `{}` vs destination `{}`",
                diff.collection,
                diff.record_id,
                diff.field,
                diff.source.as_deref().unwrap_or("<absent>"),
                diff.destination.as_deref().unwrap_or("<absent>"),
            );
        }
    }

    if !report.compliance_checks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Domain compliance");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Check | Invalid rows | Valid |");
        let _ = writeln!(out, "|---|---:|---|");
        for (name, check) in &report.compliance_checks {
            let _ = writeln!(
                out,
                "| {name} | {} | {} |",
                check.invalid_rows,
                if check.valid { "yes" } else { "**no**" }
            );
        }
    }

    if !report.performance_timings_ms.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Query performance");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Query | Duration (ms) |");
        let _ = writeln!(out, "|---|---:|");
        for (name, ms) in &report.performance_timings_ms {
            let _ = writeln!(out, "| {name} | {ms} |");
        }
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Issues");
        let _ = writeln!(out);
        for issue in &report.issues {
            let severity = match issue.severity {
                Severity::Info => "info",
                Severity::Medium => "medium",
                Severity::High => "high",
                Severity::Critical => "critical",
            };
            let _ = writeln!(out, "- **{severity}** [{}] {}", issue.kind, issue.message);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_with_few_minor_issues() {
        let mut report = VerifyReport::new();
        report.push_issue("slow_query", Severity::Info, "point lookup slow", None);
        report.push_issue("compliance", Severity::Medium, "one odd row", None);
        report.finalize(5);
        assert_eq!(report.status, VerifyStatus::Passed);
        assert_eq!(report.summary.total, 2);
    }

    #[test]
    fn single_critical_issue_fails() {
        let mut report = VerifyReport::new();
        report.push_issue("count_mismatch", Severity::Critical, "rows missing", None);
        report.finalize(5);
        assert_eq!(report.status, VerifyStatus::Failed);
        assert_eq!(report.critical_issues(), 1);
    }

    #[test]
    fn issue_accumulation_fails_even_without_critical() {
        let mut report = VerifyReport::new();
        for i in 0..5 {
            report.push_issue("compliance", Severity::Medium, format!("issue {i}"), None);
        }
        report.finalize(5);
        assert_eq!(report.status, VerifyStatus::Failed);
    }

    #[test]
    fn markdown_carries_status_banner() {
        let mut report = VerifyReport::new();
        report.finalize(5);
        assert!(render_markdown(&report).starts_with("# Verification report — PASSED"));
    }
}
