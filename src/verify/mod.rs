//! Post-migration integrity validation.
//!
//! The validator is deliberately independent of the importer: it reads the
//! same source exports and queries the destination database fresh, so it
//! would catch importer bugs rather than inherit them. Each check family
//! can be toggled off individually.

pub mod compliance;
pub mod counts;
pub mod performance;
pub mod relationships;
pub mod report;
pub mod rollback;
pub mod sample;

use std::path::PathBuf;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::config::MigrationConfig;
use crate::idmap::IdMapper;

pub use report::{
    ComplianceCheck, CountCheck, FieldDiff, Issue, IssueSummary, RelationshipCheck, Severity,
    VerifyReport, VerifyStatus, write_verify_report,
};
pub use rollback::{generate_rollback_script, write_rollback_script};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("database error during verification: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which check families to run. Everything is on by default; the CLI maps
/// its `--skip-*` flags onto this.
#[derive(Debug, Clone, Copy)]
pub struct CheckToggles {
    pub counts: bool,
    pub relationships: bool,
    pub samples: bool,
    pub compliance: bool,
    pub performance: bool,
}

impl Default for CheckToggles {
    fn default() -> Self {
        Self {
            counts: true,
            relationships: true,
            samples: true,
            compliance: true,
            performance: true,
        }
    }
}

pub struct IntegrityValidator<'a> {
    pool: &'a SqlitePool,
    config: &'a MigrationConfig,
    source_dir: PathBuf,
    mapper: &'a dyn IdMapper,
    toggles: CheckToggles,
}

impl<'a> IntegrityValidator<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        config: &'a MigrationConfig,
        source_dir: impl Into<PathBuf>,
        mapper: &'a dyn IdMapper,
    ) -> Self {
        Self {
            pool,
            config,
            source_dir: source_dir.into(),
            mapper,
            toggles: CheckToggles::default(),
        }
    }

    pub fn with_toggles(mut self, toggles: CheckToggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Run the enabled check families and fold everything into one report.
    pub async fn validate(&self) -> Result<VerifyReport, VerifyError> {
        let mut report = VerifyReport::new();

        if self.toggles.counts {
            let (checks, issues) = counts::run(self.pool, &self.source_dir).await?;
            report.record_counts = checks;
            report.issues.extend(issues);
        }
        if self.toggles.relationships {
            let (checks, issues) = relationships::run(self.pool).await?;
            report.relationship_checks = checks;
            report.issues.extend(issues);
        }
        if self.toggles.samples {
            let (diffs, issues) =
                sample::run(self.pool, &self.source_dir, self.config, self.mapper).await?;
            report.sampled_field_diffs = diffs;
            report.issues.extend(issues);
        }
        if self.toggles.compliance {
            let (checks, issues) = compliance::run(self.pool, self.config).await?;
            report.compliance_checks = checks;
            report.issues.extend(issues);
        }
        if self.toggles.performance {
            let (timings, issues) = performance::run(self.pool, self.config).await?;
            report.performance_timings_ms = timings;
            report.issues.extend(issues);
        }

        report.finalize(self.config.issue_threshold);
        info!(
            target: "ledgerlift::verify",
            status = ?report.status,
            issues = report.summary.total,
            critical = report.summary.critical,
            "verification complete"
        );
        Ok(report)
    }
}
