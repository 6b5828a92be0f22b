use serde::Serialize;

/// Tunables shared by the importer and the integrity validator. Defaults
/// match the documented behavior; the CLI overrides individual knobs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Records per optimistic batch transaction.
    pub batch_size: usize,
    /// GST-inclusive totals divide by this to recover the tax component.
    pub gst_divisor: f64,
    /// Maximum absolute deviation tolerated by the GST cross-check.
    pub gst_tolerance: f64,
    /// Tolerance applied when comparing amount-typed fields during sampling.
    pub amount_tolerance: f64,
    /// Upper bound on records sampled per collection for field comparison.
    pub sample_size: usize,
    /// Non-critical issue count at or above which verification fails.
    pub issue_threshold: usize,
    /// Per-collection cap on record errors echoed into the report appendix.
    pub error_appendix_cap: usize,
    /// A performance probe slower than this is flagged.
    pub query_timeout_ms: u64,
    /// Concurrent read queries issued by the concurrency smoke test.
    pub concurrency_probes: usize,
    /// Total budget for the concurrency smoke test.
    pub concurrency_budget_ms: u64,
    /// Maximum connections in the SQLite pool.
    pub pool_size: u32,
    /// Progress is logged every this many batches.
    pub progress_batches: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            gst_divisor: 11.0,
            gst_tolerance: 0.01,
            amount_tolerance: 0.01,
            sample_size: 100,
            issue_threshold: 5,
            error_appendix_cap: 10,
            query_timeout_ms: 500,
            concurrency_probes: 10,
            concurrency_budget_ms: 2000,
            pool_size: 10,
            progress_batches: 10,
        }
    }
}
