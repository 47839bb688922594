//! Storage trait abstraction
//!
//! Defines async domain traits for storage operations, one per concern:
//! trial CRUD, search, statistics, quality auditing, and maintenance.

use async_trait::async_trait;
use trialstore_core::{QualityFindings, Trial, TrialDetail, TrialRecord, TrialStats, TrialSummary};

use crate::error::StorageError;
use crate::types::{
    ChildRowCounts, DbHealth, IngestOutcome, OptimizeReport, PaginatedResult, TableRowCount,
    TrialFilter,
};

type Result<T> = std::result::Result<T, StorageError>;

/// The write path plus direct retrieval. The only component that mutates
/// trial data.
#[async_trait]
pub trait TrialStore: Send + Sync {
    /// Upsert one denormalized record: root row plus every supplied child
    /// collection, atomically. Re-ingesting an existing `nct_id` updates in
    /// place and replaces supplied child rows; it never duplicates.
    async fn upsert_trial(&self, record: &TrialRecord) -> Result<IngestOutcome>;

    /// Complete trial info via the `trial_complete_info` view.
    async fn get_trial(&self, nct_id: &str) -> Result<Option<TrialDetail>>;

    /// The raw primary-table row (includes audit timestamps and oversight
    /// flags the view omits).
    async fn get_trial_row(&self, nct_id: &str) -> Result<Option<Trial>>;

    /// Filtered, paginated listing ordered newest-first.
    async fn list_trials(
        &self,
        filter: &TrialFilter,
        offset: usize,
        limit: usize,
    ) -> Result<PaginatedResult<TrialDetail>>;

    /// Operator-initiated removal; cascades to all child rows. Returns
    /// `true` if a trial was deleted.
    async fn delete_trial(&self, nct_id: &str) -> Result<bool>;

    /// Per-child-table row counts for one trial.
    async fn child_row_counts(&self, nct_id: &str) -> Result<ChildRowCounts>;
}

/// Full-text search over titles, summaries, conditions, and keywords.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filter: &TrialFilter,
        limit: usize,
    ) -> Result<Vec<TrialSummary>>;
}

/// Aggregate statistics.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn get_stats(&self) -> Result<TrialStats>;
}

/// Read-only data-quality auditing. Must never mutate stored data.
#[async_trait]
pub trait QualityStore: Send + Sync {
    /// Run every audit query and return the per-check offender lists,
    /// grouped by axis. Scoring happens in `trialstore_core::quality`.
    async fn collect_findings(&self) -> Result<QualityFindings>;
}

/// Custodial operations backing the maintenance job.
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Refresh planner statistics and reclaim dead space. Idempotent;
    /// performance impact only.
    async fn optimize(&self) -> Result<OptimizeReport>;

    /// Storage size, connection count, and queries running longer than
    /// `long_query_threshold_secs`. Read-only.
    async fn health_check(&self, long_query_threshold_secs: i64) -> Result<DbHealth>;

    /// Row counts per schema table, primary table first. Used to verify
    /// backup restores.
    async fn table_row_counts(&self) -> Result<Vec<TableRowCount>>;
}
