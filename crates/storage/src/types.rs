use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Structured filters shared by listing and search queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialFilter {
    pub status: Option<String>,
    pub phase: Option<String>,
    pub study_type: Option<String>,
    /// Case-insensitive substring match on the organization name.
    pub organization: Option<String>,
    pub start_date_from: Option<NaiveDate>,
    pub start_date_to: Option<NaiveDate>,
}

/// Result of one trial write: whether the identifier was new.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub nct_id: String,
    pub created: bool,
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Per-child-table row counts for one trial. Used by tests and callers that
/// need to confirm fan-out cardinality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRowCounts {
    pub descriptions: u64,
    pub eligibility: u64,
    pub arms_interventions: u64,
    pub outcomes: u64,
    pub locations: u64,
    pub contacts: u64,
    pub conditions: u64,
    pub keywords: u64,
    pub interventions: u64,
}

/// Size of one table, human-readable and raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSize {
    pub table: String,
    pub size: String,
    pub size_bytes: i64,
}

/// Row count of one table (restore verification, health reporting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowCount {
    pub table: String,
    pub rows: i64,
}

/// A query running longer than the configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongQuery {
    pub pid: i32,
    pub duration_secs: i64,
    pub query: String,
}

/// Read-only health snapshot of the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbHealth {
    pub checked_at: DateTime<Utc>,
    pub database_size: String,
    pub database_size_bytes: i64,
    pub table_sizes: Vec<TableSize>,
    pub active_connections: i64,
    pub long_running_queries: Vec<LongQuery>,
}

/// Result of the optimization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub analyzed_tables: Vec<String>,
    pub database_size: String,
}
