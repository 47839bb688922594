//! Shared constants for trialstore.
//!
//! Centralizes magic numbers that would otherwise be duplicated across crates.

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection pool: idle timeout in seconds.
pub const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default number of results when limit is not specified by the caller.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Maximum number of results for any query (DoS protection).
pub const MAX_QUERY_LIMIT: usize = 1000;

/// How many rows the "top organizations" / "top conditions" statistics return.
pub const TOP_BUCKET_LIMIT: usize = 10;

/// Backups older than this many days are deleted by the retention stage.
pub const DEFAULT_BACKUP_RETENTION_DAYS: i64 = 30;

/// Queries running longer than this are reported by the health check.
pub const DEFAULT_LONG_QUERY_THRESHOLD_SECS: i64 = 300;

/// Default interval between scheduled maintenance runs.
pub const DEFAULT_MAINTENANCE_INTERVAL_HOURS: u64 = 24;

/// Enrollment counts above this are flagged as implausible by the
/// consistency checks.
pub const MAX_PLAUSIBLE_ENROLLMENT: i32 = 1_000_000;

/// Trial dates earlier than this are flagged as implausible.
pub const MIN_PLAUSIBLE_DATE: &str = "1900-01-01";

/// Trial dates further than this many years into the future are flagged.
pub const DATE_HORIZON_YEARS: i32 = 10;
